use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use clockbook::{
    aggregation::{daily_totals, monthly_totals, weekly_totals, YearMonth},
    error::{AppError, ValidationError},
    identity::{IdentityProvider, LocalIdentityProvider},
    session::Session,
    store::{file_store::FileStore, subscription::subscribe},
    tracking::{
        clock_state::{ClockState, TransitionError},
        validation::{ClockOutEdit, EntryEdit},
    },
    utils::clock::FixedClock,
};
use tempfile::tempdir;

const POLL: Duration = Duration::from_millis(20);

fn zone() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    zone()
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

async fn session_at(
    dir: &std::path::Path,
    identity: Arc<LocalIdentityProvider>,
    now: DateTime<Utc>,
) -> anyhow::Result<Session<FixedOffset>> {
    let clock = Arc::new(FixedClock(now));
    let store = Arc::new(FileStore::new(dir.join("users"), clock.clone(), POLL)?);
    Ok(Session::open(identity, store, clock, zone(), POLL).await?)
}

#[tokio::test]
async fn a_day_of_tracking() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let identity = Arc::new(LocalIdentityProvider::open(dir.path().join("identity"), 6).await?);
    identity.register("ada@example.com", "long enough").await?;

    let morning = session_at(dir.path(), identity.clone(), local(2024, 1, 15, 8, 0)).await?;
    let thesis = morning.tracker().create_project("Thesis").await?;

    // 23:50 to 00:10 the next day, local time
    let late = session_at(dir.path(), identity.clone(), local(2024, 1, 15, 23, 50)).await?;
    let entry = late.tracker().clock_in(&thesis.id, "late push").await?;
    assert_eq!(entry.date, "2024-01-15");
    assert!(matches!(
        late.tracker().clock_in(&thesis.id, "").await,
        Err(AppError::Rejected(TransitionError::AlreadyClockedIn { .. }))
    ));

    let after_midnight = session_at(dir.path(), identity.clone(), local(2024, 1, 16, 0, 10)).await?;
    let closed = after_midnight.tracker().clock_out(&thesis.id).await?;
    assert_eq!(closed.duration(), chrono::Duration::minutes(20));
    assert_eq!(
        after_midnight.tracker().clock_state(&thesis.id).await?,
        ClockState::ClockedOut
    );

    let entries = after_midnight.tracker().entries().await?;
    let daily = daily_totals(&entries, &zone());
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].key.to_string(), "2024-01-15");
    assert_eq!(daily[0].duration, chrono::Duration::minutes(20));
    assert_eq!(weekly_totals(&entries, &zone())[0].key.to_string(), "2024-01-15");
    assert_eq!(
        monthly_totals(&entries, &zone())[0].key,
        YearMonth {
            year: 2024,
            month: 1
        }
    );

    // an inverted correction is rejected and nothing changes
    let result = after_midnight
        .tracker()
        .edit_entry(
            &closed.id,
            EntryEdit {
                clock_out: Some(ClockOutEdit::At(local(2024, 1, 15, 23, 0))),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::Validation(ValidationError::ClockOutBeforeClockIn { .. }))
    ));
    assert_eq!(after_midnight.tracker().entry(&closed.id).await?, closed);

    for session in [morning, late, after_midnight] {
        session.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn subscriptions_see_changes_and_stop_on_close() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let identity = Arc::new(LocalIdentityProvider::open(dir.path().join("identity"), 6).await?);
    identity.register("ada@example.com", "long enough").await?;

    let mut viewer = session_at(dir.path(), identity.clone(), local(2024, 1, 15, 9, 0)).await?;
    let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
    let sink = seen.clone();
    let subscription = subscribe(viewer.tracker().watch_projects(), move |snapshot| {
        if let Ok(projects) = snapshot {
            sink.lock().unwrap().push(projects.len());
        }
    });
    viewer.hold(subscription);

    // a writer with its own store instance, as another process would have
    let writer = session_at(dir.path(), identity.clone(), local(2024, 1, 15, 9, 5)).await?;
    writer.tracker().create_project("Thesis").await?;

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if seen.lock().unwrap().last() == Some(&1) {
                break;
            }
            tokio::time::sleep(POLL).await;
        }
    })
    .await?;

    viewer.close().await;
    let delivered = seen.lock().unwrap().len();
    writer.tracker().create_project("Chores").await?;
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(seen.lock().unwrap().len(), delivered);

    writer.sign_out().await?;
    assert_eq!(identity.refresh().await?, None);
    Ok(())
}
