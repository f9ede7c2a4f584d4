use std::{fmt::Display, io::Write};

use anyhow::Result;
use chrono::{NaiveDate, TimeZone};
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    error::AppError,
    model::{Project, TimeEntry},
    session::Session,
    store::{subscription::subscribe, StoreError},
};

use super::{
    output::views::{project_detail, write_project_detail, ProjectDetail},
    prompt::{Notice, Prompt},
};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Cancels `cancellation` on Ctrl-C.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => {},
    };
}

enum Update {
    Entries(Result<Vec<TimeEntry>, StoreError>),
    Projects(Result<Vec<Project>, StoreError>),
}

fn render<Tz>(out: &mut impl Write, detail: &ProjectDetail, tz: &Tz) -> std::io::Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    write!(out, "{CLEAR_SCREEN}")?;
    write_project_detail(out, detail, tz)?;
    out.flush()
}

/// Live project page. Re-rendered on every snapshot of the project or its entries until
/// `cancellation` fires, the user signs out, the project is deleted or a subscription fails.
pub async fn watch_project<Tz>(
    mut session: Session<Tz>,
    reference: &str,
    selected: Option<NaiveDate>,
    prompt: &dyn Prompt,
    out: &mut impl Write,
    cancellation: CancellationToken,
) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync + Display,
{
    let tracker = session.tracker().clone();
    let mut project = tracker.resolve_project(reference).await?;

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let entries_sender = sender.clone();
    session.hold(subscribe(
        tracker.watch_project_entries(&project.id),
        move |snapshot| {
            let _ = entries_sender.send(Update::Entries(snapshot));
        },
    ));
    session.hold(subscribe(tracker.watch_projects(), move |snapshot| {
        let _ = sender.send(Update::Projects(snapshot));
    }));

    let mut latest = None;
    let result = loop {
        let update = select! {
            _ = cancellation.cancelled() => break Ok(()),
            _ = session.ended() => {
                prompt.notify(Notice::Info, "Signed out, closing the view.");
                break Ok(());
            }
            next = receiver.recv() => match next {
                Some(update) => update,
                None => break Ok(()),
            }
        };

        match update {
            Update::Entries(Ok(snapshot)) => latest = Some(snapshot),
            Update::Projects(Ok(projects)) => {
                match projects.into_iter().find(|v| v.id == project.id) {
                    Some(current) => project = current,
                    None => {
                        prompt.notify(Notice::Info, "The project was deleted.");
                        break Ok(());
                    }
                }
            }
            Update::Entries(Err(e)) | Update::Projects(Err(e)) => {
                let e = AppError::Subscription(e);
                error!("{e:?}");
                prompt.notify(Notice::Error, &e.user_message());
                break Ok(());
            }
        }

        let Some(entries) = &latest else {
            continue;
        };
        let detail = project_detail(
            project.clone(),
            entries.clone(),
            selected,
            tracker.now(),
            tracker.zone(),
        );
        if let Err(e) = render(out, &detail, tracker.zone()) {
            break Err(e.into());
        }
    };

    info!("Closing live view of {}", project.name);
    session.close().await;
    result
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::Utc;
    use mockall::predicate::eq;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        cli::prompt::{MockPrompt, Notice},
        identity::{IdentityProvider, LocalIdentityProvider},
        session::Session,
        store::file_store::FileStore,
        utils::clock::DefaultClock,
    };

    use super::watch_project;

    const POLL: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn renders_until_project_is_deleted() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let identity = Arc::new(LocalIdentityProvider::open(dir.path().join("id"), 6).await?);
        identity.register("ada@example.com", "long enough").await?;
        let store = Arc::new(FileStore::new(dir.path().join("users"), Arc::new(DefaultClock), POLL)?);

        let session = Session::open(identity.clone(), store.clone(), Arc::new(DefaultClock), Utc, POLL).await?;
        let tracker = session.tracker().clone();
        let project = tracker.create_project("Thesis").await?;

        let mut prompt = MockPrompt::new();
        prompt
            .expect_notify()
            .with(eq(Notice::Info), eq("The project was deleted."))
            .times(1)
            .return_const(());

        let cancellation = CancellationToken::new();
        let project_id = project.id.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(POLL * 3).await;
            tracker.clock_in(&project_id, "").await?;
            tokio::time::sleep(POLL * 3).await;
            tracker.delete_project(&project_id).await?;
            anyhow::Ok(())
        });

        let mut out = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(5),
            watch_project(session, "Thesis", None, &prompt, &mut out, cancellation),
        )
        .await??;
        writer.await??;

        let text = String::from_utf8(out)?;
        assert!(text.contains("Thesis"));
        assert!(text.contains("clocked in since"));
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_stops_view() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let identity = Arc::new(LocalIdentityProvider::open(dir.path().join("id"), 6).await?);
        identity.register("ada@example.com", "long enough").await?;
        let store = Arc::new(FileStore::new(dir.path().join("users"), Arc::new(DefaultClock), POLL)?);
        let session = Session::open(identity, store, Arc::new(DefaultClock), Utc, POLL).await?;
        session.tracker().create_project("Thesis").await?;

        let prompt = MockPrompt::new();
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let mut out = Vec::new();
        watch_project(session, "Thesis", None, &prompt, &mut out, cancellation).await?;
        Ok(())
    }
}
