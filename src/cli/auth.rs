use std::io::Write;

use anyhow::Result;
use clap::Subcommand;
use tracing::warn;

use crate::{
    error::AppError,
    identity::{AuthError, IdentityProvider},
    tracking::{ProfileUpdate, Tracker},
};

use super::{
    app::App,
    output::views::write_profile,
    prompt::{Notice, Prompt},
};

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    #[command(about = "Show the profile of the signed-in user")]
    Show,
    #[command(about = "Change profile fields. Omitted fields are kept")]
    Set {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long, help = "URL or path of a profile photo")]
        photo: Option<String>,
        #[arg(long, conflicts_with = "photo")]
        remove_photo: bool,
    },
}

fn password(prompt: &dyn Prompt, given: Option<String>) -> String {
    given
        .or_else(|| prompt.ask("Password"))
        .unwrap_or_default()
}

pub async fn register(
    app: &App,
    prompt: &dyn Prompt,
    email: &str,
    given_password: Option<String>,
) -> Result<()> {
    let password = password(prompt, given_password);
    let identity = app
        .identity
        .register(email, &password)
        .await
        .inspect_err(|e| warn!(code = e.code(), "Registration refused"))
        .map_err(AppError::from)?;
    // first sign-in creates the profile
    app.session().await?.close().await;
    prompt.notify(
        Notice::Success,
        &format!("Registered and signed in as {}.", identity.email),
    );
    Ok(())
}

pub async fn login(
    app: &App,
    prompt: &dyn Prompt,
    email: &str,
    given_password: Option<String>,
) -> Result<()> {
    let password = password(prompt, given_password);
    let identity = app
        .identity
        .authenticate(email, &password)
        .await
        .inspect_err(|e| warn!(code = e.code(), "Sign in refused"))
        .map_err(AppError::from)?;
    app.session().await?.close().await;
    prompt.notify(Notice::Success, &format!("Signed in as {}.", identity.email));
    Ok(())
}

pub async fn logout(app: &App, prompt: &dyn Prompt) -> Result<()> {
    match app.session().await {
        Ok(session) => session.sign_out().await?,
        Err(AppError::Auth(AuthError::NotSignedIn)) => {
            prompt.notify(Notice::Info, "Nobody is signed in.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }
    prompt.notify(Notice::Success, "Signed out.");
    Ok(())
}

pub fn whoami(app: &App, out: &mut impl Write) -> Result<()> {
    let identity = app
        .identity
        .current()
        .ok_or(AppError::Auth(AuthError::NotSignedIn))?;
    writeln!(out, "{}\t{}", identity.email, identity.uid)?;
    Ok(())
}

pub async fn profile<Tz>(
    command: ProfileCommand,
    tracker: &Tracker<Tz>,
    prompt: &dyn Prompt,
    out: &mut impl Write,
) -> Result<()>
where
    Tz: chrono::TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync,
{
    match command {
        ProfileCommand::Show => {
            write_profile(out, &tracker.ensure_profile().await?)?;
        }
        ProfileCommand::Set {
            first_name,
            last_name,
            photo,
            remove_photo,
        } => {
            let photo_url = match (photo, remove_photo) {
                (_, true) => Some(None),
                (Some(photo), false) => Some(Some(photo)),
                (None, false) => None,
            };
            let profile = tracker
                .update_profile(ProfileUpdate {
                    first_name,
                    last_name,
                    photo_url,
                })
                .await?;
            prompt.notify(Notice::Success, "Profile updated.");
            write_profile(out, &profile)?;
        }
    }
    Ok(())
}
