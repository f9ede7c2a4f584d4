pub mod app;
pub mod auth;
pub mod dates;
pub mod entries;
pub mod output;
pub mod projects;
pub mod prompt;
pub mod totals;
pub mod watch;

use std::{io, path::PathBuf, process::ExitCode};

use anyhow::Result;
use app::App;
use auth::ProfileCommand;
use clap::{Parser, Subcommand};
use dates::{parse_day, DateStyle, DATE_HELP};
use entries::{ClockCommand, EntriesCommand};
use projects::ProjectsCommand;
use prompt::{ConsolePrompt, Notice, Prompt};
use tokio_util::sync::CancellationToken;
use totals::TotalsCommand;
use tracing::{error, level_filters::LevelFilter};
use watch::{detect_shutdown, watch_project};

use crate::{
    config::{Config, Overrides},
    error::AppError,
    utils::logging::enable_logging,
};

#[derive(Parser, Debug)]
#[command(name = "clockbook", version, long_about = None)]
#[command(about = "Clock in and out of projects and review daily, weekly and monthly totals", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $CLOCKBOOK_DIR, $XDG_STATE_HOME/clockbook or $HOME/.local/state/clockbook"
    )]
    dir: Option<PathBuf>,
    #[arg(long = "log-filter", global = true)]
    log: Option<LevelFilter>,
    #[arg(long = "log-console", global = true, help = "Also print logs to stderr")]
    log_console: bool,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Create an account and sign in")]
    Register {
        email: String,
        #[arg(long, help = "Asked for when omitted")]
        password: Option<String>,
    },
    #[command(about = "Sign in")]
    Login {
        email: String,
        #[arg(long, help = "Asked for when omitted")]
        password: Option<String>,
    },
    #[command(about = "Sign out")]
    Logout,
    #[command(about = "Show who is signed in")]
    Whoami,
    #[command(about = "Show or change the profile")]
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    #[command(about = "Manage projects")]
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },
    #[command(about = "Clock in to or out of a project")]
    Clock {
        #[command(subcommand)]
        command: ClockCommand,
    },
    #[command(about = "List, correct and delete time entries")]
    Entries {
        #[command(subcommand)]
        command: EntriesCommand,
    },
    #[command(about = "Daily, weekly or monthly totals")]
    Totals {
        #[command(flatten)]
        command: TotalsCommand,
    },
    #[command(about = "Live view of a project, refreshed whenever its data changes. Stop with Ctrl-C")]
    Watch {
        #[arg(help = "Project id, id prefix or name")]
        project: String,
        #[arg(long, help = DATE_HELP)]
        date: Option<String>,
    },
}

/// Parses the command line, sets up config and logging, and runs one command. Failures the user
/// can act on are reported through the prompt and turn into a failing exit code; anything else is
/// returned.
pub async fn run_cli() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(Overrides {
        dir: args.dir.clone(),
        log_filter: args.log,
        log_console: args.log_console,
    })?;
    enable_logging(&config.logs_dir(), config.log_level, config.log_console)?;

    let prompt = ConsolePrompt::new(false);
    let app = App::open(config).await?;

    match dispatch(args, &app, &prompt).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<AppError>() {
            Some(app_error) => {
                error!("Command failed {e:?}");
                prompt.notify(Notice::Error, &app_error.user_message());
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

/// Commands that act on the signed-in user's data.
enum Tracked {
    Profile(ProfileCommand),
    Projects(ProjectsCommand),
    Clock(ClockCommand),
    Entries(EntriesCommand),
    Totals(TotalsCommand),
}

async fn dispatch(args: Args, app: &App, prompt: &dyn Prompt) -> Result<()> {
    let style = args.date_style;
    let mut out = io::stdout().lock();

    let tracked = match args.commands {
        Commands::Register { email, password } => {
            return auth::register(app, prompt, &email, password).await
        }
        Commands::Login { email, password } => {
            return auth::login(app, prompt, &email, password).await
        }
        Commands::Logout => return auth::logout(app, prompt).await,
        Commands::Whoami => return auth::whoami(app, &mut out),
        Commands::Watch { project, date } => {
            let session = app.session().await?;
            let now = session.tracker().now().with_timezone(session.tracker().zone());
            let selected = date
                .map(|v| parse_day("date", &v, now, style))
                .transpose()?;

            let cancellation = CancellationToken::new();
            tokio::spawn(detect_shutdown(cancellation.clone()));
            let result =
                watch_project(session, &project, selected, prompt, &mut out, cancellation.clone())
                    .await;
            cancellation.cancel();
            return result;
        }
        Commands::Profile { command } => Tracked::Profile(command),
        Commands::Projects { command } => Tracked::Projects(command),
        Commands::Clock { command } => Tracked::Clock(command),
        Commands::Entries { command } => Tracked::Entries(command),
        Commands::Totals { command } => Tracked::Totals(command),
    };

    let session = app.session().await?;
    let tracker = session.tracker().clone();
    let result = match tracked {
        Tracked::Profile(command) => auth::profile(command, &tracker, prompt, &mut out).await,
        Tracked::Projects(command) => {
            projects::run(command, &tracker, prompt, &mut out, style).await
        }
        Tracked::Clock(command) => entries::clock(command, &tracker, prompt, &mut out).await,
        Tracked::Entries(command) => {
            entries::entries(command, &tracker, prompt, &mut out, style).await
        }
        Tracked::Totals(command) => totals::run(command, &tracker, &mut out, style).await,
    };
    session.close().await;
    result
}
