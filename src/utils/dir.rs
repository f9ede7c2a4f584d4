use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

pub const DIR_ENV: &str = "CLOCKBOOK_DIR";

/// Resolves the directory holding accounts, the current session, user collections and logs.
/// `CLOCKBOOK_DIR` wins, then the platform state directory.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = match env::var(DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => platform_state_dir()?.join("clockbook"),
    };

    ensure_dir(path)
}

pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

fn platform_state_dir() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| anyhow!("APPDATA should be present on Windows"))
    }
    #[cfg(not(windows))]
    {
        env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
            .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
    }
}
