use std::{
    collections::BTreeMap,
    io::SeekFrom,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::watch,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    password::{hash_password, verify_password},
    AuthError, Identity, IdentityProvider,
};

const ACCOUNTS_FILE: &str = "accounts.json";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

/// Accounts keyed by normalized email.
type Accounts = BTreeMap<String, Account>;

/// Identity provider backed by two files in `dir`: `accounts.json` with argon2 password hashes and
/// `session.json` with the signed-in identity, shared by every process using the same directory.
pub struct LocalIdentityProvider {
    dir: PathBuf,
    min_password_length: usize,
    current: watch::Sender<Option<Identity>>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.contains(char::is_whitespace)
        && !domain.contains('@');
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

async fn read_session(path: &Path) -> Result<Option<Identity>, AuthError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl LocalIdentityProvider {
    pub async fn open(dir: impl Into<PathBuf>, min_password_length: usize) -> Result<Self, AuthError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let session = read_session(&dir.join(SESSION_FILE)).await?;
        let (current, _) = watch::channel(session);
        Ok(Self {
            dir,
            min_password_length,
            current,
        })
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    async fn open_accounts(&self) -> Result<File, AuthError> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(ACCOUNTS_FILE))
            .await?)
    }

    async fn read_accounts(file: &mut File) -> Result<Accounts, AuthError> {
        file.seek(SeekFrom::Start(0)).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;
        if buffer.iter().all(u8::is_ascii_whitespace) {
            return Ok(Accounts::new());
        }
        Ok(serde_json::from_slice(&buffer)?)
    }

    async fn load_accounts(&self) -> Result<Accounts, AuthError> {
        let mut file = self.open_accounts().await?;
        file.lock_shared()?;
        let result = Self::read_accounts(&mut file).await;
        file.unlock_async().await?;
        result
    }

    /// Inserts a new account while holding the accounts file exclusively, so two processes can't
    /// register the same email.
    async fn insert_account(&self, account: Account) -> Result<(), AuthError> {
        let mut file = self.open_accounts().await?;
        file.lock_exclusive()?;
        let result = async {
            let mut accounts = Self::read_accounts(&mut file).await?;
            let key = normalize_email(&account.email);
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailInUse);
            }
            accounts.insert(key, account);

            let bytes = serde_json::to_vec_pretty(&accounts)?;
            file.set_len(0).await?;
            file.seek(SeekFrom::Start(0)).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            Ok::<_, AuthError>(())
        }
        .await;
        file.unlock_async().await?;
        result
    }

    async fn sign_in(&self, identity: Identity) -> Result<Identity, AuthError> {
        tokio::fs::write(self.session_path(), serde_json::to_vec(&identity)?).await?;
        self.current.send_replace(Some(identity.clone()));
        info!("Signed in as {}", identity.email);
        Ok(identity)
    }

    fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::MissingPassword);
        }
        if password.chars().count() < self.min_password_length {
            return Err(AuthError::WeakPassword {
                min: self.min_password_length,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    #[instrument(skip(self, password))]
    async fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        validate_email(email)?;
        self.check_password(password)?;

        if self
            .load_accounts()
            .await?
            .contains_key(&normalize_email(email))
        {
            return Err(AuthError::EmailInUse);
        }

        let owned = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&owned))
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))??;

        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
        };
        let identity = Identity {
            uid: account.uid.clone(),
            email: account.email.clone(),
        };
        self.insert_account(account).await?;
        debug!("Registered {}", identity.uid);
        self.sign_in(identity).await
    }

    #[instrument(skip(self, password))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        validate_email(email)?;
        if password.is_empty() {
            return Err(AuthError::MissingPassword);
        }

        let accounts = self.load_accounts().await?;
        let Some(account) = accounts.get(&normalize_email(email)).cloned() else {
            return Err(AuthError::InvalidCredentials);
        };

        let owned = password.to_string();
        let hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&owned, &hash))
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))??;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        self.sign_in(Identity {
            uid: account.uid,
            email: account.email,
        })
        .await
    }

    #[instrument(skip(self))]
    async fn deauthenticate(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(self.session_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(previous) = self.current.send_replace(None) {
            info!("Signed out {}", previous.email);
        }
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    async fn refresh(&self) -> Result<Option<Identity>, AuthError> {
        let session = read_session(&self.session_path()).await?;
        self.current.send_if_modified(|current| {
            if *current != session {
                *current = session.clone();
                true
            } else {
                false
            }
        });
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::identity::{AuthError, IdentityProvider};

    use super::{validate_email, LocalIdentityProvider};

    #[test]
    fn email_validation() {
        assert!(validate_email("ada@example.com").is_ok());
        for bad in ["", "ada", "@example.com", "ada@", "ada@example", "a da@example.com", "ada@.com"] {
            assert_eq!(validate_email(bad), Err(AuthError::InvalidEmail), "{bad}");
        }
    }

    #[tokio::test]
    async fn register_signs_in_and_persists() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let provider = LocalIdentityProvider::open(dir.path(), 6).await?;
        assert_eq!(provider.current(), None);

        let mut watcher = provider.watch();
        let identity = provider.register("Ada@Example.com", "hunter22").await?;
        assert!(watcher.has_changed()?);
        assert_eq!(*watcher.borrow_and_update(), Some(identity.clone()));

        // a fresh provider over the same directory sees the session
        let reopened = LocalIdentityProvider::open(dir.path(), 6).await?;
        assert_eq!(reopened.current(), Some(identity.clone()));

        reopened.deauthenticate().await?;
        assert_eq!(reopened.current(), None);
        assert_eq!(provider.refresh().await?, None);
        assert_eq!(provider.current(), None);

        let again = provider.authenticate("ada@example.com", "hunter22").await?;
        assert_eq!(again.uid, identity.uid);
        Ok(())
    }

    #[tokio::test]
    async fn rejections_map_to_codes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let provider = LocalIdentityProvider::open(dir.path(), 6).await?;

        assert_eq!(
            provider.register("ada@example.com", "short").await,
            Err(AuthError::WeakPassword { min: 6 })
        );
        assert_eq!(
            provider.register("not-an-email", "long enough").await,
            Err(AuthError::InvalidEmail)
        );

        provider.register("ada@example.com", "long enough").await?;
        assert_eq!(
            provider
                .register("ADA@example.com", "another one")
                .await
                .map_err(|e| e.code()),
            Err("auth/email-already-in-use")
        );
        assert_eq!(
            provider.authenticate("ada@example.com", "wrong password").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            provider.authenticate("bob@example.com", "long enough").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            provider.authenticate("ada@example.com", "").await,
            Err(AuthError::MissingPassword)
        );
        Ok(())
    }
}
