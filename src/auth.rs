//! Bearer credential storage.
//!
//! The dispatcher reads the token for `requires_auth` requests and clears it
//! when the server answers 401 or 403, so the next request forces
//! re-authentication instead of repeating a doomed call.

use crate::{Error, Result};
use async_trait::async_trait;
use keyring::Entry;
use std::sync::RwLock;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn token(&self) -> Result<Option<String>>;
    async fn set_token(&self, token: &str) -> Result<()>;
    async fn clear_token(&self) -> Result<()>;
}

/// Process-local token holder. Lost on restart.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn token(&self) -> Result<Option<String>> {
        Ok(self
            .token
            .read()
            .map_err(|_| Error::credential("credential lock poisoned"))?
            .clone())
    }

    async fn set_token(&self, token: &str) -> Result<()> {
        *self
            .token
            .write()
            .map_err(|_| Error::credential("credential lock poisoned"))? = Some(token.to_string());
        Ok(())
    }

    async fn clear_token(&self) -> Result<()> {
        *self
            .token
            .write()
            .map_err(|_| Error::credential("credential lock poisoned"))? = None;
        Ok(())
    }
}

/// Token persisted in the OS keyring under service `guardlink`.
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    pub const SERVICE: &'static str = "guardlink";

    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(Self::SERVICE, &self.account)
            .map_err(|e| Error::credential(format!("keyring unavailable: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn token(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::credential(format!("cannot read token: {}", e))),
        }
    }

    async fn set_token(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .map_err(|e| Error::credential(format!("cannot store token: {}", e)))
    }

    async fn clear_token(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::credential(format!("cannot clear token: {}", e))),
        }
    }
}

/// Log-safe rendering of a bearer token: first and last four characters only.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}
