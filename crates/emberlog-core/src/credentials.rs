//! Durable persistence of the OAuth credential artifacts.
//!
//! The credential file is plain JSON at `~/.config/emberlog/credentials.json`
//! so an operator can inspect it (the PIN in particular is kept there as a
//! backup reference for the portal registration step). Every mutation is
//! persisted synchronously through a temp-file-plus-rename so a crash never
//! loses a newer token than what the remote holds.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CredentialError;

/// The full set of persisted credential artifacts.
///
/// Invariant: `access_token` and `refresh_token` are both present or both
/// absent. The store only accepts them as a pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential {
    pub application_key: String,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
    /// Unix timestamp after which the access token is known to be stale.
    #[serde(default)]
    pub access_token_expires_at: Option<i64>,
}

impl Credential {
    /// Whether a stored expiry timestamp has already passed (60s buffer).
    pub fn access_token_stale(&self, now_unix: i64) -> bool {
        match self.access_token_expires_at {
            Some(exp) => now_unix > exp - 60,
            None => false,
        }
    }
}

/// File-backed credential store with atomic writes.
pub struct CredentialStore {
    path: PathBuf,
    current: Credential,
}

impl CredentialStore {
    /// Open the store at `path`, creating an empty credential on first run.
    ///
    /// `application_key` supplies the key from configuration when the file
    /// does not yet carry one; with neither available no remote call can be
    /// made and opening fails.
    pub fn open(path: &Path, application_key: Option<&str>) -> Result<Self, CredentialError> {
        let mut current = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| CredentialError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no credentials file; starting empty");
                Credential::default()
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if current.application_key.is_empty() {
            match application_key {
                Some(key) if !key.is_empty() => current.application_key = key.to_string(),
                _ => return Err(CredentialError::MissingApplicationKey),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            current,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.current
    }

    /// Record a freshly issued PIN + authorization code. Any stored token
    /// pair is no longer valid under the new grant and is cleared.
    pub fn set_authorization(&mut self, pin: &str, code: &str) -> Result<(), CredentialError> {
        self.current.pin = Some(pin.to_string());
        self.current.authorization_code = Some(code.to_string());
        self.current.access_token = None;
        self.current.refresh_token = None;
        self.current.access_token_expires_at = None;
        self.persist()
    }

    /// Record a new token pair. Tokens are never updated independently.
    pub fn set_token_pair(
        &mut self,
        access_token: &str,
        refresh_token: &str,
        expires_at: Option<i64>,
    ) -> Result<(), CredentialError> {
        self.current.access_token = Some(access_token.to_string());
        self.current.refresh_token = Some(refresh_token.to_string());
        self.current.access_token_expires_at = expires_at;
        self.persist()
    }

    /// Wipe every artifact except the application key. Used when the remote
    /// reports the grant itself as invalid or revoked.
    pub fn clear_grant(&mut self) -> Result<(), CredentialError> {
        self.current.authorization_code = None;
        self.current.access_token = None;
        self.current.refresh_token = None;
        self.current.pin = None;
        self.current.access_token_expires_at = None;
        self.persist()
    }

    fn persist(&self) -> Result<(), CredentialError> {
        let json = serde_json::to_string_pretty(&self.current).map_err(|source| {
            CredentialError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CredentialError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CredentialError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| CredentialError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }
}
