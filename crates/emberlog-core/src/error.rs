//! Core error types for emberlog-core.
//!
//! One enum per concern, rolled up into [`SyncError`]. Anything a sync run
//! surfaces to its caller is fatal for that run: the store is left in a
//! valid, resumable state and the next run recomputes its windows from the
//! persisted checkpoints.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for a synchronization run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Credential persistence failed (read/write/parse of the token file).
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Authorization cannot proceed without operator action.
    #[error("authorization error: {0}")]
    Auth(#[from] AuthError),

    /// A remote call kept failing transiently until the attempt budget ran out.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: RemoteError,
    },

    /// A remote call failed in a way retrying will not fix.
    #[error("permanent remote failure: {0}")]
    RemotePermanent(RemoteError),

    /// Schema creation or a write to the persisted store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures reported by the remote API or its transport, classified for the
/// retry controller.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// The remote's reserved "token invalid/expired" signal.
    #[error("access token expired (api status code {code})")]
    AuthExpired { code: i64 },

    /// Read or connect timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection reset, refused, or an empty response body.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Any other remote-reported error.
    #[error("remote api error {code}: {message}")]
    Api { code: i64, message: String },

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// True for the token-expired signal, recoverable via one refresh.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, RemoteError::AuthExpired { .. })
    }

    /// True for failures worth retrying without any recovery action.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Timeout(_) | RemoteError::Connection(_))
    }
}

/// Fatal authorization conditions requiring operator action before the next run.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A PIN was issued; the operator must register it on the remote portal.
    #[error("application not yet authorized; register PIN {pin} on the remote portal, then re-run")]
    AuthorizationPending { pin: String },

    /// The grant itself was revoked; all credential artifacts were cleared.
    #[error("authorization grant invalid or revoked; stored credentials cleared, re-authorize before the next run")]
    GrantRevoked,

    /// A call needed an access token but none is stored.
    #[error("no access token available; complete authorization first")]
    NotAuthenticated,

    /// The token endpoint rejected a request for a reason we do not recover from.
    #[error("token endpoint rejected the request: {0}")]
    TokenEndpoint(String),

    /// Transport-level failure during an auth call.
    #[error("remote failure during auth call: {0}")]
    Remote(#[from] RemoteError),

    /// Persisting a credential mutation failed mid-transition.
    #[error("credential persistence failed: {0}")]
    Credential(#[from] CredentialError),
}

/// Typed failures from the remote auth endpoints.
#[derive(Error, Debug)]
pub enum AuthApiError {
    /// The operator has not yet registered the PIN.
    #[error("waiting for user to authorize the application")]
    WaitingForUser,

    /// The PIN authorization lapsed before the operator registered it.
    #[error("prior authorization expired before the PIN was registered")]
    AuthorizationExpired,

    /// The grant is permanently invalid, expired, or revoked.
    #[error("authorization grant invalid, expired or revoked")]
    GrantRevoked,

    /// Any other auth endpoint error.
    #[error("auth endpoint error '{error}': {description}")]
    Endpoint { error: String, description: String },

    /// Transport-level failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Credential file persistence errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write credentials file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No application key in the file and none supplied by configuration.
    #[error("no application key available; set application_key in the configuration file")]
    MissingApplicationKey,
}

/// Persisted store errors. All fatal: a half-written schema is not resumable.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema migration failed: {0}")]
    MigrationFailed(#[source] rusqlite::Error),

    #[error("query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    /// A key conflict was reported but the conflicting row cannot be read back.
    #[error("store inconsistency: {0}")]
    Inconsistent(String),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("failed to resolve data directory: {0}")]
    DataDir(String),
}
