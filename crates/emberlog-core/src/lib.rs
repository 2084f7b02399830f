//! # Emberlog Core Library
//!
//! This library provides the incremental synchronization engine for the
//! Emberlog thermostat telemetry archiver. A remote device-management API
//! exposes OAuth2-style PIN authorization, a per-device revision marker, and
//! a bounded-range runtime report query; Emberlog extracts the 5-minute
//! interval history behind those and persists it to a local SQLite store
//! with idempotent, dedup-aware writes.
//!
//! ## Architecture
//!
//! - **Credentials**: durable JSON-file persistence of the OAuth artifacts,
//!   written atomically after every mutation
//! - **Token lifecycle**: authorize (PIN) -> issue -> refresh ->
//!   re-authorize-on-revocation state machine
//! - **Window scheduling**: converts a per-device checkpoint plus the
//!   remote's revision marker into a sequence of bounded report queries
//! - **Reconciliation**: on key collision the row with more populated
//!   measurement fields wins, ties favor the newer data
//!
//! ## Key Components
//!
//! - [`SyncEngine`]: per-run orchestrator, sequential per device
//! - [`TokenManager`]: OAuth2 token state machine over a [`CredentialStore`]
//! - [`ReportStore`]: SQLite persistence and checkpoint derivation
//! - [`EcobeeClient`]: blocking HTTP client for the remote API

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod remote;
pub mod retry;
pub mod revision;
pub mod storage;
pub mod token;
pub mod window;


pub use config::Config;
pub use credentials::{Credential, CredentialStore};
pub use engine::{DeviceStats, RunStats, SyncEngine};
pub use error::{
    AuthApiError, AuthError, ConfigError, CredentialError, RemoteError, StorageError, SyncError,
};
pub use remote::{
    AuthApi, AuthGrant, Device, DeviceSummary, EcobeeClient, ReportApi, ReportRow, RevisionMarker,
    TokenPair,
};
pub use retry::{with_retry, Retried, MAX_ATTEMPTS};
pub use storage::{ReconciliationWriter, ReportStore, WriteOutcome};
pub use token::TokenManager;
pub use window::{windows, Window};
