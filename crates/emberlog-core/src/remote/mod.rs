//! Remote device-management API boundary.
//!
//! Two traits split the surface along the credential seam: [`AuthApi`] is
//! everything the token lifecycle needs, [`ReportApi`] is everything the
//! sync engine calls with an access token in hand. [`EcobeeClient`]
//! implements both over blocking HTTP.

pub mod client;
pub mod types;

pub use client::EcobeeClient;
pub use types::{AuthGrant, Device, DeviceSummary, ReportRow, RevisionMarker, TokenPair};

use crate::error::{AuthApiError, RemoteError};
use crate::window::Window;

/// Remote auth endpoints: PIN authorization, token issuance, token refresh.
pub trait AuthApi {
    /// Request a device-style PIN + authorization code.
    fn authorize(&self, application_key: &str) -> Result<AuthGrant, AuthApiError>;

    /// Exchange an authorization code for a token pair.
    fn issue_tokens(&self, application_key: &str, code: &str) -> Result<TokenPair, AuthApiError>;

    /// Refresh the token pair using the stored refresh token.
    fn refresh_tokens(
        &self,
        application_key: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthApiError>;
}

/// Remote data endpoints used by the sync engine.
pub trait ReportApi {
    /// Per-device revision tuples from the summary call.
    fn thermostat_summary(&self, access_token: &str) -> Result<Vec<DeviceSummary>, RemoteError>;

    /// Device details, including the first-connected time.
    fn thermostats(&self, access_token: &str) -> Result<Vec<Device>, RemoteError>;

    /// Raw CSV report rows for one device over one window, time-ordered.
    fn runtime_report(
        &self,
        access_token: &str,
        device_id: &str,
        window: &Window,
    ) -> Result<Vec<String>, RemoteError>;
}
