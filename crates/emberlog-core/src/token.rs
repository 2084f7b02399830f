//! OAuth2 token lifecycle state machine.
//!
//! NO_AUTH -> AUTHORIZING -> AUTHORIZED_NO_ACCESS -> ACTIVE, with REVOKED
//! looping back to AUTHORIZING. The AUTHORIZING step cannot be automated:
//! the remote issues a PIN the operator must register on its portal
//! out-of-band, so entering it is terminal for the current run. Refresh is
//! lazy -- driven by the remote's token-expired signal via the retry
//! controller -- except when a stored expiry timestamp has already passed.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::credentials::CredentialStore;
use crate::error::{AuthApiError, AuthError, SyncError};
use crate::remote::AuthApi;

/// Owns the credential store and drives the auth endpoints.
pub struct TokenManager<A: AuthApi> {
    api: A,
    store: CredentialStore,
}

impl<A: AuthApi> TokenManager<A> {
    pub fn new(api: A, store: CredentialStore) -> Self {
        Self { api, store }
    }

    /// The current access token. Callers go through [`crate::with_retry`],
    /// which re-reads this after a refresh.
    pub fn access_token(&self) -> Result<String, SyncError> {
        self.store
            .credential()
            .access_token
            .clone()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Which credential artifacts are stored (for the CLI status output).
    pub fn credential(&self) -> &crate::credentials::Credential {
        self.store.credential()
    }

    /// Bring the credential to the ACTIVE state or fail with the operator
    /// action that is required first.
    pub fn ensure_active(&mut self) -> Result<(), SyncError> {
        if self.store.credential().authorization_code.is_none() {
            info!("no authorization code stored; requesting a PIN");
            return Err(self.begin_authorization());
        }

        if self.store.credential().access_token.is_none() {
            info!("no access token stored; requesting token issuance");
            self.issue_tokens()?;
            return Ok(());
        }

        if self
            .store
            .credential()
            .access_token_stale(Utc::now().timestamp())
        {
            info!("stored access token past its expiry; refreshing pre-emptively");
            self.refresh()?;
        }

        Ok(())
    }

    /// Refresh the token pair. A remote signal that the grant itself is
    /// invalid/revoked clears every stored artifact and is fatal for the
    /// run: the operator must re-authorize before the next one.
    pub fn refresh(&mut self) -> Result<(), SyncError> {
        let key = self.store.credential().application_key.clone();
        let refresh_token = self
            .store
            .credential()
            .refresh_token
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        match self.api.refresh_tokens(&key, &refresh_token) {
            Ok(pair) => {
                self.store
                    .set_token_pair(&pair.access_token, &pair.refresh_token, pair.expires_at)
                    .map_err(AuthError::from)?;
                info!("access tokens refreshed");
                Ok(())
            }
            Err(AuthApiError::GrantRevoked) => {
                error!("authorization grant revoked; clearing stored credentials");
                self.store.clear_grant().map_err(AuthError::from)?;
                Err(AuthError::GrantRevoked.into())
            }
            Err(AuthApiError::Remote(e)) => Err(AuthError::Remote(e).into()),
            Err(e) => Err(AuthError::TokenEndpoint(e.to_string()).into()),
        }
    }

    /// Start the PIN flow and report the terminal needs-operator condition.
    fn begin_authorization(&mut self) -> SyncError {
        let key = self.store.credential().application_key.clone();
        match self.api.authorize(&key) {
            Ok(grant) => {
                if let Err(e) = self.store.set_authorization(&grant.pin, &grant.code) {
                    return AuthError::from(e).into();
                }
                warn!(
                    pin = %grant.pin,
                    "authorization started; register the PIN on the remote portal, then re-run"
                );
                AuthError::AuthorizationPending { pin: grant.pin }.into()
            }
            Err(AuthApiError::Remote(e)) => AuthError::Remote(e).into(),
            Err(e) => AuthError::TokenEndpoint(e.to_string()).into(),
        }
    }

    fn issue_tokens(&mut self) -> Result<(), SyncError> {
        let key = self.store.credential().application_key.clone();
        let code = self
            .store
            .credential()
            .authorization_code
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        match self.api.issue_tokens(&key, &code) {
            Ok(pair) => {
                self.store
                    .set_token_pair(&pair.access_token, &pair.refresh_token, pair.expires_at)
                    .map_err(AuthError::from)?;
                info!("access tokens issued");
                Ok(())
            }
            Err(AuthApiError::WaitingForUser) => {
                let pin = self.store.credential().pin.clone().unwrap_or_default();
                warn!(%pin, "still waiting for the operator to register the PIN");
                Err(AuthError::AuthorizationPending { pin }.into())
            }
            Err(AuthApiError::AuthorizationExpired) => {
                warn!("prior authorization expired before the PIN was registered; restarting");
                Err(self.begin_authorization())
            }
            Err(AuthApiError::GrantRevoked) => {
                self.store.clear_grant().map_err(AuthError::from)?;
                Err(AuthError::GrantRevoked.into())
            }
            Err(AuthApiError::Remote(e)) => Err(AuthError::Remote(e).into()),
            Err(e) => Err(AuthError::TokenEndpoint(e.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::{AuthGrant, TokenPair};
    use std::cell::{Cell, RefCell};

    /// Scriptable auth endpoint double.
    struct ScriptedAuth {
        refresh_results: RefCell<Vec<Result<TokenPair, AuthApiError>>>,
        authorize_calls: Cell<u32>,
        issue_calls: Cell<u32>,
    }

    impl ScriptedAuth {
        fn new() -> Self {
            Self {
                refresh_results: RefCell::new(Vec::new()),
                authorize_calls: Cell::new(0),
                issue_calls: Cell::new(0),
            }
        }

        fn pair(n: u32) -> TokenPair {
            TokenPair {
                access_token: format!("access-{n}"),
                refresh_token: format!("refresh-{n}"),
                expires_at: None,
            }
        }
    }

    impl AuthApi for ScriptedAuth {
        fn authorize(&self, _key: &str) -> Result<AuthGrant, AuthApiError> {
            self.authorize_calls.set(self.authorize_calls.get() + 1);
            Ok(AuthGrant {
                pin: "bv29".to_string(),
                code: "fresh-code".to_string(),
            })
        }

        fn issue_tokens(&self, _key: &str, _code: &str) -> Result<TokenPair, AuthApiError> {
            self.issue_calls.set(self.issue_calls.get() + 1);
            Ok(Self::pair(1))
        }

        fn refresh_tokens(&self, _key: &str, _rt: &str) -> Result<TokenPair, AuthApiError> {
            self.refresh_results
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(Self::pair(2)))
        }
    }

    fn store(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::open(&dir.path().join("credentials.json"), Some("app-key")).unwrap()
    }

    #[test]
    fn first_run_enters_pin_flow_and_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = TokenManager::new(ScriptedAuth::new(), store(&dir));

        let err = mgr.ensure_active().unwrap_err();
        assert!(matches!(
            err,
            SyncError::Auth(AuthError::AuthorizationPending { ref pin }) if pin == "bv29"
        ));
        // PIN and code persisted immediately.
        assert_eq!(mgr.credential().pin.as_deref(), Some("bv29"));
        assert_eq!(mgr.credential().authorization_code.as_deref(), Some("fresh-code"));
        assert!(mgr.credential().access_token.is_none());
    }

    #[test]
    fn code_without_tokens_issues_pair() {
        let dir = tempfile::tempdir().unwrap();
        let mut cred_store = store(&dir);
        cred_store.set_authorization("bv29", "the-code").unwrap();
        let mut mgr = TokenManager::new(ScriptedAuth::new(), cred_store);

        mgr.ensure_active().unwrap();
        assert_eq!(mgr.credential().access_token.as_deref(), Some("access-1"));
        assert_eq!(mgr.credential().refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn active_pair_is_kept_without_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut cred_store = store(&dir);
        cred_store.set_authorization("bv29", "the-code").unwrap();
        cred_store.set_token_pair("acc", "ref", None).unwrap();
        let api = ScriptedAuth::new();
        let mut mgr = TokenManager::new(api, cred_store);

        mgr.ensure_active().unwrap();
        assert_eq!(mgr.access_token().unwrap(), "acc");
        assert_eq!(mgr.api.issue_calls.get(), 0);
        assert_eq!(mgr.api.authorize_calls.get(), 0);
    }

    #[test]
    fn stale_expiry_triggers_preemptive_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut cred_store = store(&dir);
        cred_store.set_authorization("bv29", "the-code").unwrap();
        cred_store.set_token_pair("acc", "ref", Some(1)).unwrap();
        let mut mgr = TokenManager::new(ScriptedAuth::new(), cred_store);

        mgr.ensure_active().unwrap();
        assert_eq!(mgr.access_token().unwrap(), "access-2");
    }

    #[test]
    fn refresh_success_persists_new_pair() {
        let dir = tempfile::tempdir().unwrap();
        let mut cred_store = store(&dir);
        cred_store.set_authorization("bv29", "the-code").unwrap();
        cred_store.set_token_pair("acc", "ref", None).unwrap();
        let mut mgr = TokenManager::new(ScriptedAuth::new(), cred_store);

        mgr.refresh().unwrap();
        assert_eq!(mgr.credential().access_token.as_deref(), Some("access-2"));
        assert_eq!(mgr.credential().refresh_token.as_deref(), Some("refresh-2"));
    }

    #[test]
    fn revoked_grant_clears_credentials_and_reenters_pin_flow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut cred_store = CredentialStore::open(&path, Some("app-key")).unwrap();
        cred_store.set_authorization("bv29", "the-code").unwrap();
        cred_store.set_token_pair("acc", "ref", None).unwrap();

        let api = ScriptedAuth::new();
        api.refresh_results
            .borrow_mut()
            .push(Err(AuthApiError::GrantRevoked));
        let mut mgr = TokenManager::new(api, cred_store);

        let err = mgr.refresh().unwrap_err();
        assert!(matches!(err, SyncError::Auth(AuthError::GrantRevoked)));
        assert!(mgr.credential().authorization_code.is_none());
        assert!(mgr.credential().access_token.is_none());
        assert!(mgr.credential().refresh_token.is_none());

        // Next ensure_active re-enters the manual PIN path, not refresh.
        let err = mgr.ensure_active().unwrap_err();
        assert!(matches!(
            err,
            SyncError::Auth(AuthError::AuthorizationPending { .. })
        ));
        assert_eq!(mgr.api.authorize_calls.get(), 1);
    }

    #[test]
    fn transient_refresh_failure_keeps_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut cred_store = store(&dir);
        cred_store.set_authorization("bv29", "the-code").unwrap();
        cred_store.set_token_pair("acc", "ref", None).unwrap();

        let api = ScriptedAuth::new();
        api.refresh_results
            .borrow_mut()
            .push(Err(AuthApiError::Remote(RemoteError::Timeout(
                "read timed out".to_string(),
            ))));
        let mut mgr = TokenManager::new(api, cred_store);

        assert!(mgr.refresh().is_err());
        // Grant untouched; the next run can retry refresh.
        assert_eq!(mgr.credential().refresh_token.as_deref(), Some("ref"));
        assert_eq!(mgr.credential().authorization_code.as_deref(), Some("the-code"));
    }
}
