//! Bounded retry around remote calls.
//!
//! Every remote data call gets the same budget: up to [`MAX_ATTEMPTS`]
//! tries, immediately back-to-back. A token-expired signal spends one
//! attempt on a refresh; timeouts and connection drops just retry; any
//! other failure aborts at once. An exhausted budget is fatal for the
//! whole run so the next scheduled run restarts from the checkpoint.

use tracing::warn;

use crate::error::{RemoteError, SyncError};
use crate::remote::AuthApi;
use crate::token::TokenManager;

/// Attempt budget per remote operation, refresh attempts included.
pub const MAX_ATTEMPTS: u32 = 4;

/// A successful result plus how many attempts it burned getting there.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Runs `call` with the current access token, refreshing and retrying
/// within the attempt budget.
pub fn with_retry<T, A, F>(
    operation: &str,
    tokens: &mut TokenManager<A>,
    mut call: F,
) -> Result<Retried<T>, SyncError>
where
    A: AuthApi,
    F: FnMut(&str) -> Result<T, RemoteError>,
{
    let mut last: Option<RemoteError> = None;

    for attempt in 0..MAX_ATTEMPTS {
        let token = tokens.access_token()?;
        match call(&token) {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempt,
                })
            }
            Err(e) if e.is_auth_expired() => {
                warn!(operation, attempt = attempt + 1, "access token rejected; refreshing");
                tokens.refresh()?;
                last = Some(e);
            }
            Err(e) if e.is_transient() => {
                warn!(operation, attempt = attempt + 1, error = %e, "transient failure; retrying");
                last = Some(e);
            }
            Err(e) => return Err(SyncError::RemotePermanent(e)),
        }
    }

    // last is always Some here: the loop only falls through after a failure.
    Err(SyncError::RetryExhausted {
        operation: operation.to_string(),
        attempts: MAX_ATTEMPTS,
        last: last.unwrap_or_else(|| RemoteError::Connection("no attempt recorded".to_string())),
    })
}
