//! Blocking HTTP client for the remote device-management API.
//!
//! Remote calls are multi-second; everything here is synchronous with
//! explicit timeouts, and the bulk report call gets its own client with an
//! extended timeout. API-level failures arrive in a `{status: {code,
//! message}}` envelope on the data endpoints and an `{error,
//! error_description}` body on the auth endpoints; both are mapped to the
//! typed errors the retry controller and token manager classify on.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::{AuthApiError, RemoteError};
use crate::remote::types::{AuthGrant, Device, DeviceSummary, TokenPair};
use crate::remote::{AuthApi, ReportApi};
use crate::storage::columns::report_column_list;
use crate::window::Window;

/// The API status code reserved for "token invalid/expired".
pub const TOKEN_EXPIRED_CODE: i64 = 14;

const FIRST_CONNECTED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct EcobeeClient {
    http: Client,
    report_http: Client,
    base_url: String,
}

impl EcobeeClient {
    pub fn new(cfg: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        let report_http = Client::builder()
            .timeout(Duration::from_secs(cfg.report_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            report_http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn send_json(req: reqwest::blocking::RequestBuilder) -> Result<Value, RemoteError> {
        let resp = req.send().map_err(classify_transport)?;
        let text = resp.text().map_err(classify_transport)?;
        if text.trim().is_empty() {
            // The remote sporadically returns empty bodies under load;
            // handled like a dropped connection.
            return Err(RemoteError::Connection("empty response body".to_string()));
        }
        serde_json::from_str(&text)
            .map_err(|e| RemoteError::Malformed(format!("undecodable response: {e}")))
    }

    fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenPair, AuthApiError> {
        let body = Self::send_json(
            self.http
                .post(format!("{}/token", self.base_url))
                .query(params),
        )?;
        if body.get("error").is_some() {
            return Err(auth_error(&body));
        }
        let access_token = required_str(&body, "access_token")?;
        let refresh_token = required_str(&body, "refresh_token")?;
        let expires_at = body
            .get("expires_in")
            .and_then(Value::as_i64)
            .map(|secs| chrono::Utc::now().timestamp() + secs);
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    fn data_request(
        &self,
        client: &Client,
        endpoint: &str,
        access_token: &str,
        selection: Value,
    ) -> Result<Value, RemoteError> {
        let body = Self::send_json(
            client
                .get(format!("{}/1/{endpoint}", self.base_url))
                .bearer_auth(access_token)
                .header("Content-Type", "application/json;charset=UTF-8")
                .query(&[("json", selection.to_string())]),
        )?;
        check_status(&body)?;
        Ok(body)
    }
}

impl AuthApi for EcobeeClient {
    fn authorize(&self, application_key: &str) -> Result<AuthGrant, AuthApiError> {
        let body = Self::send_json(self.http.get(format!("{}/authorize", self.base_url)).query(
            &[
                ("response_type", "ecobeePin"),
                ("client_id", application_key),
                ("scope", "smartRead"),
            ],
        ))?;
        if body.get("error").is_some() {
            return Err(auth_error(&body));
        }
        Ok(AuthGrant {
            pin: required_str(&body, "ecobeePin")?,
            code: required_str(&body, "code")?,
        })
    }

    fn issue_tokens(&self, application_key: &str, code: &str) -> Result<TokenPair, AuthApiError> {
        self.token_request(&[
            ("grant_type", "ecobeePin"),
            ("code", code),
            ("client_id", application_key),
        ])
    }

    fn refresh_tokens(
        &self,
        application_key: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthApiError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", application_key),
        ])
    }
}

impl ReportApi for EcobeeClient {
    fn thermostat_summary(&self, access_token: &str) -> Result<Vec<DeviceSummary>, RemoteError> {
        let selection = json!({
            "selection": {
                "selectionType": "registered",
                "selectionMatch": "",
                "includeEquipmentStatus": true,
            }
        });
        let body = self.data_request(&self.http, "thermostatSummary", access_token, selection)?;
        let list = body
            .get("revisionList")
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::Malformed("summary missing revisionList".to_string()))?;

        let mut summaries = Vec::with_capacity(list.len());
        for entry in list {
            let Some(line) = entry.as_str() else {
                warn!("non-string revision entry skipped: {entry}");
                continue;
            };
            match DeviceSummary::parse(line) {
                Ok(s) => summaries.push(s),
                // Unexpected shape on one entry must not sink the run.
                Err(e) => warn!(error = %e, "unparseable revision entry skipped"),
            }
        }
        Ok(summaries)
    }

    fn thermostats(&self, access_token: &str) -> Result<Vec<Device>, RemoteError> {
        let selection = json!({
            "selection": {
                "selectionType": "registered",
                "selectionMatch": "",
                "includeRuntime": true,
            }
        });
        let body = self.data_request(&self.http, "thermostat", access_token, selection)?;
        let list = body
            .get("thermostatList")
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::Malformed("details missing thermostatList".to_string()))?;

        let mut devices = Vec::with_capacity(list.len());
        for entry in list {
            let id = entry.get("identifier").and_then(Value::as_str);
            let name = entry.get("name").and_then(Value::as_str);
            let first = entry
                .pointer("/runtime/firstConnected")
                .and_then(Value::as_str)
                .and_then(|s| NaiveDateTime::parse_from_str(s, FIRST_CONNECTED_FORMAT).ok());
            match (id, name, first) {
                (Some(id), Some(name), Some(first_connected)) => devices.push(Device {
                    id: id.to_string(),
                    name: name.to_string(),
                    first_connected,
                }),
                _ => warn!("thermostat entry missing identifier/name/firstConnected; skipped"),
            }
        }
        Ok(devices)
    }

    fn runtime_report(
        &self,
        access_token: &str,
        device_id: &str,
        window: &Window,
    ) -> Result<Vec<String>, RemoteError> {
        let selection = json!({
            "startDate": window.start.format("%Y-%m-%d").to_string(),
            "startInterval": interval_of(window.start),
            "endDate": window.end.format("%Y-%m-%d").to_string(),
            "endInterval": interval_of(window.end),
            "columns": report_column_list(),
            "includeSensors": false,
            "selection": {
                "selectionType": "thermostats",
                "selectionMatch": device_id,
            }
        });
        let body =
            self.data_request(&self.report_http, "runtimeReport", access_token, selection)?;
        let reports = body
            .get("reportList")
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::Malformed("report missing reportList".to_string()))?;

        let mut rows = Vec::new();
        for report in reports {
            if let Some(list) = report.get("rowList").and_then(Value::as_array) {
                rows.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
        debug!(device = device_id, rows = rows.len(), "report rows received");
        Ok(rows)
    }
}

/// 5-minute slot index within the day, as the report API counts intervals.
fn interval_of(t: NaiveDateTime) -> i64 {
    use chrono::Timelike;
    (t.time().hour() as i64 * 60 + t.time().minute() as i64) / 5
}

fn classify_transport(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(e.to_string())
    } else {
        RemoteError::Connection(e.to_string())
    }
}

fn check_status(body: &Value) -> Result<(), RemoteError> {
    match body.pointer("/status/code").and_then(Value::as_i64) {
        None | Some(0) => Ok(()),
        Some(code) if code == TOKEN_EXPIRED_CODE => Err(RemoteError::AuthExpired { code }),
        Some(code) => Err(RemoteError::Api {
            code,
            message: body
                .pointer("/status/message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
    }
}

fn auth_error(body: &Value) -> AuthApiError {
    let error = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let description = body
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if error == "authorization_pending" || description.contains("Waiting for user to authorize") {
        AuthApiError::WaitingForUser
    } else if error == "authorization_expired" || description.contains("authorization has expired")
    {
        AuthApiError::AuthorizationExpired
    } else if error == "invalid_grant" || description.contains("invalid, expired, revoked") {
        AuthApiError::GrantRevoked
    } else {
        AuthApiError::Endpoint { error, description }
    }
}

fn required_str(body: &Value, key: &str) -> Result<String, RemoteError> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RemoteError::Malformed(format!("response missing '{key}'")))
}
