//! Spool lookup over HTTP.
//!
//! Every newly arrived tag is posted to the inventory service's
//! `nfc_lookup.php` endpoint. The call never fails: transport problems,
//! unexpected status codes and malformed bodies all become
//! [`LookupResult::TransportError`] so the scan loop keeps running.

use crate::tag_uid::TagUid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Path of the lookup endpoint below the configured base URL.
pub const LOOKUP_PATH: &str = "nfc_lookup.php";

/// Product part of the `User-Agent` header (`<product>/<scanner id>`).
pub const USER_AGENT_PRODUCT: &str = "ACR122U-Scanner";

/// Reader type reported with every lookup.
pub const READER_TYPE: &str = "ACR122U";

/// Upper bound for a single lookup request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of body characters kept in a status error.
pub const BODY_EXCERPT_LEN: usize = 200;

/// Spool identifier; the service sends it either as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SpoolId {
    Number(u64),
    Text(String),
}

impl fmt::Display for SpoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoolId::Number(id) => write!(f, "{id}"),
            SpoolId::Text(id) => f.write_str(id),
        }
    }
}

/// The spool a tag is attached to.
///
/// Weights are in grams. `remaining_weight <= total_weight` is the service's
/// contract and is not checked here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpoolRecord {
    pub id: SpoolId,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub filament_type: Option<String>,
    #[serde(default)]
    pub color_name: Option<String>,
    #[serde(default)]
    pub remaining_weight: f64,
    #[serde(default)]
    pub total_weight: f64,
    #[serde(default)]
    pub location: Option<String>,
}

impl SpoolRecord {
    /// Remaining share of the spool in percent, if the total is known.
    pub fn remaining_percent(&self) -> Option<f64> {
        (self.total_weight > 0.0).then(|| self.remaining_weight * 100.0 / self.total_weight)
    }
}

/// Tag metadata stored alongside the spool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NfcInfo {
    #[serde(default)]
    pub tag_type: Option<String>,
    #[serde(default)]
    pub tag_position: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_primary: Option<bool>,
}

/// Accept `true`/`false` as well as the `0`/`1` a database column produces.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => Some(b),
        Some(Flag::Number(n)) => Some(n != 0),
        Some(Flag::Text(s)) => Some(s == "1" || s.eq_ignore_ascii_case("true")),
        None => None,
    })
}

/// Why a lookup produced no answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("HTTP {code}: {excerpt}")]
    Status { code: u16, excerpt: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("lookup rejected: {0}")]
    Rejected(String),
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Found {
        spool: SpoolRecord,
        nfc_info: Option<NfcInfo>,
    },
    NotFound,
    TransportError(TransportError),
}


#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    nfc_uid: &'a str,
    scanner_id: &'a str,
    timestamp: u64,
    reader_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    found: Option<bool>,
    #[serde(default)]
    spool: Option<SpoolRecord>,
    #[serde(default)]
    nfc_info: Option<NfcInfo>,
    #[serde(default)]
    error: Option<String>,
}

/// Map an HTTP status and body onto a [`LookupResult`].
pub fn interpret_response(status: u16, body: &str) -> LookupResult {
    if !(200..300).contains(&status) {
        return LookupResult::TransportError(TransportError::Status {
            code: status,
            excerpt: body.chars().take(BODY_EXCERPT_LEN).collect(),
        });
    }

    let response: LookupResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(err) => return LookupResult::TransportError(TransportError::Decode(err.to_string())),
    };

    match response {
        LookupResponse {
            found: Some(true),
            spool: Some(spool),
            nfc_info,
            ..
        } => LookupResult::Found { spool, nfc_info },
        LookupResponse {
            found: Some(true),
            spool: None,
            ..
        } => LookupResult::TransportError(TransportError::Decode(
            "response marked found but carries no spool".to_string(),
        )),
        LookupResponse {
            found: Some(false),
            ..
        } => LookupResult::NotFound,
        LookupResponse {
            error: Some(message),
            ..
        } => LookupResult::TransportError(TransportError::Rejected(message)),
        LookupResponse { found: None, .. } => LookupResult::TransportError(
            TransportError::Decode("response has no 'found' field".to_string()),
        ),
    }
}

/// Lookup abstraction so the scan loop can be tested without a server.
pub trait Lookup: Send + Sync {
    fn lookup<'a>(
        &'a self,
        uid: &'a TagUid,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>>;
}

/// HTTP client for the spool inventory's NFC lookup endpoint.
#[derive(Debug, Clone)]
pub struct LookupClient {
    client: reqwest::Client,
    endpoint: String,
    scanner_id: String,
}

impl LookupClient {
    /// Create a client for `base_url` with the default request timeout.
    pub fn new(base_url: &str, scanner_id: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, scanner_id, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        scanner_id: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("{USER_AGENT_PRODUCT}/{scanner_id}"))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), LOOKUP_PATH),
            scanner_id: scanner_id.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Look up the spool registered for `uid`.
    pub async fn lookup(&self, uid: &TagUid) -> LookupResult {
        let nfc_uid = uid.to_string();
        let request = LookupRequest {
            nfc_uid: &nfc_uid,
            scanner_id: &self.scanner_id,
            timestamp: unix_timestamp(),
            reader_type: READER_TYPE,
        };

        tracing::debug!(endpoint = %self.endpoint, uid = %nfc_uid, "sending lookup");

        let response = match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(err) => return LookupResult::TransportError(transport_error(err)),
        };

        let status = response.status();
        tracing::debug!(%status, "lookup response");

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return LookupResult::TransportError(transport_error(err)),
        };

        interpret_response(status.as_u16(), &body)
    }
}

impl Lookup for LookupClient {
    fn lookup<'a>(
        &'a self,
        uid: &'a TagUid,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        Box::pin(LookupClient::lookup(self, uid))
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    let cause = error_chain(&err);
    if err.is_timeout() {
        TransportError::Timeout(cause)
    } else if err.is_decode() {
        TransportError::Decode(cause)
    } else {
        TransportError::Network(cause)
    }
}

/// Render an error with all its sources; reqwest's top-level message alone
/// rarely says what went wrong.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
