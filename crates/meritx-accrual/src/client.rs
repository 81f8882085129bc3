use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use meritx_core::MeritxError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Order status as reported by the accrual system. `Unknown` absorbs any
/// status string this service does not recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
    #[serde(other)]
    Unknown,
}

/// Body of a 200 response from `GET /api/orders/{number}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualReply {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Decimal,
}

/// The outcome algebra of one upstream call.
#[derive(Debug, Clone)]
pub enum AccrualOutcome {
    Received(AccrualReply),
    /// 204 — the order is not (yet) known upstream.
    NotRegistered,
    /// 429 — back off for the carried duration before polling again.
    RateLimited(Duration),
}

/// Seam between the reconciler and the upstream transport.
#[async_trait]
pub trait AccrualApi: Send + Sync {
    async fn get_order(&self, number: &str) -> Result<AccrualOutcome, MeritxError>;
}

/// HTTP client for the external accrual system.
pub struct AccrualClient {
    base: String,
    client: reqwest::Client,
}

impl AccrualClient {
    pub fn new(base: &str) -> Result<Self, MeritxError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MeritxError::Internal(format!("building accrual client: {e}")))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl AccrualApi for AccrualClient {
    async fn get_order(&self, number: &str) -> Result<AccrualOutcome, MeritxError> {
        let url = format!("{}/api/orders/{}", self.base, number);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                MeritxError::DeadlineExceeded
            } else {
                MeritxError::Accrual(e.to_string())
            }
        })?;

        match resp.status() {
            StatusCode::OK => {
                let reply: AccrualReply = resp
                    .json()
                    .await
                    .map_err(|e| MeritxError::Accrual(format!("decoding accrual reply: {e}")))?;
                Ok(AccrualOutcome::Received(reply))
            }
            StatusCode::NO_CONTENT => Ok(AccrualOutcome::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(parse_retry_after)
                    .unwrap_or(Duration::ZERO);
                Ok(AccrualOutcome::RateLimited(retry_after))
            }
            other => Err(MeritxError::Accrual(format!(
                "unexpected status {other} from accrual system"
            ))),
        }
    }
}

/// Parse a `Retry-After` header value: either non-negative delta-seconds or
/// an HTTP-date meaning "until that wall clock". Anything unparseable maps
/// to zero, which degrades to polling again on the next tick.
fn parse_retry_after(value: &str) -> Duration {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Duration::from_secs(secs);
    }

    let parsers: [fn(&str) -> chrono::ParseResult<DateTime<chrono::FixedOffset>>; 2] =
        [DateTime::parse_from_rfc2822, DateTime::parse_from_rfc3339];
    for parse in parsers {
        if let Ok(at) = parse(value) {
            let until = at.with_timezone(&Utc) - Utc::now();
            return until.to_std().unwrap_or(Duration::ZERO);
        }
    }

    Duration::ZERO
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retry_after_parses_delta_seconds() {
        assert_eq!(parse_retry_after("0"), Duration::ZERO);
        assert_eq!(parse_retry_after("2"), Duration::from_secs(2));
        assert_eq!(parse_retry_after(" 60 "), Duration::from_secs(60));
    }

    #[test]
    fn retry_after_parses_http_dates() {
        let future = (Utc::now() + chrono::Duration::seconds(30)).to_rfc2822();
        let parsed = parse_retry_after(&future);
        assert!(parsed > Duration::from_secs(25) && parsed <= Duration::from_secs(30));

        let past = (Utc::now() - chrono::Duration::seconds(30)).to_rfc2822();
        assert_eq!(parse_retry_after(&past), Duration::ZERO);

        let rfc3339 = (Utc::now() + chrono::Duration::seconds(30)).to_rfc3339();
        assert!(parse_retry_after(&rfc3339) > Duration::from_secs(25));
    }

    #[test]
    fn retry_after_treats_garbage_as_zero() {
        for value in ["", "later", "-5", "2.5", "Tue, 32 Nov 1994"] {
            assert_eq!(parse_retry_after(value), Duration::ZERO, "value {value:?}");
        }
    }

    #[test]
    fn reply_decodes_with_and_without_accrual() {
        let reply: AccrualReply =
            serde_json::from_str(r#"{"order":"12345678903","status":"PROCESSED","accrual":50.0}"#)
                .unwrap();
        assert_eq!(reply.status, AccrualStatus::Processed);
        assert_eq!(reply.accrual, Decimal::new(500, 1));

        let reply: AccrualReply =
            serde_json::from_str(r#"{"order":"12345678903","status":"REGISTERED"}"#).unwrap();
        assert_eq!(reply.status, AccrualStatus::Registered);
        assert_eq!(reply.accrual, Decimal::ZERO);
    }

    #[test]
    fn unrecognised_status_decodes_as_unknown() {
        let reply: AccrualReply =
            serde_json::from_str(r#"{"order":"1","status":"QUEUED"}"#).unwrap();
        assert_eq!(reply.status, AccrualStatus::Unknown);
    }
}
