//! Gateway middleware: the HTTP adapter that lets an origin call back into
//! this process to trigger an immediate re-poll, authenticated by a push
//! token.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::DomainError;
use crate::ports::Clock;
use crate::poll::Poller;

use super::key::HmacKey;
use super::token::verify_push_token;

/// Shared state the gateway handler needs: the HMAC key (absent disables
/// push entirely), a clock, and the poll coalescer plus poller used to
/// drive the resulting re-poll.
pub struct GatewayState<P: Poller> {
    /// `None` when push notifications are disabled.
    pub hmac_key: Option<Arc<HmacKey>>,
    pub clock: Arc<dyn Clock>,
    pub coalescer: Arc<crate::poll::PollCoalescer>,
    pub poller: Arc<P>,
    pub expected_event: Option<String>,
}

/// Request body shape the origin posts to the callback URL:
/// `{ event: { data: { exchangeId: <id> } } }`.
#[derive(Debug, Deserialize)]
struct CallbackBody {
    event: CallbackEvent,
}

#[derive(Debug, Deserialize)]
struct CallbackEvent {
    data: CallbackData,
}

#[derive(Debug, Deserialize)]
struct CallbackData {
    #[serde(rename = "exchangeId")]
    exchange_id: String,
}

/// `POST /callbacks/:push_token` — verifies the token and triggers an
/// uncached re-poll of the referenced exchange.
///
/// Responds `204 No Content` on success; `400 Bad Request` if the token
/// fails verification, the body is malformed, or push is disabled.
pub async fn callback_handler<P: Poller>(
    State(state): State<Arc<GatewayState<P>>>,
    Path(push_token): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let Some(key) = state.hmac_key.as_ref() else {
        warn!("push callback received but push notifications are disabled");
        return StatusCode::BAD_REQUEST;
    };

    if verify_push_token(key, &push_token, state.expected_event.as_deref(), state.clock.as_ref())
        .is_err()
    {
        debug!("rejected push callback: invalid push token");
        return StatusCode::BAD_REQUEST;
    }

    let Ok(parsed) = serde_json::from_slice::<CallbackBody>(&body) else {
        debug!("rejected push callback: malformed body");
        return StatusCode::BAD_REQUEST;
    };

    match state
        .coalescer
        .poll(&parsed.event.data.exchange_id, state.poller.as_ref(), false)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT,
        Err(DomainError::QuotaExceeded) => StatusCode::SERVICE_UNAVAILABLE,
        Err(err) => {
            warn!(error = %err, "push-triggered poll failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Mount the `POST /callbacks/:push_token` route against `state`.
///
/// The thinnest possible adapter needed to make the callback contract
/// observable over HTTP; full HTTP routing is the application's concern.
pub fn gateway_router<P: Poller + 'static>(state: Arc<GatewayState<P>>) -> Router {
    Router::new()
        .route("/callbacks/:push_token", post(callback_handler::<P>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::poll::{PollOutcome, PollResult};
    use crate::ports::FakeClock;

    struct StaticPoller;

    #[async_trait::async_trait]
    impl Poller for StaticPoller {
        async fn poll(
            &self,
            _id: &str,
            _current: Option<&PollResult>,
        ) -> Result<PollOutcome, DomainError> {
            Ok(PollOutcome {
                value: serde_json::json!({"state": "pending"}),
                mutable: true,
            })
        }
    }

    fn test_key() -> HmacKey {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let mut bytes = vec![0xA2, 0x01];
        bytes.extend_from_slice(&[3u8; 32]);
        HmacKey::from_multibase(&format!("u{}", URL_SAFE_NO_PAD.encode(bytes))).unwrap()
    }

    #[tokio::test]
    async fn valid_token_triggers_poll_and_returns_204() {
        let key = Arc::new(test_key());
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let pair = super::super::token::create_push_token(&key, "exchangeUpdated", None, clock.as_ref());

        let state = Arc::new(GatewayState {
            hmac_key: Some(key),
            clock: clock.clone(),
            coalescer: Arc::new(crate::poll::PollCoalescer::new(10, 100, std::time::Duration::from_secs(30))),
            poller: Arc::new(StaticPoller),
            expected_event: Some("exchangeUpdated".into()),
        });

        let body = serde_json::to_vec(&serde_json::json!({
            "event": {"data": {"exchangeId": "ex-1"}}
        }))
        .unwrap();

        let status = callback_handler(
            State(state),
            Path(pair.token),
            Bytes::from(body),
        )
        .await
        .into_response()
        .status();

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn invalid_token_returns_400() {
        let key = Arc::new(test_key());
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::now_fake());
        let state = Arc::new(GatewayState {
            hmac_key: Some(key),
            clock,
            coalescer: Arc::new(crate::poll::PollCoalescer::new(10, 100, std::time::Duration::from_secs(30))),
            poller: Arc::new(StaticPoller),
            expected_event: None,
        });

        let status = callback_handler(State(state), Path("not-a-token".into()), Bytes::new())
            .await
            .into_response()
            .status();

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
