//! The thinnest possible HTTP adapter making the in-process poll contract
//! observable: `GET /polls/:id`, merged with the push-token callback
//! route from [`crate::push`].
//!
//! Full HTTP routing is explicitly out of scope (spec §1); this exists
//! only for manual exercising and the end-to-end scenarios in spec §8.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, NotifyError};
use crate::poll::{PollCoalescer, PollResult, Poller};
use crate::push::GatewayState;

/// State backing the `GET /polls/:id` route.
pub struct PollState<P: Poller> {
    /// The coalescer dedup-caching fetches across concurrent callers.
    pub coalescer: Arc<PollCoalescer>,
    /// The poller invoked on a cache miss.
    pub poller: Arc<P>,
}

async fn poll_handler<P: Poller>(
    State(state): State<Arc<PollState<P>>>,
    Path(id): Path<String>,
) -> Result<Json<PollResult>, ApiError> {
    let result = state
        .coalescer
        .poll(&id, state.poller.as_ref(), true)
        .await
        .map_err(NotifyError::from)?;
    Ok(Json(result))
}

/// `GET /polls/:id`, coalesced through `state.coalescer`.
pub fn poll_router<P: Poller + 'static>(state: Arc<PollState<P>>) -> Router {
    Router::new()
        .route("/polls/:id", get(poll_handler::<P>))
        .with_state(state)
}

/// The full gateway surface: the manual poll route plus the push-token
/// callback route, mounted as independently-stated sub-routers and
/// merged.
pub fn router<P: Poller + 'static>(
    poll_state: Arc<PollState<P>>,
    gateway_state: Arc<GatewayState<P>>,
) -> Router {
    poll_router(poll_state)
        .merge(crate::push::gateway_router(gateway_state))
        .layer(TraceLayer::new_for_http())
}
