//! `createExchangeWatcher` / `createExchangePoller` (spec §4.5): the thin
//! glue between the opaque `ResourceClient` and the watcher/poller
//! contracts that C3/C4 actually run.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DomainError;
use crate::poll::{PollOutcome, PollResult, Poller};
use crate::ports::{Capability, ResourceClient};
use crate::watch::{Watcher, WatcherOutcome, WatchRecord};

/// States at which an exchange is considered terminal: no further polling
/// or watching can change the observed value.
const TERMINAL_STATES: [&str; 2] = ["complete", "invalid"];

fn is_terminal(exchange: &Value) -> bool {
    exchange
        .get("state")
        .and_then(Value::as_str)
        .is_some_and(|state| TERMINAL_STATES.contains(&state))
}

/// Projects an observed exchange document (plus the last-known value, if
/// any) into the snapshot a watch/poll result should carry.
///
/// Returning `None` signals "nothing new observed" — the watcher path
/// treats this as a no-op write; the poller path treats it as "reuse the
/// current result".
pub trait ExchangeFilter: Send + Sync {
    /// Apply the filter.
    fn filter(&self, current_value: Option<&Value>, exchange: &Value) -> Option<Value>;
}

impl<F> ExchangeFilter for F
where
    F: Fn(Option<&Value>, &Value) -> Option<Value> + Send + Sync,
{
    fn filter(&self, current_value: Option<&Value>, exchange: &Value) -> Option<Value> {
        self(current_value, exchange)
    }
}

/// `createExchangeWatcher({capability, filter, client})`.
pub struct ExchangeWatcher<C, F> {
    capability: String,
    client: Arc<C>,
    filter: F,
}

impl<C, F> ExchangeWatcher<C, F>
where
    C: ResourceClient,
    F: ExchangeFilter,
{
    /// Build a watcher reading `record.watch.id` through `client` with
    /// `capability`, projecting with `filter`.
    pub fn new(capability: impl Into<String>, client: Arc<C>, filter: F) -> Self {
        Self {
            capability: capability.into(),
            client,
            filter,
        }
    }
}

#[async_trait]
impl<C, F> Watcher for ExchangeWatcher<C, F>
where
    C: ResourceClient,
    F: ExchangeFilter,
{
    async fn invoke(&self, record: &WatchRecord) -> Result<WatcherOutcome, DomainError> {
        let capability: &Capability = &self.capability;
        let exchange = self
            .client
            .read(&record.watch.id, capability)
            .await
            .map_err(DomainError::operation)?;
        let mutable = !is_terminal(&exchange);

        Ok(match self.filter.filter(record.watch.value.as_ref(), &exchange) {
            None => WatcherOutcome {
                value: None,
                mutable: record.watch.mutable,
            },
            Some(value) => WatcherOutcome {
                value: Some(value),
                mutable,
            },
        })
    }
}

/// `createExchangePoller({capability, filter, client})`: the analogous
/// factory for the poll path.
pub struct ExchangePoller<C, F> {
    capability: String,
    client: Arc<C>,
    filter: F,
}

impl<C, F> ExchangePoller<C, F>
where
    C: ResourceClient,
    F: ExchangeFilter,
{
    /// Build a poller reading `id` through `client` with `capability`,
    /// projecting with `filter`.
    pub fn new(capability: impl Into<String>, client: Arc<C>, filter: F) -> Self {
        Self {
            capability: capability.into(),
            client,
            filter,
        }
    }
}

#[async_trait]
impl<C, F> Poller for ExchangePoller<C, F>
where
    C: ResourceClient,
    F: ExchangeFilter,
{
    async fn poll(&self, id: &str, current: Option<&PollResult>) -> Result<PollOutcome, DomainError> {
        let exchange = self
            .client
            .read(id, &self.capability)
            .await
            .map_err(DomainError::operation)?;
        let mutable = !is_terminal(&exchange);
        let current_value = current.map(|result| &result.value);

        Ok(match self.filter.filter(current_value, &exchange) {
            None => PollOutcome {
                value: current.map_or(Value::Null, |result| result.value.clone()),
                mutable,
            },
            Some(value) => PollOutcome { value, mutable },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FakeClient {
        response: Value,
    }

    #[async_trait]
    impl ResourceClient for FakeClient {
        async fn read(
            &self,
            _url: &str,
            _capability: &Capability,
        ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self.response.clone())
        }

        async fn write(
            &self,
            _url: &str,
            _capability: &Capability,
            _body: Value,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    fn passthrough_filter(_current: Option<&Value>, exchange: &Value) -> Option<Value> {
        Some(exchange.clone())
    }

    fn record_with(value: Option<Value>, mutable: bool) -> WatchRecord {
        use chrono::Utc;

        use crate::watch::{Watch, WatchMeta};

        WatchRecord {
            watch: Watch {
                id: "ex-1".into(),
                sequence: 0,
                watcher: "watchExchange".into(),
                value,
                mutable,
                expires: Utc::now() + chrono::Duration::minutes(5),
            },
            meta: WatchMeta {
                created: Utc::now(),
                updated: Utc::now(),
                watcher_lock: None,
            },
        }
    }

    #[tokio::test]
    async fn watcher_reports_mutable_when_state_is_pending() {
        let client = Arc::new(FakeClient {
            response: json!({"state": "pending"}),
        });
        let watcher = ExchangeWatcher::new("cap", client, passthrough_filter);
        let outcome = watcher.invoke(&record_with(None, true)).await.unwrap();
        assert!(outcome.mutable);
        assert_eq!(outcome.value, Some(json!({"state": "pending"})));
    }

    #[tokio::test]
    async fn watcher_reports_terminal_for_complete_and_invalid() {
        for state in ["complete", "invalid"] {
            let client = Arc::new(FakeClient {
                response: json!({"state": state}),
            });
            let watcher = ExchangeWatcher::new("cap", client, passthrough_filter);
            let outcome = watcher.invoke(&record_with(None, true)).await.unwrap();
            assert!(!outcome.mutable, "state {state} should be terminal");
        }
    }

    #[tokio::test]
    async fn watcher_no_op_when_filter_returns_none() {
        let client = Arc::new(FakeClient {
            response: json!({"state": "pending"}),
        });
        let watcher = ExchangeWatcher::new("cap", client, |_current: Option<&Value>, _exchange: &Value| None);
        let outcome = watcher.invoke(&record_with(None, false)).await.unwrap();
        assert_eq!(outcome.value, None);
        assert!(!outcome.mutable); // echoes record.watch.mutable
    }

    #[tokio::test]
    async fn poller_reuses_current_value_when_filter_yields_nothing_new() {
        let client = Arc::new(FakeClient {
            response: json!({"state": "pending"}),
        });
        let poller = ExchangePoller::new("cap", client, |_current: Option<&Value>, _exchange: &Value| None);
        let current = PollResult {
            id: "ex-1".into(),
            sequence: 1,
            mutable: true,
            value: json!({"state": "pending"}),
        };
        let outcome = poller.poll("ex-1", Some(&current)).await.unwrap();
        assert_eq!(outcome.value, current.value);
    }
}
