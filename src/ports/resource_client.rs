//! The `ResourceClient` port: the capability-bearing HTTP client used to
//! read and write externally hosted exchange resources.
//!
//! This is explicitly out of scope for this crate's core engineering (see
//! the crate-level docs); it is modeled as a trait so the watcher/poller
//! adapters in [`crate::adapters::exchange`] can be exercised against a
//! fake in tests.

use async_trait::async_trait;
use serde_json::Value;

/// Opaque authorization credential passed alongside a resource URL.
pub type Capability = str;

/// Port for reading and writing externally hosted exchange resources over
/// a capability-bearing transport.
///
/// # Implementation Notes
///
/// A production implementation wraps an HTTPS client, attaching `capability`
/// as an authorization header. Failure of any kind (network, HTTP status,
/// malformed body) should be surfaced as a boxed source error — callers
/// wrap it into `DomainError::Operation`.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Read the resource at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn read(
        &self,
        url: &str,
        capability: &Capability,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;

    /// Write `body` to the resource at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn write(
        &self,
        url: &str,
        capability: &Capability,
        body: Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
