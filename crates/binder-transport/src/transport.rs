use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::BinderConfig;
use crate::error::{BinderError, BinderErrorKind};
use binder_types::{ApiAddress, ConnectionId, EventPattern, PushEvent};

/// Link to a remote binder. Implementations own framing, reply matching and event
/// dispatch; callers only see one resolution per call and a stream of pushes.
#[async_trait]
pub trait BinderTransport: Send + Sync {
    /// Open the link. Called at most once per session.
    async fn open(&self, config: &BinderConfig) -> Result<ConnectionId, BinderError>;

    /// Issue `api/verb` with `payload`; resolves once with the binder's reply or error.
    async fn call(&self, address: &ApiAddress, payload: Value) -> Result<Value, BinderError>;

    /// Stream of pushed events whose name matches `pattern`.
    async fn subscribe(
        &self,
        pattern: &EventPattern,
    ) -> Result<mpsc::Receiver<PushEvent>, BinderError>;

    /// Resolves once the link is gone, whether it dropped or never opened.
    async fn closed(&self);
}

/// Transport used when no binder is reachable; every open is refused.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl BinderTransport for NoopTransport {
    async fn open(&self, config: &BinderConfig) -> Result<ConnectionId, BinderError> {
        Err(BinderError::new(BinderErrorKind::ConnectionRefused)
            .with_hint(format!("no transport available for {}", config.ws_url())))
    }

    async fn call(&self, address: &ApiAddress, _payload: Value) -> Result<Value, BinderError> {
        Err(BinderError::new(BinderErrorKind::LinkClosed)
            .with_hint(format!("transport not available for {address}")))
    }

    async fn subscribe(
        &self,
        pattern: &EventPattern,
    ) -> Result<mpsc::Receiver<PushEvent>, BinderError> {
        Err(BinderError::new(BinderErrorKind::LinkClosed)
            .with_hint(format!("transport not available for events {pattern}")))
    }

    async fn closed(&self) {}
}
