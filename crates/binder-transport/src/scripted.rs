//! In-memory binder driven by registered verb handlers.
//!
//! Calls flow through a command channel into a single loop task, the same way a socket-backed
//! transport would serialise them, so replies resolve in loop order unless an address is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use binder_event_bus::{subscribe_matching, EventBus, InMemoryBus};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BinderConfig;
use crate::error::{BinderError, BinderErrorKind};
use crate::transport::BinderTransport;
use binder_types::{ApiAddress, ConnectionId, EventPattern, PushEvent};

/// Reply produced by a verb handler: `Ok` resolves the call, `Err` rejects it with the
/// given payload.
pub type VerbHandler = Arc<dyn Fn(&Value) -> Result<Value, Value> + Send + Sync>;

type Responder = oneshot::Sender<Result<Value, BinderError>>;

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 64;

enum Control {
    Call {
        address: ApiAddress,
        payload: Value,
        responder: Responder,
    },
    Release(ApiAddress),
}

struct Link {
    id: ConnectionId,
    command_tx: mpsc::Sender<Control>,
    loop_task: JoinHandle<()>,
}

type Handlers = Arc<DashMap<ApiAddress, VerbHandler>>;
type Held = Arc<DashSet<ApiAddress>>;

struct Inner {
    handlers: Handlers,
    held: Held,
    events: Arc<InMemoryBus<PushEvent>>,
    link: Mutex<Option<Link>>,
    refuse: AtomicBool,
    closed: CancellationToken,
    journal: Mutex<Vec<(ApiAddress, Value)>>,
}

/// Binder double that answers calls from registered handlers and lets the owner push
/// events, hold replies and drop the link.
#[derive(Clone)]
pub struct ScriptedBinder {
    inner: Arc<Inner>,
}

impl Default for ScriptedBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBinder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Arc::new(DashMap::new()),
                held: Arc::new(DashSet::new()),
                events: InMemoryBus::new(EVENT_CAPACITY),
                link: Mutex::new(None),
                refuse: AtomicBool::new(false),
                closed: CancellationToken::new(),
                journal: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Binder that refuses every connection attempt.
    pub fn refusing() -> Self {
        let binder = Self::new();
        binder.inner.refuse.store(true, Ordering::Relaxed);
        binder
    }

    pub fn on<F>(&self, api: &str, verb: &str, handler: F) -> &Self
    where
        F: Fn(&Value) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .insert(ApiAddress::new(api, verb), Arc::new(handler));
        self
    }

    /// Always answer `api/verb` with `reply`.
    pub fn reply(&self, api: &str, verb: &str, reply: Value) -> &Self {
        self.on(api, verb, move |_| Ok(reply.clone()))
    }

    /// Always reject `api/verb` with `error`.
    pub fn reject(&self, api: &str, verb: &str, error: Value) -> &Self {
        self.on(api, verb, move |_| Err(error.clone()))
    }

    /// Park calls to `api/verb` until [`ScriptedBinder::release`] is called.
    pub fn hold(&self, api: &str, verb: &str) -> &Self {
        self.inner.held.insert(ApiAddress::new(api, verb));
        self
    }

    /// Answer every parked call to `api/verb` and stop holding it.
    pub async fn release(&self, api: &str, verb: &str) {
        let address = ApiAddress::new(api, verb);
        self.inner.held.remove(&address);
        let sender = self.command_sender();
        if let Some(tx) = sender {
            if tx.send(Control::Release(address)).await.is_err() {
                debug!(target: "binder-transport", "release dropped (loop gone)");
            }
        }
    }

    /// Publish an event to current subscribers. Returns whether anyone received it.
    pub async fn push(&self, event: PushEvent) -> bool {
        match self.inner.events.publish(event).await {
            Ok(()) => true,
            Err(err) => {
                debug!(target: "binder-transport", %err, "push without subscribers");
                false
            }
        }
    }

    /// Drop the link. Pending calls fail with `LinkClosed`; the binder stays closed.
    pub fn drop_link(&self) {
        self.inner.closed.cancel();
        if let Some(link) = self.inner.link.lock().take() {
            info!(target: "binder-transport", connection = %link.id, "scripted link dropped");
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.link.lock().is_some()
    }

    /// Calls received so far, in arrival order.
    pub fn journal(&self) -> Vec<(ApiAddress, Value)> {
        self.inner.journal.lock().clone()
    }

    fn command_sender(&self) -> Option<mpsc::Sender<Control>> {
        self.inner
            .link
            .lock()
            .as_ref()
            .map(|link| link.command_tx.clone())
    }

    async fn run_loop(
        handlers: Handlers,
        held: Held,
        mut command_rx: mpsc::Receiver<Control>,
        closed: CancellationToken,
    ) {
        let mut parked: HashMap<ApiAddress, Vec<(Value, Responder)>> = HashMap::new();

        loop {
            tokio::select! {
                _ = closed.cancelled() => break,
                command = command_rx.recv() => {
                    match command {
                        Some(Control::Call { address, payload, responder }) => {
                            if held.contains(&address) {
                                parked.entry(address).or_default().push((payload, responder));
                            } else {
                                let _ = responder.send(Self::answer(&handlers, &address, &payload));
                            }
                        }
                        Some(Control::Release(address)) => {
                            for (payload, responder) in parked.remove(&address).unwrap_or_default() {
                                let _ = responder.send(Self::answer(&handlers, &address, &payload));
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let err = BinderError::new(BinderErrorKind::LinkClosed).with_hint("binder link dropped");
        for (_, waiting) in parked.drain() {
            for (_, responder) in waiting {
                let _ = responder.send(Err(err.clone()));
            }
        }
    }

    fn answer(
        handlers: &DashMap<ApiAddress, VerbHandler>,
        address: &ApiAddress,
        payload: &Value,
    ) -> Result<Value, BinderError> {
        let handler = handlers
            .get(address)
            .map(|entry| Arc::clone(entry.value()));
        match handler {
            Some(handler) => handler(payload).map_err(|data| {
                BinderError::new(BinderErrorKind::CallRejected)
                    .with_hint(format!("{address} rejected the request"))
                    .with_data(data)
            }),
            None => Err(BinderError::new(BinderErrorKind::NoSuchVerb)
                .with_hint(format!("no verb {address}"))),
        }
    }
}

#[async_trait]
impl BinderTransport for ScriptedBinder {
    async fn open(&self, config: &BinderConfig) -> Result<ConnectionId, BinderError> {
        if self.inner.refuse.load(Ordering::Relaxed) {
            return Err(BinderError::new(BinderErrorKind::ConnectionRefused)
                .with_hint(format!("{} refused the connection", config.ws_url())));
        }
        if self.inner.closed.is_cancelled() {
            return Err(BinderError::new(BinderErrorKind::LinkClosed)
                .with_hint("binder link already dropped"));
        }

        let mut guard = self.inner.link.lock();
        if guard.is_some() {
            return Err(BinderError::new(BinderErrorKind::Internal).with_hint("link already open"));
        }

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let loop_task = tokio::spawn(Self::run_loop(
            Arc::clone(&self.inner.handlers),
            Arc::clone(&self.inner.held),
            command_rx,
            self.inner.closed.clone(),
        ));
        let id = ConnectionId::new();
        *guard = Some(Link {
            id,
            command_tx,
            loop_task,
        });

        info!(target: "binder-transport", connection = %id, url = %config.ws_url(), "scripted link open");
        Ok(id)
    }

    async fn call(&self, address: &ApiAddress, payload: Value) -> Result<Value, BinderError> {
        let command_tx = self.command_sender().ok_or_else(|| {
            BinderError::new(BinderErrorKind::LinkClosed).with_hint("link not open")
        })?;

        self.inner
            .journal
            .lock()
            .push((address.clone(), payload.clone()));

        let (resp_tx, resp_rx) = oneshot::channel();
        command_tx
            .send(Control::Call {
                address: address.clone(),
                payload,
                responder: resp_tx,
            })
            .await
            .map_err(|err| {
                BinderError::new(BinderErrorKind::LinkClosed).with_hint(err.to_string())
            })?;

        match resp_rx.await {
            Ok(result) => result,
            Err(_) => Err(BinderError::new(BinderErrorKind::LinkClosed)
                .with_hint("call response channel closed")),
        }
    }

    async fn subscribe(
        &self,
        pattern: &EventPattern,
    ) -> Result<mpsc::Receiver<PushEvent>, BinderError> {
        if !self.is_open() {
            return Err(BinderError::new(BinderErrorKind::LinkClosed).with_hint("link not open"));
        }
        Ok(subscribe_matching(
            &self.inner.events,
            pattern.clone(),
            EVENT_CAPACITY,
        ))
    }

    async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }
}

impl Inner {
    /// Stop the loop task and close the binder. Returns whether a link was still open.
    fn shut_down(&mut self) -> bool {
        let was_open = match self.link.get_mut().take() {
            Some(link) => {
                link.loop_task.abort();
                true
            }
            None => false,
        };
        self.closed.cancel();
        was_open
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.shut_down() {
            warn!(target: "binder-transport", "scripted binder dropped while open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> BinderConfig {
        BinderConfig::default()
    }

    #[tokio::test]
    async fn answers_registered_verbs() {
        let binder = ScriptedBinder::new();
        binder.on("alsacore", "ping", |payload| Ok(json!({"echo": payload.clone()})));
        binder.open(&config()).await.expect("open");

        let reply = binder
            .call(&ApiAddress::new("alsacore", "ping"), json!({"n": 1}))
            .await
            .expect("reply");
        assert_eq!(reply, json!({"echo": {"n": 1}}));
        assert_eq!(binder.journal().len(), 1);
    }

    #[tokio::test]
    async fn unknown_verb_and_rejection() {
        let binder = ScriptedBinder::new();
        binder.reject("UNICENS", "initialise", json!({"info": "no file"}));
        binder.open(&config()).await.expect("open");

        let err = binder
            .call(&ApiAddress::new("UNICENS", "initialise"), json!({}))
            .await
            .expect_err("rejected");
        assert_eq!(err.kind, BinderErrorKind::CallRejected);
        assert_eq!(err.payload(), json!({"info": "no file"}));

        let err = binder
            .call(&ApiAddress::new("UNICENS", "nope"), json!({}))
            .await
            .expect_err("unknown");
        assert_eq!(err.kind, BinderErrorKind::NoSuchVerb);
    }

    #[tokio::test]
    async fn shut_down_reports_only_live_links() {
        let mut never_opened = ScriptedBinder::new();
        let inner = Arc::get_mut(&mut never_opened.inner).expect("sole owner");
        assert!(!inner.shut_down());
        assert!(inner.closed.is_cancelled());

        let mut opened = ScriptedBinder::new();
        opened.open(&config()).await.expect("open");
        let inner = Arc::get_mut(&mut opened.inner).expect("sole owner");
        assert!(inner.shut_down());
        assert!(!inner.shut_down());

        let mut dropped = ScriptedBinder::new();
        dropped.open(&config()).await.expect("open");
        dropped.drop_link();
        let inner = Arc::get_mut(&mut dropped.inner).expect("sole owner");
        assert!(!inner.shut_down());
    }

    #[tokio::test]
    async fn second_open_is_refused() {
        let binder = ScriptedBinder::new();
        binder.open(&config()).await.expect("open");
        let err = binder.open(&config()).await.expect_err("second open");
        assert_eq!(err.kind, BinderErrorKind::Internal);
    }

    #[tokio::test]
    async fn held_calls_fail_when_link_drops() {
        let binder = ScriptedBinder::new();
        binder.reply("UNICENS", "monitor", json!({"ok": true}));
        binder.hold("UNICENS", "monitor");
        binder.open(&config()).await.expect("open");

        let pending = {
            let binder = binder.clone();
            tokio::spawn(async move {
                binder
                    .call(&ApiAddress::new("UNICENS", "monitor"), json!({}))
                    .await
            })
        };
        tokio::task::yield_now().await;
        binder.drop_link();

        let err = pending.await.expect("join").expect_err("link dropped");
        assert_eq!(err.kind, BinderErrorKind::LinkClosed);
        binder.closed().await;
        assert!(!binder.is_open());
    }

    #[tokio::test]
    async fn release_answers_parked_calls() {
        let binder = ScriptedBinder::new();
        binder.reply("UNICENS", "volume", json!({"volume": 40}));
        binder.hold("UNICENS", "volume");
        binder.open(&config()).await.expect("open");

        let pending = {
            let binder = binder.clone();
            tokio::spawn(async move {
                binder
                    .call(&ApiAddress::new("UNICENS", "volume"), json!({"value": 40}))
                    .await
            })
        };
        while binder.journal().is_empty() {
            tokio::task::yield_now().await;
        }
        binder.release("UNICENS", "volume").await;

        let reply = pending.await.expect("join").expect("reply");
        assert_eq!(reply["volume"], 40);
    }

    #[tokio::test]
    async fn refusing_binder_never_opens() {
        let binder = ScriptedBinder::refusing();
        let err = binder.open(&config()).await.expect_err("refused");
        assert_eq!(err.kind, BinderErrorKind::ConnectionRefused);
        assert!(binder
            .subscribe(&EventPattern::wildcard())
            .await
            .is_err());
    }
}
