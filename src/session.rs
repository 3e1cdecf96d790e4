//! Per-page session: connection lifecycle and call dispatch.
//!
//! A session owns the single link to the binder for the lifetime of a page. It moves
//! `Disconnected -> Connected -> Aborted` (or straight to `Aborted` when the link cannot be
//! opened) and never goes back; the operator reloads the page to start over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{PageProfile, PageVariant};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::options;
use crate::render::{highlight_text, RenderStyle, ResponseRenderer};
use crate::surface::{InputField, LinkStatus, PageSurface, Region};
use binder_transport::{
    metrics, ApiAddress, BinderTransport, CallOutcome, ConnectionId, EventPattern, PushEvent,
};

/// Value of the current configuration before anything was selected.
pub const CONFIG_NOT_SELECTED: &str = "ConfigNotSelected";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    /// Open requested, waiting for the transport.
    Connecting,
    Connected,
    /// Lost or never established. Terminal.
    Aborted,
}

/// The live link of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub opened_at: DateTime<Utc>,
}

pub struct PageSession {
    profile: PageProfile,
    transport: Arc<dyn BinderTransport>,
    surface: Arc<dyn PageSurface>,
    renderer: ResponseRenderer,
    state_tx: watch::Sender<ConnectionState>,
    connection: Mutex<Option<ConnectionHandle>>,
    current_config: Mutex<String>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    lost: AtomicBool,
}

impl PageSession {
    pub fn new(
        profile: PageProfile,
        transport: Arc<dyn BinderTransport>,
        surface: Arc<dyn PageSurface>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            renderer: ResponseRenderer::new(profile.render_style()),
            profile,
            transport,
            surface,
            state_tx,
            connection: Mutex::new(None),
            current_config: Mutex::new(CONFIG_NOT_SELECTED.to_string()),
            tasks: Mutex::new(Vec::new()),
            lost: AtomicBool::new(false),
        })
    }

    pub fn profile(&self) -> &PageProfile {
        &self.profile
    }

    pub fn renderer(&self) -> &ResponseRenderer {
        &self.renderer
    }

    pub(crate) fn surface(&self) -> &dyn PageSurface {
        self.surface.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection.lock().clone()
    }

    pub fn current_config(&self) -> String {
        self.current_config.lock().clone()
    }

    /// Click handler of the configuration selector.
    pub fn select_config(&self, value: &str) {
        debug!(target: "binder-session", config = value, "configuration selected");
        *self.current_config.lock() = value.to_string();
    }

    /// Open the session's single link to the binder.
    ///
    /// Exactly one of the ready or lost paths runs. A failed open is reported both on the
    /// page and through the returned error.
    pub async fn connect(self: &Arc<Self>) -> ConsoleResult<ConnectionId> {
        let claimed = self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(match self.state() {
                ConnectionState::Aborted => ConsoleError::ConnectionAborted,
                _ => ConsoleError::AlreadyConnected,
            });
        }

        match self.transport.open(&self.profile.binder).await {
            Ok(id) => {
                self.on_ready(id).await;
                Ok(id)
            }
            Err(err) => {
                warn!(target: "binder-session", %err, url = %self.profile.binder.ws_url(), "binder connection failed");
                self.on_lost();
                Err(err.into())
            }
        }
    }

    async fn on_ready(self: &Arc<Self>, id: ConnectionId) {
        *self.connection.lock() = Some(ConnectionHandle {
            id,
            opened_at: Utc::now(),
        });
        self.state_tx.send_replace(ConnectionState::Connected);
        info!(target: "binder-session", connection = %id, url = %self.profile.binder.ws_url(), "binder link active");

        if self.profile.variant == PageVariant::Unicens {
            if let Some(discovery) = self.profile.discovery.clone() {
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    options::populate(&session, &discovery).await;
                });
            }
        }

        self.surface.set_main_visible(true);
        self.surface.show_status(LinkStatus::Active);

        let mut tasks = Vec::with_capacity(2);
        match self.transport.subscribe(&EventPattern::wildcard()).await {
            Ok(events) => tasks.push(self.spawn_event_pump(events)),
            Err(err) => warn!(target: "binder-session", %err, "event subscription failed"),
        }
        tasks.push(self.spawn_link_watcher());

        let mut guard = self.tasks.lock();
        if self.lost.load(Ordering::SeqCst) {
            tasks.iter().for_each(JoinHandle::abort);
        } else {
            guard.extend(tasks);
        }
    }

    /// Runs at most once; the page is updated before state watchers are notified.
    fn on_lost(&self) {
        if self.lost.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.connection.lock().take() {
            info!(target: "binder-session", connection = %handle.id, "binder link closed");
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.surface.set_main_visible(false);
        self.surface.show_status(LinkStatus::Closed);
        self.state_tx.send_replace(ConnectionState::Aborted);
    }

    fn spawn_event_pump(self: &Arc<Self>, mut events: mpsc::Receiver<PushEvent>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.renderer.render_event(session.surface(), &event);
            }
        })
    }

    fn spawn_link_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            transport.closed().await;
            if let Some(session) = weak.upgrade() {
                session.on_lost();
            }
        })
    }

    fn ensure_connected(&self) -> ConsoleResult<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Aborted => Err(ConsoleError::ConnectionAborted),
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                Err(ConsoleError::NotConnected)
            }
        }
    }

    /// Free-form call: namespace and verb come from the page inputs and `message` is
    /// wrapped as `{"data": message}`.
    pub async fn send(&self, message: Value) -> ConsoleResult<CallOutcome> {
        self.ensure_connected()?;
        let address = ApiAddress::new(
            self.surface.input(InputField::Api),
            self.surface.input(InputField::Verb),
        );
        let envelope = json!({ "data": message });
        self.surface
            .write(Region::Question, &format!("subscribe: {address} ({envelope})"));
        self.call(address, envelope).await
    }

    /// Direct call sending `query` verbatim to `api/verb`.
    pub async fn call_binder(
        &self,
        api: &str,
        verb: &str,
        query: Value,
    ) -> ConsoleResult<CallOutcome> {
        self.ensure_connected()?;
        let address = ApiAddress::new(api, verb);
        debug!(target: "binder-session", %address, %query, "apicall");
        self.surface
            .write(Region::Question, &self.call_preview(&address, &query));
        self.call(address, query).await
    }

    /// Preview written before a direct call is issued.
    pub fn call_preview(&self, address: &ApiAddress, query: &Value) -> String {
        match self.renderer.style() {
            RenderStyle::Plain => format!("apicall: {address} ({query})"),
            RenderStyle::Highlighted => highlight_text(&format!(
                "{}/{address}?query={query}",
                self.profile.binder.ws_url()
            )),
        }
    }

    /// Send `payload` to `address` and render the single outcome it resolves to.
    pub async fn call(&self, address: ApiAddress, payload: Value) -> ConsoleResult<CallOutcome> {
        self.ensure_connected()?;
        let outcome = self.issue(&address, payload).await;
        self.renderer.render_outcome(self.surface(), &outcome);
        Ok(outcome)
    }

    /// Issue one call and fold transport errors into the failure outcome.
    pub(crate) async fn issue(&self, address: &ApiAddress, payload: Value) -> CallOutcome {
        metrics::record_call(&address.api);
        match self.transport.call(address, payload).await {
            Ok(reply) => {
                metrics::record_call_success();
                CallOutcome::Success(reply)
            }
            Err(err) => {
                metrics::record_call_failure(&address.api);
                debug!(target: "binder-session", %address, %err, "call failed");
                CallOutcome::Failure(err.payload())
            }
        }
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use binder_transport::{NoopTransport, ScriptedBinder};
    use pretty_assertions::assert_eq;
    use tokio::time::{timeout, Duration};

    fn audio_session(transport: Arc<dyn BinderTransport>) -> (Arc<PageSession>, Arc<MemorySurface>) {
        let surface = Arc::new(MemorySurface::new());
        let profile = PageProfile::from_address("http://car.local:1234/audio.html", PageVariant::Audio);
        let session = PageSession::new(profile, transport, surface.clone());
        (session, surface)
    }

    async fn wait_for(session: &PageSession, wanted: ConnectionState) {
        let mut rx = session.watch_state();
        timeout(Duration::from_secs(1), rx.wait_for(|state| *state == wanted))
            .await
            .expect("state in time")
            .expect("watch open");
    }

    #[tokio::test]
    async fn connect_shows_active_status() {
        let (session, surface) = audio_session(Arc::new(ScriptedBinder::new()));
        let id = session.connect().await.expect("connect");

        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.connection().map(|c| c.id), Some(id));
        assert_eq!(surface.status(), Some(LinkStatus::Active));
        assert!(surface.main_visible());
    }

    #[tokio::test]
    async fn refused_connection_runs_lost_path_once() {
        let (session, surface) = audio_session(Arc::new(NoopTransport));
        let err = session.connect().await.expect_err("refused");
        assert!(matches!(err, ConsoleError::Binder(_)));
        assert_eq!(session.state(), ConnectionState::Aborted);
        assert_eq!(surface.status(), Some(LinkStatus::Closed));
        assert!(!surface.main_visible());

        let err = session.connect().await.expect_err("terminal");
        assert!(matches!(err, ConsoleError::ConnectionAborted));
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (session, _surface) = audio_session(Arc::new(ScriptedBinder::new()));
        session.connect().await.expect("connect");
        let err = session.connect().await.expect_err("second");
        assert!(matches!(err, ConsoleError::AlreadyConnected));
    }

    #[tokio::test]
    async fn dropped_link_aborts_session() {
        let binder = ScriptedBinder::new();
        let (session, surface) = audio_session(Arc::new(binder.clone()));
        session.connect().await.expect("connect");

        binder.drop_link();
        wait_for(&session, ConnectionState::Aborted).await;

        assert_eq!(surface.status(), Some(LinkStatus::Closed));
        assert!(session.connection().is_none());
        let err = session
            .call_binder("alsacore", "ping", json!({}))
            .await
            .expect_err("aborted");
        assert!(matches!(err, ConsoleError::ConnectionAborted));
    }

    #[tokio::test]
    async fn calls_without_connection_touch_nothing() {
        let (session, surface) = audio_session(Arc::new(ScriptedBinder::new()));
        let err = session.send(json!("hello")).await.expect_err("not connected");
        assert!(matches!(err, ConsoleError::NotConnected));
        assert!(surface.writes().is_empty());
    }

    #[tokio::test]
    async fn send_wraps_message_and_previews_envelope() {
        let binder = ScriptedBinder::new();
        binder.on("foo", "bar", |payload| Ok(json!({"got": payload.clone()})));
        let (session, surface) = audio_session(Arc::new(binder.clone()));
        surface.set_input(InputField::Api, "foo");
        surface.set_input(InputField::Verb, "bar");
        session.connect().await.expect("connect");

        let outcome = session.send(json!("hello")).await.expect("send");
        assert_eq!(outcome, CallOutcome::Success(json!({"got": {"data": "hello"}})));

        let writes = surface.writes();
        assert_eq!(
            writes[0],
            (
                Region::Question,
                r#"subscribe: foo/bar ({"data":"hello"})"#.to_string()
            )
        );
        assert_eq!(
            writes[1],
            (
                Region::Output,
                r#"OK: {"got":{"data":"hello"}}"#.to_string()
            )
        );
        assert_eq!(binder.journal()[0].1, json!({"data": "hello"}));
    }

    #[tokio::test]
    async fn failures_render_server_payload_verbatim() {
        let binder = ScriptedBinder::new();
        binder.reject("alsacore", "setctl", json!({"request": {"status": "failed", "info": "bad numid"}}));
        let (session, surface) = audio_session(Arc::new(binder));
        session.connect().await.expect("connect");

        let outcome = session
            .call_binder("alsacore", "setctl", json!({"numid": 9}))
            .await
            .expect("call");
        assert!(!outcome.is_success());
        assert_eq!(
            surface.region(Region::Question).as_deref(),
            Some(r#"apicall: alsacore/setctl ({"numid":9})"#)
        );
        assert_eq!(
            surface.region(Region::Output).as_deref(),
            Some(r#"ERROR: {"request":{"info":"bad numid","status":"failed"}}"#)
        );
    }

    #[tokio::test]
    async fn unknown_verb_surfaces_through_failure_path() {
        let (session, surface) = audio_session(Arc::new(ScriptedBinder::new()));
        session.connect().await.expect("connect");
        session
            .call_binder("alsacore", "missing", json!({}))
            .await
            .expect("call");
        let output = surface.region(Region::Output).expect("output");
        assert!(output.starts_with("ERROR: "));
        assert!(output.contains("no-such-verb"));
    }

    #[tokio::test]
    async fn highlighted_preview_uses_binder_url() {
        let surface = Arc::new(MemorySurface::new());
        let profile = PageProfile::from_address("http://car.local:1234/ucs2.html", PageVariant::Unicens);
        let session = PageSession::new(profile, Arc::new(ScriptedBinder::new()), surface);
        let preview = session.call_preview(&ApiAddress::new("UNICENS", "volume"), &json!({"value": 5}));
        assert!(preview.starts_with("ws://car.local:<span class=\"number\">1234</span>/api/"));
        assert!(preview.contains("/api/UNICENS/volume?query={"));
        assert!(preview.contains("<span class=\"key\">\"value\":</span>"));
        assert!(preview.contains("<span class=\"number\">5</span>"));
    }

    #[tokio::test]
    async fn select_config_updates_current_value() {
        let (session, _surface) = audio_session(Arc::new(ScriptedBinder::new()));
        assert_eq!(session.current_config(), CONFIG_NOT_SELECTED);
        session.select_config("/etc/unicens/a.xml");
        assert_eq!(session.current_config(), "/etc/unicens/a.xml");
    }
}
