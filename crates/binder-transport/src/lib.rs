//! Transport seam for the binder console.
//!
//! The remote binder speaks its own framing over a persistent WebSocket; this crate does not
//! reimplement it. It defines the [`transport::BinderTransport`] trait the session layer drives,
//! the credentials used to open a link, the error type surfaced by transports, and an in-memory
//! [`scripted::ScriptedBinder`] that behaves like a binder for tests and headless use.

pub mod metrics;
pub mod scripted;
pub mod transport;

pub use binder_types::{ApiAddress, CallOutcome, ConnectionId, EventPattern, PushEvent};
pub use config::BinderConfig;
pub use error::{BinderError, BinderErrorKind, BinderResult};
pub use scripted::ScriptedBinder;
pub use transport::{BinderTransport, NoopTransport};

pub mod error {
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by a transport.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum BinderErrorKind {
        #[error("connection refused")]
        ConnectionRefused,
        #[error("link closed")]
        LinkClosed,
        #[error("call rejected")]
        CallRejected,
        #[error("no such verb")]
        NoSuchVerb,
        #[error("internal error")]
        Internal,
    }

    impl BinderErrorKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                BinderErrorKind::ConnectionRefused => "connection-refused",
                BinderErrorKind::LinkClosed => "link-closed",
                BinderErrorKind::CallRejected => "call-rejected",
                BinderErrorKind::NoSuchVerb => "no-such-verb",
                BinderErrorKind::Internal => "internal",
            }
        }
    }

    /// Error metadata passed back to the session. `data` carries the binder's own error
    /// payload when there is one.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BinderError {
        pub kind: BinderErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<Value>,
    }

    impl fmt::Display for BinderError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for BinderError {}

    impl BinderError {
        pub fn new(kind: BinderErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: Value) -> Self {
            self.data = Some(data);
            self
        }

        /// Payload shown on the failure path: the binder's data verbatim, or a small
        /// description of a transport-level failure.
        pub fn payload(&self) -> Value {
            match &self.data {
                Some(data) => data.clone(),
                None => json!({
                    "error": self.kind.as_str(),
                    "info": self.hint.clone().unwrap_or_else(|| self.kind.to_string()),
                }),
            }
        }
    }

    pub type BinderResult<T> = Result<T, BinderError>;
}

pub mod config {
    use serde::{Deserialize, Serialize};
    use std::env;
    use url::Url;

    pub const DEFAULT_HOST: &str = "localhost:1234";
    pub const DEFAULT_BASE: &str = "api";
    pub const DEFAULT_TOKEN: &str = "mysecret";

    /// Credentials and location of the binder a page talks to.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BinderConfig {
        pub host: String,
        pub base: String,
        pub token: String,
        pub secure: bool,
    }

    impl Default for BinderConfig {
        fn default() -> Self {
            Self {
                host: DEFAULT_HOST.to_string(),
                base: env_or("BINDER_CONSOLE_BASE", DEFAULT_BASE),
                token: env_or("BINDER_CONSOLE_TOKEN", DEFAULT_TOKEN),
                secure: false,
            }
        }
    }

    impl BinderConfig {
        /// Binder served by the same host as the page address; `https` pages use `wss`.
        pub fn for_page(page: &Url) -> Self {
            let mut cfg = Self::default();
            if let Some(host) = page.host_str() {
                cfg.host = match page.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
            }
            cfg.secure = page.scheme() == "https";
            cfg
        }

        /// WebSocket endpoint without credentials, as shown in call previews.
        pub fn ws_url(&self) -> String {
            let scheme = if self.secure { "wss" } else { "ws" };
            format!(
                "{scheme}://{}/{}",
                self.host,
                self.base.trim_start_matches('/')
            )
        }

        /// Endpoint a transport opens, carrying the token as `x-afb-token`.
        pub fn connect_url(&self) -> Result<Url, url::ParseError> {
            let mut url = Url::parse(&self.ws_url())?;
            url.query_pairs_mut().append_pair("x-afb-token", &self.token);
            Ok(url)
        }
    }

    fn env_or(key: &str, fallback: &str) -> String {
        match env::var(key) {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    fallback.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(_) => fallback.to_string(),
        }
    }
}
