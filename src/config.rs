//! Page profiles: which adapter variant a session runs and with what settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::params::PageParams;
use crate::render::RenderStyle;
use binder_transport::{ApiAddress, BinderConfig};

/// Selection control the Unicens page fills with configuration files.
pub const CONFIG_SELECT_CONTROL: &str = "ucs2_config";

/// The two demonstration pages.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageVariant {
    /// Plain relay of calls and replies.
    Audio,
    /// Highlighted relay plus the configuration file selector.
    Unicens,
}

impl PageVariant {
    pub fn render_style(&self) -> RenderStyle {
        match self {
            PageVariant::Audio => RenderStyle::Plain,
            PageVariant::Unicens => RenderStyle::Highlighted,
        }
    }
}

/// Call issued once after connecting to enumerate selectable configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCall {
    /// Selection control receiving the options.
    pub control: String,
    pub address: ApiAddress,
    pub query: Value,
}

impl DiscoveryCall {
    pub fn new(control: impl Into<String>, address: ApiAddress, query: Value) -> Self {
        Self {
            control: control.into(),
            address,
            query,
        }
    }
}

/// Everything a session needs to know before it connects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageProfile {
    pub variant: PageVariant,
    pub params: PageParams,
    pub binder: BinderConfig,
    pub discovery: Option<DiscoveryCall>,
}

impl PageProfile {
    /// Profile for a page served at `address`. The binder is assumed to live on the
    /// same host as the page; relative addresses keep the default binder host.
    pub fn from_address(address: &str, variant: PageVariant) -> Self {
        let binder = Url::parse(address)
            .map(|url| BinderConfig::for_page(&url))
            .unwrap_or_default();
        Self {
            variant,
            params: PageParams::resolve(address, variant),
            binder,
            discovery: None,
        }
    }

    pub fn with_binder(mut self, binder: BinderConfig) -> Self {
        self.binder = binder;
        self
    }

    /// Only meaningful for [`PageVariant::Unicens`]; the audio page ignores it.
    pub fn with_discovery(mut self, discovery: DiscoveryCall) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn render_style(&self) -> RenderStyle {
        self.variant.render_style()
    }
}
