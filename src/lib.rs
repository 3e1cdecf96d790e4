//! Operator console for application binders.
//!
//! A [`PageSession`] connects a page to the binder over one link, relays operator calls,
//! renders every reply and pushed event onto a [`PageSurface`], and (for the Unicens page)
//! fills the configuration selector from the binder's file listing.

pub mod config;
pub mod errors;
pub mod options;
pub mod params;
pub mod render;
pub mod session;
pub mod surface;
pub mod telemetry;
pub mod unicens;

pub use config::{DiscoveryCall, PageProfile, PageVariant, CONFIG_SELECT_CONTROL};
pub use errors::{ConsoleError, ConsoleResult};
pub use params::{parameter_by_name, parameter_or, PageParams};
pub use render::{RenderStyle, ResponseRenderer};
pub use session::{ConnectionHandle, ConnectionState, PageSession, CONFIG_NOT_SELECTED};
pub use surface::{InputField, LinkStatus, MemorySurface, OptionEntry, PageSurface, Region};
pub use telemetry::init_logging;
pub use unicens::{VolumeCommand, VolumeTarget, UNICENS_API};

pub use binder_transport::{
    metrics, ApiAddress, BinderConfig, BinderError, BinderErrorKind, BinderTransport,
    CallOutcome, ConnectionId, NoopTransport, PushEvent, ScriptedBinder,
};
