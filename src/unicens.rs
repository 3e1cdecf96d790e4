//! Shortcuts for the verbs of the `UNICENS` binding.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::{ConsoleError, ConsoleResult};
use crate::session::{PageSession, CONFIG_NOT_SELECTED};
use binder_transport::CallOutcome;

pub const UNICENS_API: &str = "UNICENS";

/// Channel a volume command applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTarget {
    /// Numeric control id.
    Numid(u32),
    /// Channel name from the loaded configuration, matched case-insensitively by the binder.
    Channel(String),
}

/// One `{"numid"|"channel": .., "volume": ..}` entry of the `volume` verb.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeCommand {
    pub target: VolumeTarget,
    pub volume: u8,
}

impl VolumeCommand {
    pub fn numid(numid: u32, volume: u8) -> Self {
        Self {
            target: VolumeTarget::Numid(numid),
            volume,
        }
    }

    pub fn channel(name: impl Into<String>, volume: u8) -> Self {
        Self {
            target: VolumeTarget::Channel(name.into()),
            volume,
        }
    }

    pub fn to_json(&self) -> Value {
        match &self.target {
            VolumeTarget::Numid(numid) => json!({ "numid": numid, "volume": self.volume }),
            VolumeTarget::Channel(name) => json!({ "channel": name, "volume": self.volume }),
        }
    }
}

impl PageSession {
    /// Load the network configuration currently picked in the selector.
    pub async fn initialise_selected(&self) -> ConsoleResult<CallOutcome> {
        let filename = self.current_config();
        if filename.is_empty() || filename == CONFIG_NOT_SELECTED {
            warn!(target: "binder-session", "initialise requested before a configuration was selected");
            return Err(ConsoleError::NoConfigSelected);
        }
        self.call_binder(UNICENS_API, "initialise", json!({ "filename": filename }))
            .await
    }

    pub async fn set_volume(&self, command: &VolumeCommand) -> ConsoleResult<CallOutcome> {
        self.call_binder(UNICENS_API, "volume", command.to_json())
            .await
    }

    /// Apply several volume commands in one call; the binder stops at the first invalid one.
    pub async fn set_volumes(&self, commands: &[VolumeCommand]) -> ConsoleResult<CallOutcome> {
        let batch: Vec<Value> = commands.iter().map(VolumeCommand::to_json).collect();
        self.call_binder(UNICENS_API, "volume", Value::Array(batch))
            .await
    }

    /// Subscribe to network events of the binding.
    pub async fn monitor(&self) -> ConsoleResult<CallOutcome> {
        self.call_binder(UNICENS_API, "monitor", json!({})).await
    }
}
