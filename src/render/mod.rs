//! Formatting of call outcomes and pushed events into page regions.

pub mod highlight;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::surface::{PageSurface, Region};
use binder_transport::{metrics, CallOutcome, PushEvent};

pub use highlight::{highlight_json, highlight_text, tokenize, Token, TokenClass};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    /// Compact JSON text.
    Plain,
    /// Pretty JSON with classed spans per token.
    Highlighted,
}

impl RenderStyle {
    pub fn format(&self, value: &Value) -> String {
        match self {
            RenderStyle::Plain => value.to_string(),
            RenderStyle::Highlighted => highlight_json(value),
        }
    }
}

/// Writes outcomes to the output region and events to the event region.
///
/// Owns the event index: it starts at zero and grows by one per rendered event.
#[derive(Debug)]
pub struct ResponseRenderer {
    style: RenderStyle,
    event_index: AtomicU64,
}

impl ResponseRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self {
            style,
            event_index: AtomicU64::new(0),
        }
    }

    pub fn style(&self) -> RenderStyle {
        self.style
    }

    /// Index the next rendered event will carry.
    pub fn next_event_index(&self) -> u64 {
        self.event_index.load(Ordering::SeqCst)
    }

    pub fn format_success(&self, payload: &Value) -> String {
        format!("OK: {}", self.style.format(payload))
    }

    pub fn format_failure(&self, payload: &Value) -> String {
        format!("ERROR: {}", self.style.format(payload))
    }

    pub fn render_success(&self, surface: &dyn PageSurface, payload: &Value) {
        debug!(target: "binder-session", reply = %payload, "replyok");
        surface.write(Region::Output, &self.format_success(payload));
    }

    pub fn render_failure(&self, surface: &dyn PageSurface, payload: &Value) {
        debug!(target: "binder-session", reply = %payload, "replyerr");
        surface.write(Region::Output, &self.format_failure(payload));
    }

    pub fn render_outcome(&self, surface: &dyn PageSurface, outcome: &CallOutcome) {
        match outcome {
            CallOutcome::Success(payload) => self.render_success(surface, payload),
            CallOutcome::Failure(payload) => self.render_failure(surface, payload),
        }
    }

    /// Events are always rendered as compact JSON, whatever the outcome style.
    /// Returns the index the event was rendered with.
    pub fn render_event(&self, surface: &dyn PageSurface, event: &PushEvent) -> u64 {
        let index = self.event_index.fetch_add(1, Ordering::SeqCst);
        let text = serde_json::to_string(event).unwrap_or_else(|_| event.data.to_string());
        debug!(target: "binder-session", index, event = %event.event, "gotevent");
        surface.write(Region::EventOutput, &format!("{index}: {text}"));
        metrics::record_event();
        index
    }
}
