//! Write targets of a page.
//!
//! The session never looks anything up in its environment; it only talks to a
//! [`PageSurface`] exposing the named regions, inputs and controls of the page.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Text regions replaced wholesale on every write.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// Preview of the pending call.
    Question,
    /// Outcome of the most recent call.
    Output,
    /// Most recent pushed event.
    EventOutput,
}

impl Region {
    pub fn element_id(&self) -> &'static str {
        match self {
            Region::Question => "question",
            Region::Output => "output",
            Region::EventOutput => "outevt",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_id())
    }
}

/// Operator-editable fields read by the free-form send path.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum InputField {
    Api,
    Verb,
}

impl InputField {
    pub fn element_id(&self) -> &'static str {
        match self {
            InputField::Api => "api",
            InputField::Verb => "verb",
        }
    }
}

/// Visible state of the connection indicator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LinkStatus {
    Active,
    Closed,
}

impl LinkStatus {
    pub fn text(&self) -> &'static str {
        match self {
            LinkStatus::Active => "Binder WS Active",
            LinkStatus::Closed => "Connected Closed",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            LinkStatus::Active => "lightgreen",
            LinkStatus::Closed => "red",
        }
    }
}

/// One entry of a selection control.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub text: String,
    pub value: String,
}

pub trait PageSurface: Send + Sync {
    fn show_status(&self, status: LinkStatus);
    /// Show or hide the panel holding the call controls.
    fn set_main_visible(&self, visible: bool);
    fn write(&self, region: Region, content: &str);
    fn input(&self, field: InputField) -> String;
    fn has_control(&self, control: &str) -> bool;
    fn append_option(&self, control: &str, option: OptionEntry);
    /// Value of the selected option; `None` when the control is missing or empty.
    fn selected_value(&self, control: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
struct SelectControl {
    options: Vec<OptionEntry>,
    selected: usize,
}

#[derive(Debug, Default)]
struct SurfaceState {
    status: Option<LinkStatus>,
    main_visible: bool,
    regions: HashMap<Region, String>,
    writes: Vec<(Region, String)>,
    inputs: HashMap<InputField, String>,
    controls: HashMap<String, SelectControl>,
}

/// Surface kept in memory. Records every write so the order of previews, outcomes and
/// events can be inspected.
#[derive(Debug, Default)]
pub struct MemorySurface {
    state: RwLock<SurfaceState>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a selection control so option population can find it.
    pub fn with_control(self, control: &str) -> Self {
        self.state
            .write()
            .controls
            .insert(control.to_string(), SelectControl::default());
        self
    }

    pub fn set_input(&self, field: InputField, value: &str) {
        self.state.write().inputs.insert(field, value.to_string());
    }

    /// Move the selection of `control` to the option holding `value`.
    pub fn select(&self, control: &str, value: &str) -> bool {
        let mut state = self.state.write();
        let Some(select) = state.controls.get_mut(control) else {
            return false;
        };
        match select.options.iter().position(|opt| opt.value == value) {
            Some(index) => {
                select.selected = index;
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> Option<LinkStatus> {
        self.state.read().status
    }

    pub fn main_visible(&self) -> bool {
        self.state.read().main_visible
    }

    pub fn region(&self, region: Region) -> Option<String> {
        self.state.read().regions.get(&region).cloned()
    }

    pub fn writes(&self) -> Vec<(Region, String)> {
        self.state.read().writes.clone()
    }

    pub fn options(&self, control: &str) -> Vec<OptionEntry> {
        self.state
            .read()
            .controls
            .get(control)
            .map(|select| select.options.clone())
            .unwrap_or_default()
    }
}

impl PageSurface for MemorySurface {
    fn show_status(&self, status: LinkStatus) {
        self.state.write().status = Some(status);
    }

    fn set_main_visible(&self, visible: bool) {
        self.state.write().main_visible = visible;
    }

    fn write(&self, region: Region, content: &str) {
        let mut state = self.state.write();
        state.regions.insert(region, content.to_string());
        state.writes.push((region, content.to_string()));
    }

    fn input(&self, field: InputField) -> String {
        self.state
            .read()
            .inputs
            .get(&field)
            .cloned()
            .unwrap_or_default()
    }

    fn has_control(&self, control: &str) -> bool {
        self.state.read().controls.contains_key(control)
    }

    fn append_option(&self, control: &str, option: OptionEntry) {
        if let Some(select) = self.state.write().controls.get_mut(control) {
            select.options.push(option);
        }
    }

    fn selected_value(&self, control: &str) -> Option<String> {
        let state = self.state.read();
        let select = state.controls.get(control)?;
        select
            .options
            .get(select.selected)
            .map(|opt| opt.value.clone())
    }
}
