//! Fills the configuration selector from the binder's file listing.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DiscoveryCall;
use crate::render::highlight_text;
use crate::session::PageSession;
use crate::surface::{OptionEntry, Region};
use binder_transport::CallOutcome;

const CONFIG_EXTENSION: &str = "xml";

/// Text after the last `.`, or the whole name when it has none.
fn extension(basename: &str) -> &str {
    basename.rsplit('.').next().unwrap_or(basename)
}

/// Options for every `response` entry naming an XML file, in listing order.
///
/// Entries without a string `basename` or `dirpath` are skipped.
pub fn config_file_options(result: &Value) -> Vec<OptionEntry> {
    let Some(entries) = result.get("response").and_then(Value::as_array) else {
        warn!(target: "binder-options", "listing has no response array");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let basename = entry.get("basename").and_then(Value::as_str)?;
            let dirpath = entry.get("dirpath").and_then(Value::as_str)?;
            extension(basename)
                .eq_ignore_ascii_case(CONFIG_EXTENSION)
                .then(|| OptionEntry {
                    text: basename.to_string(),
                    value: format!("{dirpath}/{basename}"),
                })
        })
        .collect()
}

/// Run the discovery call and fill its selection control.
///
/// Returns the number of options appended.
pub async fn populate(session: &PageSession, discovery: &DiscoveryCall) -> usize {
    let surface = session.surface();
    if !surface.has_control(&discovery.control) {
        warn!(target: "binder-options", control = %discovery.control, "selection control missing from page");
        return 0;
    }

    let preview = format!(
        "{}/{}?query={}",
        session.profile().binder.ws_url(),
        discovery.address,
        discovery.query
    );
    surface.write(Region::Question, &highlight_text(&preview));

    let outcome = session
        .issue(&discovery.address, discovery.query.clone())
        .await;
    session.renderer().render_outcome(surface, &outcome);

    let CallOutcome::Success(result) = outcome else {
        return 0;
    };

    let options = config_file_options(&result);
    let appended = options.len();
    for option in options {
        surface.append_option(&discovery.control, option);
    }

    let selected = surface
        .selected_value(&discovery.control)
        .unwrap_or_default();
    debug!(target: "binder-options", appended, selected = %selected, "configuration list filled");
    session.select_config(&selected);
    appended
}
