//! Page address parameters.
//!
//! Values are read once from the query component of the page address and never change
//! afterwards. A parameter that is absent, or present without a value, takes its default.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::config::PageVariant;

/// Decode one raw value: `+` is a space, `%XX` escapes are expanded.
fn decode_component(raw: &str) -> String {
    form_urlencoded::parse(format!("={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Value of the first `name` following a `?` or `&` in the raw `address`, decoded.
///
/// The name is matched undecoded and the value runs to the next `&` or `#`.
/// `Some("")` when the parameter is present without a value, `None` when it is absent.
pub fn parameter_by_name(name: &str, address: &str) -> Option<String> {
    let pattern = format!(r"[?&]{}(=([^&#]*)|&|#|$)", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(address)?;
    Some(
        caps.get(2)
            .map(|value| decode_component(value.as_str()))
            .unwrap_or_default(),
    )
}

/// Like [`parameter_by_name`], substituting `default` when the value is absent or empty.
pub fn parameter_or(name: &str, address: &str, default: &str) -> String {
    match parameter_by_name(name, address) {
        Some(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// Configuration values a page reads from its address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// ALSA device id, e.g. `hw:0`.
    pub devid: String,
    /// Sound card name.
    pub sndname: String,
    pub quiet: String,
    /// Hardware abstraction layer device.
    pub haldev: String,
    pub mode: String,
}

impl PageParams {
    pub fn defaults(variant: PageVariant) -> Self {
        let devid = match variant {
            PageVariant::Audio => "hw:0",
            PageVariant::Unicens => "hw:1",
        };
        Self {
            devid: devid.to_string(),
            sndname: "PCH".to_string(),
            quiet: "99".to_string(),
            haldev: "scarlett-usb".to_string(),
            mode: "0".to_string(),
        }
    }

    pub fn resolve(address: &str, variant: PageVariant) -> Self {
        let defaults = Self::defaults(variant);
        Self {
            devid: parameter_or("devid", address, &defaults.devid),
            sndname: parameter_or("sndname", address, &defaults.sndname),
            quiet: parameter_or("quiet", address, &defaults.quiet),
            haldev: parameter_or("haldev", address, &defaults.haldev),
            mode: parameter_or("mode", address, &defaults.mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_plus_and_percent() {
        let address = "http://car.local/audio.html?sndname=USB+Audio%20Device&devid=hw%3A2";
        assert_eq!(
            parameter_by_name("sndname", address).as_deref(),
            Some("USB Audio Device")
        );
        assert_eq!(parameter_by_name("devid", address).as_deref(), Some("hw:2"));
    }

    #[test]
    fn valueless_and_absent_parameters() {
        let address = "http://car.local/ucs2.html?quiet&mode=";
        assert_eq!(parameter_by_name("quiet", address).as_deref(), Some(""));
        assert_eq!(parameter_by_name("mode", address).as_deref(), Some(""));
        assert_eq!(parameter_by_name("devid", address), None);
        assert_eq!(parameter_or("quiet", address, "99"), "99");
        assert_eq!(parameter_or("devid", address, "hw:1"), "hw:1");
    }

    #[test]
    fn first_occurrence_wins_and_names_match_exactly() {
        let address = "/page?devid=hw:3&devid=hw:4&xdevid=nope";
        assert_eq!(parameter_by_name("devid", address).as_deref(), Some("hw:3"));
        assert_eq!(parameter_by_name("xdev", address), None);
    }

    #[test]
    fn fragment_is_not_part_of_the_query() {
        let address = "http://car.local/p.html?mode=1#devid=hw:9";
        assert_eq!(parameter_by_name("mode", address).as_deref(), Some("1"));
        assert_eq!(parameter_by_name("devid", address), None);
    }

    #[test]
    fn names_are_compared_undecoded() {
        assert_eq!(parameter_by_name("devid", "http://h/p?dev%69d=hw:5"), None);
        assert_eq!(
            parameter_by_name("dev%69d", "http://h/p?dev%69d=hw:5").as_deref(),
            Some("hw:5")
        );
    }

    #[test]
    fn a_later_question_mark_also_starts_a_parameter() {
        let address = "http://h/p?a=1?devid=hw:5";
        assert_eq!(parameter_by_name("devid", address).as_deref(), Some("hw:5"));
        assert_eq!(parameter_by_name("a", address).as_deref(), Some("1?devid=hw:5"));
    }

    #[test]
    fn regex_characters_in_names_are_literal() {
        assert_eq!(parameter_by_name("d.vid", "?devid=hw:5"), None);
        assert_eq!(parameter_by_name("a[0]", "?a[0]=x").as_deref(), Some("x"));
    }

    #[test]
    fn variant_defaults_apply() {
        let audio = PageParams::resolve("http://car.local/audio.html", PageVariant::Audio);
        assert_eq!(audio.devid, "hw:0");
        assert_eq!(audio.sndname, "PCH");
        assert_eq!(audio.quiet, "99");

        let unicens = PageParams::resolve(
            "http://car.local/ucs2.html?haldev=&mode=2",
            PageVariant::Unicens,
        );
        assert_eq!(unicens.devid, "hw:1");
        assert_eq!(unicens.haldev, "scarlett-usb");
        assert_eq!(unicens.mode, "2");
    }
}
