//! JSON syntax highlighting for HTML display.
//!
//! Tokens are found with a single regular expression and wrapped in
//! `<span class="...">` elements; everything between tokens is passed through.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(\\u[a-zA-Z0-9]{4}|\\[^u]|[^\\"])*"(\s*:)?|(?-u:\b)(true|false|null)(?-u:\b)|-?[0-9]+(?:\.[0-9]*)?(?:[eE][+\-]?[0-9]+)?"#,
    )
    .unwrap()
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenClass {
    Key,
    String,
    Number,
    Boolean,
    Null,
}

impl TokenClass {
    pub fn css_class(&self) -> &'static str {
        match self {
            TokenClass::Key => "key",
            TokenClass::String => "string",
            TokenClass::Number => "number",
            TokenClass::Boolean => "boolean",
            TokenClass::Null => "null",
        }
    }

    /// A quoted token ending in a colon is an object key.
    fn of(token: &str) -> Self {
        if token.starts_with('"') {
            if token.ends_with(':') {
                TokenClass::Key
            } else {
                TokenClass::String
            }
        } else if token == "true" || token == "false" {
            TokenClass::Boolean
        } else if token == "null" {
            TokenClass::Null
        } else {
            TokenClass::Number
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token<'a> {
    pub class: TokenClass,
    pub text: &'a str,
}

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| Token {
            class: TokenClass::of(m.as_str()),
            text: m.as_str(),
        })
        .collect()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape `text` and wrap every JSON-looking token in a classed span.
pub fn highlight_text(text: &str) -> String {
    let escaped = escape_html(text);
    TOKEN_RE
        .replace_all(&escaped, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            format!(
                "<span class=\"{}\">{}</span>",
                TokenClass::of(token).css_class(),
                token
            )
        })
        .into_owned()
}

/// Pretty-print `value` with two-space indentation, then highlight it.
pub fn highlight_json(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    highlight_text(&pretty)
}
