//! In-band action marker codec.
//!
//! The model drives page behavior through fixed-syntax markers embedded
//! in its free-form answer, e.g. `[[navigate:/pricing]]` or
//! `[[link:https://example.com|Example]]`. This crate parses those
//! markers out of untrusted model output into structured action records
//! and returns the marker-free visible text.
//!
//! The grammar has no structural contract with the model — only the
//! prose instruction block below. Patterns and instructions live in
//! this one file so they change together; a test asserts every marker
//! key is documented. This coupling is an accepted fragility of the
//! design, traded for not needing a tool-calling protocol.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// What a parsed action asks the client to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Navigate,
    Search,
    Scroll,
    Highlight,
    OpenLink,
    CopyText,
    Suggest,
    ShowNotification,
}

/// A structured, executable action record. Created only by parsing
/// model output; consumed exactly once by the client-side executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Action {
    fn simple(kind: ActionKind, key: &str, value: &str) -> Self {
        let mut payload = serde_json::Map::new();
        payload.insert(key.into(), serde_json::Value::String(value.into()));
        Self {
            kind,
            payload,
            label: None,
            description: None,
        }
    }

    /// Convenience accessor for single-string payloads in tests and
    /// downstream consumers.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// The result of one parse pass over raw model output.
#[derive(Debug, Clone, Default)]
pub struct ParsedOutput {
    /// The visible answer: marker-free residue, trimmed.
    pub clean_text: String,
    /// All extracted actions, grouped by kind in pass order, document
    /// order within a kind.
    pub actions: Vec<Action>,
}

/// Marker kinds with a single free-text payload, in fixed pass order.
/// (`link` is handled separately because of its `url|label` payload.)
const SIMPLE_MARKERS: [(&str, ActionKind, &str); 7] = [
    ("navigate", ActionKind::Navigate, "path"),
    ("search", ActionKind::Search, "query"),
    ("scroll", ActionKind::Scroll, "selector"),
    ("highlight", ActionKind::Highlight, "text"),
    ("copy", ActionKind::CopyText, "text"),
    ("suggest", ActionKind::Suggest, "text"),
    ("notify", ActionKind::ShowNotification, "message"),
];

/// Parse raw model output into clean text plus action records.
///
/// Each marker kind is scanned and stripped in a full independent pass
/// over the text, so one kind is never affected by the presence of
/// another. Malformed or absent markers simply produce zero actions —
/// this function cannot fail.
pub fn parse(raw: &str) -> ParsedOutput {
    let mut text = raw.to_string();
    let mut actions: Vec<Action> = Vec::new();

    for (key, kind, payload_key) in SIMPLE_MARKERS {
        // Unwrap is sound: the pattern is a compile-time constant.
        let re = Regex::new(&format!(r"\[\[{key}:([^\]]+)\]\]")).unwrap();
        for caps in re.captures_iter(&text) {
            let value = caps[1].trim();
            if !value.is_empty() {
                actions.push(Action::simple(kind, payload_key, value));
            }
        }
        text = re.replace_all(&text, "").into_owned();
    }

    // link takes `url|label`, label optional and defaulting to the url.
    let link_re = Regex::new(r"\[\[link:([^\]|]+)(?:\|([^\]]+))?\]\]").unwrap();
    for caps in link_re.captures_iter(&text) {
        let url = caps[1].trim().to_string();
        if url.is_empty() {
            continue;
        }
        let label = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| url.clone());

        let mut payload = serde_json::Map::new();
        payload.insert("url".into(), serde_json::Value::String(url));
        payload.insert("label".into(), serde_json::Value::String(label.clone()));
        actions.push(Action {
            kind: ActionKind::OpenLink,
            payload,
            label: Some(label),
            description: None,
        });
    }
    text = link_re.replace_all(&text, "").into_owned();

    ParsedOutput {
        clean_text: text.trim().to_string(),
        actions,
    }
}

/// The fixed instruction block that documents the marker grammar to the
/// model. Appended to the system prompt when actions are enabled; must
/// stay in lockstep with the patterns above.
pub const ACTION_INSTRUCTIONS: &str = "\
You can control the page with action markers embedded in your answer. \
Use them sparingly and only when they genuinely help the user. \
Markers are removed from the visible reply before it is shown.

Available markers:
- [[navigate:/path]] — take the user to a page on this site
- [[search:query]] — run a site search
- [[scroll:#selector]] — scroll to an element on the current page
- [[highlight:text]] — highlight matching text on the current page
- [[link:url|label]] — offer an external link as a button (label optional)
- [[copy:text]] — offer a copy-to-clipboard button with the given text
- [[suggest:text]] — propose a follow-up question the user might ask next
- [[notify:message]] — show a short notification message

The marker key is case-sensitive and the payload runs until the closing \
]]. Suggest one to three follow-ups when a natural next question exists.";
