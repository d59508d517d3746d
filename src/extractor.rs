//! Session credential extraction from a server-rendered Threads post page.
//!
//! Threads embeds the two values needed to call the replies endpoint inside
//! inline `<script>` blocks: the numeric post identifier appears in a relay
//! data payload, and the `fb_dtsg` request token lives in the JSON body of
//! the `script#__eqmc` element.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

/// Substring that marks the script payload carrying the post identifier.
const POST_ID_MARKER: &str = "post_id";

/// Field inside the `__eqmc` JSON body that holds the request token.
const DTSG_FIELD: &str = "f";

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").unwrap());
static EQMC_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script#__eqmc").unwrap());

/// Credentials recovered from a thread page.
///
/// Either field is `None` when its extraction point was missing or
/// unparseable. The crawler refuses to run unless both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Identifier of the root post, as passed in the `postID` variable.
    pub post_id: Option<String>,
    /// Request-authorization token sent as the `fb_dtsg` form field.
    pub fb_dtsg: Option<String>,
}

impl Credentials {
    /// Both credentials, when the extraction recovered the full pair.
    #[must_use]
    pub fn complete(&self) -> Option<(&str, &str)> {
        match (self.post_id.as_deref(), self.fb_dtsg.as_deref()) {
            (Some(post_id), Some(fb_dtsg)) => Some((post_id, fb_dtsg)),
            _ => None,
        }
    }

    /// Names of the fields the extraction failed to recover.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.post_id.is_none() {
            missing.push("post_id");
        }
        if self.fb_dtsg.is_none() {
            missing.push("fb_dtsg");
        }
        missing
    }
}

/// Extract the post identifier and `fb_dtsg` token from thread-page HTML.
///
/// Lookup failures are logged and yield `None` for the affected field; this
/// function never fails as a whole and performs no network I/O.
#[must_use]
pub fn extract_credentials(html: &str) -> Credentials {
    let document = Html::parse_document(html);

    Credentials {
        post_id: extract_post_id(&document),
        fb_dtsg: extract_fb_dtsg(&document),
    }
}

/// Scan inline scripts for the first JSON payload carrying a `post_id` key.
///
/// Commits to the first script whose text contains the marker substring and
/// parses as JSON, then takes the first `post_id` key found by depth-first
/// traversal of that document.
fn extract_post_id(document: &Html) -> Option<String> {
    for script in document.select(&SCRIPT_SELECTOR) {
        let content: String = script.text().collect();
        if !content.contains(POST_ID_MARKER) {
            continue;
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(payload) => {
                let found = find_key(&payload, POST_ID_MARKER).and_then(scalar_to_string);
                if found.is_none() {
                    warn!("Script payload contains the post_id marker but no usable value");
                }
                return found;
            }
            Err(e) => {
                // Marker substring can appear in non-JSON bootstrap scripts.
                debug!(error = %e, "Skipping non-JSON script containing post_id marker");
            }
        }
    }

    warn!("No script payload with a post_id value found in page");
    None
}

/// Read the `fb_dtsg` token from the JSON body of `script#__eqmc`.
fn extract_fb_dtsg(document: &Html) -> Option<String> {
    let Some(script) = document.select(&EQMC_SELECTOR).next() else {
        warn!("No script#__eqmc element found in page");
        return None;
    };

    let content: String = script.text().collect();
    match serde_json::from_str::<Value>(&content) {
        Ok(payload) => {
            let token = payload
                .get(DTSG_FIELD)
                .and_then(Value::as_str)
                .map(ToString::to_string);
            if token.is_none() {
                warn!("script#__eqmc payload has no '{DTSG_FIELD}' field");
            }
            token
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse script#__eqmc content as JSON");
            None
        }
    }
}

/// Find the first value under `key` at any depth of a parsed JSON document.
///
/// Traversal is depth-first: object entries in parsed key order, then array
/// elements by index. The first match wins.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                if name == key {
                    return Some(child);
                }
                if let Some(found) = find_key(child, key) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(|item| find_key(item, key)),
        _ => None,
    }
}

/// Render a scalar JSON value as a string; identifiers arrive as either.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
