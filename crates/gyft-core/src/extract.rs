//! Locating the JSON payload inside a model reply.
//!
//! Models wrap their JSON in prose, in fenced blocks with or without a
//! `json` tag, or forget the closing fence entirely. [`extract`] runs an
//! ordered chain of independent strategies and keeps the first non-empty
//! candidate. Parsing is left to [`crate::normalize`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtractionError;

/// Triple-backtick fence marker.
const FENCE: &str = "```";

/// Opening marker of a fence explicitly tagged as JSON.
const JSON_FENCE: &str = "```json";

/// A single-word info string (`python`, `JSON`, `c++`) on the opening fence line.
static INFO_STRING: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][\w+#.-]*[ \t]*(?:\r?\n|$)").ok());

/// One way of finding a payload, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// The whole reply already starts with `{` or `[`.
    Bare,
    /// A fence opened with "```json".
    FencedJson,
    /// The first fenced block of any kind.
    FencedAny,
    /// First opening bracket through the last matching closer.
    Brackets,
}

impl ExtractionStrategy {
    /// All strategies, in the order they are tried.
    pub const CHAIN: [Self; 4] = [Self::Bare, Self::FencedJson, Self::FencedAny, Self::Brackets];

    /// Runs this strategy, returning the trimmed candidate if it found one.
    #[must_use]
    pub fn apply(self, raw: &str) -> Option<&str> {
        let candidate = match self {
            Self::Bare => bare(raw),
            Self::FencedJson => fenced_json(raw),
            Self::FencedAny => fenced_any(raw),
            Self::Brackets => brackets(raw),
        }?
        .trim();

        (!candidate.is_empty()).then_some(candidate)
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare => write!(f, "bare"),
            Self::FencedJson => write!(f, "fenced_json"),
            Self::FencedAny => write!(f, "fenced_any"),
            Self::Brackets => write!(f, "brackets"),
        }
    }
}

/// The substring of a reply believed to hold JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPayload {
    /// Trimmed, non-empty candidate text. May still fail to parse.
    pub text: String,
    /// Which strategy produced it.
    pub strategy: ExtractionStrategy,
}

/// Extracts the payload from a raw model reply.
///
/// # Errors
///
/// Returns [`ExtractionError`] carrying the raw text when no strategy yields
/// a non-empty candidate.
pub fn extract(raw: &str) -> Result<ExtractedPayload, ExtractionError> {
    for strategy in ExtractionStrategy::CHAIN {
        if let Some(text) = strategy.apply(raw) {
            debug!(%strategy, payload_len = text.len(), "Extracted model payload");
            return Ok(ExtractedPayload {
                text: text.to_string(),
                strategy,
            });
        }
    }

    debug!(raw_len = raw.len(), "No payload found in model reply");
    Err(ExtractionError {
        raw: raw.to_string(),
    })
}

fn bare(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('[')).then_some(trimmed)
}

/// Body of a fence whose opening marker ends just before `rest`, with
/// `strip` applied to drop any info string.
///
/// The next fence marker closes the block. When that cuts the payload into
/// invalid JSON, a marker at the start of a later line is tried instead:
/// serialized JSON never holds a raw newline inside a string, so a payload
/// with backticks in a string value is not cut short. `None` when the fence
/// is never closed.
fn fence_body<'a>(rest: &'a str, strip: fn(&str) -> &str) -> Option<&'a str> {
    let nearest = strip(&rest[..rest.find(FENCE)?]);
    if parses(nearest) {
        return Some(nearest);
    }

    let line_closed = rest
        .find("\n```")
        .map(|end| strip(&rest[..end]))
        .filter(|body| body.len() > nearest.len() && parses(body));
    Some(line_closed.unwrap_or(nearest))
}

fn parses(text: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(text.trim()).is_ok()
}

fn keep_all(body: &str) -> &str {
    body
}

/// Drops a single-word info string line from the start of `body`.
fn strip_info_string(body: &str) -> &str {
    let info_len = INFO_STRING
        .as_ref()
        .and_then(|re| re.find(body))
        .map_or(0, |m| m.end());
    &body[info_len..]
}

/// Everything after "```json" up to the closing fence, or to the end when the
/// fence was never closed (truncated replies).
fn fenced_json(raw: &str) -> Option<&str> {
    let start = raw.find(JSON_FENCE)? + JSON_FENCE.len();
    let rest = &raw[start..];
    Some(fence_body(rest, keep_all).unwrap_or(rest))
}

/// Content between the first fence marker and its closer, minus the info string.
fn fenced_any(raw: &str) -> Option<&str> {
    let start = raw.find(FENCE)? + FENCE.len();
    fence_body(&raw[start..], strip_info_string)
}

fn brackets(raw: &str) -> Option<&str> {
    let object = raw.find('{');
    let array = raw.find('[');

    let order = match (object, array) {
        (Some(o), Some(a)) if a < o => [('[', ']'), ('{', '}')],
        _ => [('{', '}'), ('[', ']')],
    };

    order.into_iter().find_map(|(open, close)| {
        let start = raw.find(open)?;
        let end = raw.rfind(close)?;
        (end > start).then(|| &raw[start..=end])
    })
}
