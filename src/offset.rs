//! Recovers departure countdowns embedded in a line's `towards` text.
//!
//! Lines without real-time estimates report their next departures as part of
//! the destination, e.g. `"Heiligenstadt   3,7,15"`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineError;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new("[0-9]+").expect("valid digit regex"));
static LEADING_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("(?i)^[a-zäöüß ]+").expect("valid destination regex"));
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(" {2,}").expect("valid space regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOffsets {
    pub destination: String,
    /// Minutes from server time, in the order they appear in the text.
    pub offsets: Vec<u32>,
}

/// Splits `towards` into a cleaned destination name and its minute offsets.
///
/// # Errors
///
/// Returns [`EngineError::MalformedOffsetText`] if the text has no digit run,
/// no leading run of letters (blanks alone do not count), or a digit run too
/// large to be a minute count.
pub fn resolve_offsets(towards: &str) -> Result<ResolvedOffsets, EngineError> {
    let malformed = || EngineError::MalformedOffsetText {
        text: towards.to_string(),
    };

    let offsets = DIGIT_RUN
        .find_iter(towards)
        .map(|m| m.as_str().parse::<u32>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>, _>>()?;
    if offsets.is_empty() {
        return Err(malformed());
    }

    let name = LEADING_NAME.find(towards).ok_or_else(malformed)?;
    let destination = MULTI_SPACE
        .replace_all(name.as_str(), " ")
        .trim()
        .to_string();
    if destination.is_empty() {
        return Err(malformed());
    }

    Ok(ResolvedOffsets {
        destination,
        offsets,
    })
}
