//! Tag specifications
//!
//! A tag spec is either `<tag-name>` (a free tag) or
//! `<vocabulary-name>:<tag-name>`. Tag names are 2 to 100 characters of
//! ASCII letters, digits, space, `_` and `-`; vocabulary names are any 2 to
//! 100 characters.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static TAGNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _-]{2,100}$").unwrap());

static TAGSPEC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(.{2,100}):)?([A-Za-z0-9 _-]{2,100})$").unwrap());

/// Check if a string is a valid tag name
pub fn validate_tagname(tagname: &str) -> bool {
    TAGNAME_REGEX.is_match(tagname)
}

/// Check if a string is a valid tag spec
pub fn validate_tagspec(tagspec: &str) -> bool {
    TAGSPEC_REGEX.is_match(tagspec)
}

/// Split a tag spec into `(vocabulary, tag name)`.
///
/// The vocabulary takes everything up to the last `:` that leaves a valid
/// tag name behind.
pub fn tag_split(tagspec: &str) -> Result<(Option<&str>, &str)> {
    let captures = TAGSPEC_REGEX
        .captures(tagspec)
        .ok_or_else(|| Error::TagSpec(tagspec.to_string()))?;

    let vocabulary = captures.get(1).map(|m| m.as_str());
    let name = captures
        .get(2)
        .map(|m| m.as_str())
        .ok_or_else(|| Error::TagSpec(tagspec.to_string()))?;
    Ok((vocabulary, name))
}

/// Build a tag spec from its parts
pub fn tag_join(vocabulary: Option<&str>, tagname: &str) -> String {
    match vocabulary {
        Some(vocabulary) => format!("{vocabulary}:{tagname}"),
        None => tagname.to_string(),
    }
}
