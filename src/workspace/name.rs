//! Project and handler name grammar.
//!
//! # Responsibilities
//! - Validate caller-supplied names before they are joined onto any path
//! - Provide strongly typed names so unvalidated strings never reach the fs
//!
//! # Design Decisions
//! - Validation is pure: no filesystem access happens here
//! - One grammar for both project and handler names

use std::fmt;

use crate::error::DispatchError;

/// Maximum accepted length of a project or handler name, in characters.
pub const MAX_NAME_LEN: usize = 50;

const DENYLIST: &[char] = &[
    '/', '\\', '<', '>', ':', '"', '|', '?', '*', ';', '&', '$', '`', '\'', '%', '~', '!',
];

fn validate(kind: &str, raw: &str) -> Result<(), DispatchError> {
    let reject = |reason: &str| Err(DispatchError::Forbidden(format!("invalid {kind} name '{raw}': {reason}")));

    if raw.is_empty() {
        return reject("empty");
    }
    if raw.chars().count() > MAX_NAME_LEN {
        return reject("too long");
    }
    if raw.contains("..") {
        return reject("contains '..'");
    }
    if raw.starts_with('.') {
        return reject("hidden name");
    }
    if let Some(c) = raw
        .chars()
        .find(|c| c.is_control() || c.is_whitespace() || DENYLIST.contains(c))
    {
        return reject(&format!("illegal character {c:?}"));
    }
    Ok(())
}

/// A validated project name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        validate("project", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated handler name (the file stem of a handler source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerName(String);

impl HandlerName {
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        validate("handler", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
