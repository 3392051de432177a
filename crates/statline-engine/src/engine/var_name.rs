//! Namespaced variable names.
//!
//! Variables are identified by strings whose segments are joined with `|`,
//! e.g. `unit|total|str`. A [`VarName`] can only be built from a string that
//! is a valid identifier in the formula language, so every name held by the
//! engine is one a formula could refer to.
//!
//! # Examples
//!
//! ```
//! use statline_engine::engine::VarName;
//!
//! let name = VarName::new("unit|total|str").unwrap();
//! assert_eq!(name.segments().collect::<Vec<_>>(), ["unit", "total", "str"]);
//! assert_eq!(name.last_segment(), "str");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{EngineError, Result};

/// Separator between the segments of a namespaced name.
pub const DELIMITER: char = '|';

/// Words of the formula language that cannot name a variable.
pub const KEYWORDS: &[&str] = &["if", "then", "elseif", "else", "end", "let", "and", "or"];

pub(crate) fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][0-9A-Za-z_$|]*$").expect("identifier regex must compile")
    })
}

/// A validated, namespaced variable name.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VarName(String);

impl VarName {
    /// Validate `name` and wrap it.
    pub fn new(name: impl Into<String>) -> Result<VarName> {
        let name = name.into();
        if !identifier_re().is_match(&name) || KEYWORDS.contains(&name.as_str()) {
            return Err(EngineError::InvalidName(name));
        }
        Ok(VarName(name))
    }

    /// Join segments with [`DELIMITER`] and validate the result.
    pub fn from_segments<I, S>(segments: I) -> Result<VarName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(&DELIMITER.to_string());
        VarName::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(DELIMITER)
    }

    /// The final segment, used as a short key by display code.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit(DELIMITER).next().unwrap_or(&self.0)
    }

    /// Identifier-safe rendering (`|` becomes `_`), used for graph output.
    pub fn clean(&self) -> String {
        self.0.replace(DELIMITER, "_")
    }
}

impl std::str::FromStr for VarName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        VarName::new(s)
    }
}

impl TryFrom<String> for VarName {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        VarName::new(value)
    }
}

impl TryFrom<&str> for VarName {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self> {
        VarName::new(value)
    }
}

impl From<VarName> for String {
    fn from(value: VarName) -> String {
        value.0
    }
}

impl Borrow<str> for VarName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VarName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_keywords_and_bad_leading_chars() {
        assert!(VarName::new("if").is_err());
        assert!(VarName::new("end").is_err());
        assert!(VarName::new("1abc").is_err());
        assert!(VarName::new("|unit").is_err());
        assert!(VarName::new("").is_err());
        assert!(VarName::new("unit total").is_err());
    }

    #[test]
    fn test_accepts_namespaced_names() {
        assert!(VarName::new("unit|base|str").is_ok());
        assert!(VarName::new("$tmp").is_ok());
        assert!(VarName::new("_x1|y").is_ok());
        // Builtin function names are only special when called.
        assert!(VarName::new("max").is_ok());
    }

    #[test]
    fn test_from_segments() {
        let name = VarName::from_segments(["unit", "total", "str"]).unwrap();
        assert_eq!(name.as_str(), "unit|total|str");
        assert_eq!(name.clean(), "unit_total_str");
        assert!(VarName::from_segments(["unit", "1x y"]).is_err());
    }

    #[test]
    fn test_serde_validates() {
        use serde::de::value::{Error, StrDeserializer};

        let ok = VarName::deserialize(StrDeserializer::<Error>::new("unit|hp")).unwrap();
        assert_eq!(ok.as_str(), "unit|hp");
        assert!(VarName::deserialize(StrDeserializer::<Error>::new("1bad")).is_err());
    }
}
