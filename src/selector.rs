//! Field selectors for filtering PICA+ records.
//!
//! A selector names a tag, optionally an occurrence and optionally a single
//! subfield code, written the way catalogers usually do:
//!
//! | Selector | Matches |
//! |----------|---------|
//! | `021A` | every `021A` field |
//! | `044K/01` | `044K` fields with occurrence `01` |
//! | `021A$a` | `021A` fields, reduced to their `$a` subfields |
//! | `0..@` | any level-0 tag ending in `@` (`.` matches one character) |
//!
//! # Examples
//!
//! ```
//! use pica::{Field, FieldSelector};
//!
//! let selector: FieldSelector = "021A$a".parse().unwrap();
//! let field = Field::builder("021A")
//!     .unwrap()
//!     .subfield('a', "Title")
//!     .subfield('h', "Author")
//!     .build();
//!
//! assert!(selector.matches(&field));
//! let selected = selector.select(&field).unwrap();
//! assert_eq!(selected.subfields.len(), 1);
//! ```

use crate::error::{PicaError, Result};
use crate::record::{Field, Occurrence, Record};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref SELECTOR_RE: Regex =
        Regex::new(r"^([0-2.][0-9.][0-9.][A-Z@.])(?:/([0-9]{2}))?(?:\$([0-9A-Za-z]))?$")
            .expect("selector pattern is valid");
}

/// Selects fields by tag, occurrence and subfield code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    /// Tag pattern; `.` matches any single character
    pub tag: String,
    /// Required occurrence. `None` = wildcard (match any, including none)
    pub occurrence: Option<Occurrence>,
    /// Subfield code to keep. `None` keeps the whole field
    pub code: Option<char>,
}

impl FieldSelector {
    /// Create a selector for a tag pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::InvalidSelector`] if the pattern is not a tag
    /// (with optional `.` wildcards).
    pub fn new(tag: &str) -> Result<Self> {
        Self::parse(tag)
    }

    /// Parse a selector of the form `TAG[/OO][$c]`.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::InvalidSelector`] if the string does not have that form.
    pub fn parse(selector: &str) -> Result<Self> {
        let caps = SELECTOR_RE
            .captures(selector.trim())
            .ok_or_else(|| PicaError::InvalidSelector(selector.to_string()))?;

        let occurrence = caps
            .get(2)
            .map(|m| Occurrence::parse(m.as_str()))
            .transpose()
            .map_err(|_| PicaError::InvalidSelector(selector.to_string()))?;

        Ok(FieldSelector {
            tag: caps[1].to_string(),
            occurrence,
            code: caps.get(3).and_then(|m| m.as_str().chars().next()),
        })
    }

    /// Restrict the selector to one subfield code.
    #[must_use]
    pub fn with_code(mut self, code: char) -> Self {
        self.code = Some(code);
        self
    }

    /// Check whether a tag matches the tag pattern.
    #[must_use]
    pub fn matches_tag(&self, tag: &str) -> bool {
        tag.len() == self.tag.len()
            && self
                .tag
                .bytes()
                .zip(tag.bytes())
                .all(|(pattern, actual)| pattern == b'.' || pattern == actual)
    }

    /// Check if a field matches all criteria in this selector.
    ///
    /// With a subfield code set, the field must also contain that subfield.
    #[must_use]
    pub fn matches(&self, field: &Field) -> bool {
        if !self.matches_tag(field.tag.as_str()) {
            return false;
        }

        if let Some(occurrence) = self.occurrence {
            if field.occurrence != Some(occurrence) {
                return false;
            }
        }

        match self.code {
            Some(code) => field.subfield(code).is_some(),
            None => true,
        }
    }

    /// Return the selected part of a field, or `None` if it does not match.
    ///
    /// With a subfield code, only subfields with that code are kept.
    #[must_use]
    pub fn select(&self, field: &Field) -> Option<Field> {
        if !self.matches(field) {
            return None;
        }

        let mut selected = field.clone();
        if let Some(code) = self.code {
            selected.subfields.retain(|s| s.code == code);
        }
        Some(selected)
    }

    /// All values selected from a record.
    ///
    /// Without a subfield code every subfield value of every matching field is returned.
    #[must_use]
    pub fn values<'a>(&self, record: &'a Record) -> Vec<&'a str> {
        record
            .fields()
            .filter(|field| self.matches(field))
            .flat_map(|field| {
                field
                    .subfields
                    .iter()
                    .filter(|s| self.code.map_or(true, |code| s.code == code))
                    .map(|s| s.value.as_str())
            })
            .collect()
    }
}

impl FromStr for FieldSelector {
    type Err = PicaError;

    fn from_str(s: &str) -> Result<Self> {
        FieldSelector::parse(s)
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        if let Some(occurrence) = self.occurrence {
            write!(f, "/{occurrence}")?;
        }
        if let Some(code) = self.code {
            write!(f, "${code}")?;
        }
        Ok(())
    }
}
