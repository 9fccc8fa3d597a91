//! PICA+ record structures and operations.
//!
//! This module provides the core record types:
//! - [`Record`] — an ordered sequence of fields
//! - [`Field`] — a tagged field with an optional occurrence
//! - [`Subfield`] — a code/value pair within a field
//! - [`Tag`] and [`Occurrence`] — validated field identifiers
//!
//! # Examples
//!
//! ```
//! use pica::{Field, Record};
//!
//! let mut record = Record::new();
//! record.append(Field::builder("003@").unwrap().subfield('0', "123456789").build());
//! record.append(
//!     Field::builder("021A")
//!         .unwrap()
//!         .subfield('a', "Title")
//!         .subfield('d', "subtitle")
//!         .build(),
//! );
//!
//! assert_eq!(record.ppn(), Some("123456789"));
//! assert_eq!(record.first_subfield_value("021A", 'd'), Some("subtitle"));
//! ```

use crate::error::{PicaError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Tag of the control field holding the record identifier.
pub const PPN_TAG: &str = "003@";

/// Subfield code of the record identifier within [`PPN_TAG`].
pub const PPN_CODE: char = '0';

/// Highest occurrence value that fits the two-digit serialized form.
pub const MAX_OCCURRENCE: u8 = 99;

/// A field tag such as `021A` or `003@`.
///
/// Tags are four characters: a digit `0`-`2` giving the level, two more
/// digits, and an uppercase letter or `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Parse and validate a tag.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] if `value` does not match the tag grammar.
    pub fn new(value: &str) -> Result<Self> {
        if is_valid_tag(value) {
            Ok(Tag(value.to_string()))
        } else {
            Err(PicaError::malformed_field(
                value,
                "tag does not match [0-2][0-9][0-9][A-Z@]",
            ))
        }
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The level of the tag (`0` record, `1` local, `2` copy).
    #[must_use]
    pub fn level(&self) -> u8 {
        self.0.as_bytes()[0] - b'0'
    }
}

fn is_valid_tag(value: &str) -> bool {
    let b = value.as_bytes();
    b.len() == 4
        && (b'0'..=b'2').contains(&b[0])
        && b[1].is_ascii_digit()
        && b[2].is_ascii_digit()
        && (b[3].is_ascii_uppercase() || b[3] == b'@')
}

impl FromStr for Tag {
    type Err = PicaError;

    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = PicaError;

    fn try_from(value: String) -> Result<Self> {
        Tag::new(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Occurrence number distinguishing repeated fields with the same tag.
///
/// Always serialized as two zero-padded digits (`01`, `42`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Occurrence(u8);

impl Occurrence {
    /// Create an occurrence, rejecting values above [`MAX_OCCURRENCE`].
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] if the value does not fit two digits.
    pub fn new(value: u8) -> Result<Self> {
        if value > MAX_OCCURRENCE {
            return Err(PicaError::malformed_field(
                value.to_string(),
                "occurrence must be between 00 and 99",
            ));
        }
        Ok(Occurrence(value))
    }

    /// Parse the two-digit textual form.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] unless `value` is exactly two ASCII digits.
    pub fn parse(value: &str) -> Result<Self> {
        let b = value.as_bytes();
        if b.len() != 2 || !b.iter().all(u8::is_ascii_digit) {
            return Err(PicaError::malformed_field(
                value,
                "occurrence must be two digits",
            ));
        }
        Ok(Occurrence((b[0] - b'0') * 10 + (b[1] - b'0')))
    }

    /// The numeric value.
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Occurrence {
    type Error = PicaError;

    fn try_from(value: u8) -> Result<Self> {
        Occurrence::new(value)
    }
}

impl From<Occurrence> for u8 {
    fn from(occurrence: Occurrence) -> Self {
        occurrence.0
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Subfield {
    /// Create a subfield.
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }
}

/// A field in a PICA+ record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag
    pub tag: Tag,
    /// Occurrence, `None` for fields without one
    pub occurrence: Option<Occurrence>,
    /// Subfields in source order (stored in `SmallVec` since most fields carry few subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

impl Field {
    /// Create an empty field.
    #[must_use]
    pub fn new(tag: Tag, occurrence: Option<Occurrence>) -> Self {
        Field {
            tag,
            occurrence,
            subfields: SmallVec::new(),
        }
    }

    /// Create a field builder from a tag string.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] if the tag is invalid.
    pub fn builder(tag: &str) -> Result<FieldBuilder> {
        Ok(FieldBuilder {
            field: Field::new(Tag::new(tag)?, None),
        })
    }

    /// Parse a field token of the form `TAG` or `TAG/OO`.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] carrying the whole token when either
    /// part does not match its grammar.
    pub fn parse_token(token: &str) -> Result<(Tag, Option<Occurrence>)> {
        let (tag, occurrence) = match token.split_once('/') {
            Some((tag, occurrence)) => (tag, Some(occurrence)),
            None => (token, None),
        };
        let tag = Tag::new(tag).map_err(|e| retoken(e, token))?;
        let occurrence = occurrence
            .map(Occurrence::parse)
            .transpose()
            .map_err(|e| retoken(e, token))?;
        Ok((tag, occurrence))
    }

    /// The field token, e.g. `021A` or `101@/01`.
    #[must_use]
    pub fn token(&self) -> String {
        match self.occurrence {
            Some(occurrence) => format!("{}/{occurrence}", self.tag),
            None => self.tag.to_string(),
        }
    }

    /// The occurrence in its two-digit form, if any.
    #[must_use]
    pub fn occurrence_string(&self) -> Option<String> {
        self.occurrence.map(|o| o.to_string())
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        self.subfields.push(Subfield::new(code, value));
    }

    /// Value of the first subfield with the given code.
    #[must_use]
    pub fn subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }

    /// Values of all subfields with the given code, in order.
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |s| s.code == code)
            .map(|s| s.value.as_str())
    }

    /// Replace the first subfield with `code`, or append one.
    pub fn set_subfield(&mut self, code: char, value: impl Into<String>) {
        let value = value.into();
        match self.subfields.iter_mut().find(|s| s.code == code) {
            Some(subfield) => subfield.value = value,
            None => self.subfields.push(Subfield { code, value }),
        }
    }

    /// Whether the field has no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subfields.is_empty()
    }
}

// Errors from the tag/occurrence parts are reported against the full token.
fn retoken(err: PicaError, token: &str) -> PicaError {
    match err {
        PicaError::MalformedField { reason, .. } => PicaError::malformed_field(token, reason),
        other => other,
    }
}

/// Builder for [`Field`].
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Set the occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] if the occurrence is above 99.
    pub fn occurrence(mut self, occurrence: u8) -> Result<Self> {
        self.field.occurrence = Some(Occurrence::new(occurrence)?);
        Ok(self)
    }

    /// Append a subfield.
    #[must_use]
    pub fn subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Finish the field.
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}

/// A PICA+ record
///
/// Fields are kept in a plain vector in source order. Nothing reorders them;
/// only [`append`](Record::append), [`remove`](Record::remove) and
/// [`set_subfield`](Record::set_subfield) change the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Fields in source order
    pub fields: Vec<Field>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    /// Append a field at the end.
    pub fn append(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Iterate over all fields in order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields with the given tag, in order.
    #[must_use]
    pub fn fields_with_tag(&self, tag: &str) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.tag == tag).collect()
    }

    /// Values of subfield `code` in every field tagged `tag`, across occurrences.
    #[must_use]
    pub fn subfield_values(&self, tag: &str, code: char) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.tag == tag)
            .flat_map(|f| f.subfields_by_code(code))
            .collect()
    }

    /// The first value of subfield `code` in a field tagged `tag`.
    #[must_use]
    pub fn first_subfield_value(&self, tag: &str, code: char) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.tag == tag)
            .find_map(|f| f.subfield(code))
    }

    /// The record identifier (`003@$0`), `None` for unassigned records.
    #[must_use]
    pub fn ppn(&self) -> Option<&str> {
        self.first_subfield_value(PPN_TAG, PPN_CODE)
    }

    /// Remove every field with the given tag and return how many were removed.
    pub fn remove(&mut self, tag: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| f.tag != tag);
        before - self.fields.len()
    }

    /// Set subfield `code` of the first field tagged `tag`.
    ///
    /// Appends a new field when the record has no field with that tag.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedField`] if a new field is needed and `tag` is invalid.
    pub fn set_subfield(&mut self, tag: &str, code: char, value: impl Into<String>) -> Result<()> {
        if let Some(field) = self.fields.iter_mut().find(|f| f.tag == tag) {
            field.set_subfield(code, value);
        } else {
            let mut field = Field::new(Tag::new(tag)?, None);
            field.add_subfield(code, value);
            self.fields.push(field);
        }
        Ok(())
    }
}

impl FromIterator<Field> for Record {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
