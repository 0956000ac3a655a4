//! A small, dependency-free JSON codec.
//!
//! The board state travels as JSON in three places: the persisted state file,
//! the `/state` export and the `/edit` payload. Parsing produces a [`JsonValue`]
//! tree that callers pattern-match on; writing turns a tree back into compact
//! text with [`JsonValue::to_json`] or through its `Display` impl.

use std::collections::HashMap;

mod parse;
mod write;

pub use parse::parse;

/// A JSON number, kept integral when the source text had no fraction or exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonNumber {
    Int(i64),
    Float(f64),
}

impl JsonNumber {
    /// Returns the value as an integer, only when it was written as one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonNumber::Int(value) => Some(*value),
            JsonNumber::Float(_) => None,
        }
    }
}

/// An object whose members keep the order they were inserted in.
///
/// Inserting an existing key replaces its value in place, so the first
/// occurrence decides the position and the last one decides the value.
#[derive(Debug, Clone, Default)]
pub struct JsonObject {
    members: Vec<(String, JsonValue)>,
    positions: HashMap<String, usize>,
}

impl JsonObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) {
        let key = key.into();
        match self.positions.get(&key) {
            Some(&position) => self.members[position].1 = value,
            None => {
                self.positions.insert(key.clone(), self.members.len());
                self.members.push((key, value));
            }
        }
    }

    /// Builder-style [`JsonObject::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.positions
            .get(key)
            .map(|&position| &self.members[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.members.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl PartialEq for JsonObject {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

/// A parsed JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(JsonNumber),
    String(String),
    Array(Vec<JsonValue>),
    Object(JsonObject),
}

impl JsonValue {
    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            JsonValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonValue::Number(number) => number.as_i64(),
            _ => None,
        }
    }

    /// Renders a scalar as plain text: strings verbatim, numbers and booleans in
    /// their JSON spelling. Null, arrays and objects have no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            JsonValue::String(text) => Some(text.clone()),
            JsonValue::Number(_) | JsonValue::Bool(_) => Some(self.to_json()),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }
}

impl From<&str> for JsonValue {
    fn from(text: &str) -> Self {
        JsonValue::String(text.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(text: String) -> Self {
        JsonValue::String(text)
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Number(JsonNumber::Int(value))
    }
}

impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        JsonValue::Number(JsonNumber::Float(value))
    }
}

impl From<bool> for JsonValue {
    fn from(flag: bool) -> Self {
        JsonValue::Bool(flag)
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(items: Vec<JsonValue>) -> Self {
        JsonValue::Array(items)
    }
}

impl From<JsonObject> for JsonValue {
    fn from(object: JsonObject) -> Self {
        JsonValue::Object(object)
    }
}

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEof,
    BadValueChar(char),
    TrailingChars,
    StringNotClosed,
    BadEscapeChar(char),
    BadUnicodeEscape,
    BadNumberFormat,
    ExpectedLiteral(&'static str),
    ExpectedColon,
    KeyNotString,
    ObjectExpectedCommaOrBrace,
    ArrayExpectedCommaOrBracket,
    NestingTooDeep,
}

impl ParseErrorKind {
    /// The machine-readable tag reported to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedEof => "unexpected_eof",
            ParseErrorKind::BadValueChar(_) => "bad_value_char",
            ParseErrorKind::TrailingChars => "trailing_chars",
            ParseErrorKind::StringNotClosed => "string_not_closed",
            ParseErrorKind::BadEscapeChar(_) => "bad_escape_char",
            ParseErrorKind::BadUnicodeEscape => "bad_unicode_escape",
            ParseErrorKind::BadNumberFormat => "bad_number_format",
            ParseErrorKind::ExpectedLiteral(_) => "expected_literal",
            ParseErrorKind::ExpectedColon => "expected_colon",
            ParseErrorKind::KeyNotString => "key_not_string",
            ParseErrorKind::ObjectExpectedCommaOrBrace => "object_expected_comma_or_brace",
            ParseErrorKind::ArrayExpectedCommaOrBracket => "array_expected_comma_or_bracket",
            ParseErrorKind::NestingTooDeep => "nesting_too_deep",
        }
    }
}

/// Malformed JSON text. Carries the reason tag and the byte offset it was found at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} at byte {offset}", .kind.reason())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub fn reason(&self) -> &'static str {
        self.kind.reason()
    }
}
