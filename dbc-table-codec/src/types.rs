//! Core types for the DBC table codec
//!
//! This module defines the CAN database model handed over by the DBC parsing
//! collaborator, the cell values exchanged with tabular storage, and the error
//! type shared by both conversion directions.

use crate::schema::Field;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Byte order of a signal inside the message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

impl ByteOrder {
    /// Text form used in the "Endianness" column
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "little_endian",
            ByteOrder::BigEndian => "big_endian",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signedness of the raw signal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Signed => "signed",
            ValueType::Unsigned => "unsigned",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanSignal {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame
    pub start_bit: u64,
    /// Length in bits
    pub length: u64,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Byte order of the raw value
    pub byte_order: ByteOrder,
    /// Engineering unit (e.g., "km/h", "V"), empty when not set
    pub unit: String,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: Option<f64>,
    /// Maximum physical value
    pub max: Option<f64>,
    /// Free-text comments (None when the source carries no comment at all)
    pub comments: Option<Vec<String>>,
}

/// A CAN message definition as supplied by the DBC parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanMessage {
    /// Raw frame id as stored in the DBC (bit 31 set for extended frames)
    pub frame_id: u32,
    /// Message name
    pub name: String,
    /// Data length code (payload size in bytes)
    pub dlc: u64,
    /// Free-text comments, in source order
    #[serde(default)]
    pub comments: Vec<String>,
    /// All signals in this message, in source order
    #[serde(default)]
    pub signals: Vec<CanSignal>,
}

/// A single value in a tabular row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Nothing in this cell
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// True for empty cells, whitespace-only text and NaN
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Float(v) => v.is_nan(),
            Cell::Integer(_) => false,
        }
    }

    /// Parse a raw text value the way a spreadsheet would type it
    ///
    /// Plain decimal integers become `Integer`, other plain decimal numbers
    /// `Float`, everything else `Text`. An empty string is `Empty`. Exponent
    /// forms and zero-padded digits stay text so hex identifiers such as
    /// `1E5` or `00000100` survive unchanged.
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }

        let plain_decimal = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
        let digits = trimmed.trim_start_matches(&['-', '+'][..]);
        let zero_padded = digits.len() > 1
            && digits.starts_with('0')
            && digits.as_bytes()[1].is_ascii_digit();
        if !plain_decimal || zero_padded {
            return Cell::Text(raw.to_string());
        }

        if let Ok(v) = trimmed.parse::<i64>() {
            return Cell::Integer(v);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Float(v),
            _ => Cell::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

/// Where an identifier problem was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Zero-based row index in the composed table
    Row(usize),
    /// Message name in the flattened database
    Message(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Row(row) => write!(f, "row {}", row),
            Location::Message(name) => write!(f, "message '{}'", name),
        }
    }
}

/// Errors that can occur during flattening or composition
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed CAN identifier '{token}' at {location}: {reason}")]
    MalformedIdentifier {
        location: Location,
        token: String,
        reason: String,
    },

    #[error("Row {row}: required field '{field}' has no value")]
    MissingRequiredField { row: usize, field: Field },

    #[error("Row {row}: data type '{value}' is neither signed nor unsigned")]
    UnrecognizedDataType { row: usize, value: String },

    #[error("Row {row}: field '{field}' holds '{value}', which is not a valid number")]
    NumericParseFailure {
        row: usize,
        field: Field,
        value: String,
    },

    #[error("Invalid column mapping: {0}")]
    InvalidMapping(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Row index the error refers to, if it came out of composition
    pub fn row(&self) -> Option<usize> {
        match self {
            CodecError::MalformedIdentifier {
                location: Location::Row(row),
                ..
            } => Some(*row),
            CodecError::MissingRequiredField { row, .. }
            | CodecError::UnrecognizedDataType { row, .. }
            | CodecError::NumericParseFailure { row, .. } => Some(*row),
            _ => None,
        }
    }

    /// Schema field the error refers to, if any
    pub fn field(&self) -> Option<Field> {
        match self {
            CodecError::MissingRequiredField { field, .. }
            | CodecError::NumericParseFailure { field, .. } => Some(*field),
            CodecError::UnrecognizedDataType { .. } => Some(Field::DataType),
            CodecError::MalformedIdentifier {
                location: Location::Row(_),
                ..
            } => Some(Field::CanId),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("   "), Cell::Empty);
        assert_eq!(Cell::parse("16"), Cell::Integer(16));
        assert_eq!(Cell::parse("0.25"), Cell::Float(0.25));
        assert_eq!(Cell::parse("rpm"), Cell::Text("rpm".to_string()));
        assert_eq!(Cell::parse("-40"), Cell::Integer(-40));
        assert_eq!(Cell::parse("0"), Cell::Integer(0));
        assert_eq!(Cell::parse("0.5"), Cell::Float(0.5));
        assert_eq!(Cell::parse("NaN"), Cell::Text("NaN".to_string()));
        assert_eq!(Cell::parse("1E5"), Cell::Text("1E5".to_string()));
        assert_eq!(Cell::parse("00000100"), Cell::Text("00000100".to_string()));
    }

    #[test]
    fn test_cell_blank() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::Text(" ".to_string()).is_blank());
        assert!(Cell::Float(f64::NAN).is_blank());
        assert!(!Cell::Integer(0).is_blank());
        assert!(!Cell::Text("x".to_string()).is_blank());
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Integer(256).to_string(), "256");
        assert_eq!(Cell::Float(0.25).to_string(), "0.25");
        assert_eq!(Cell::Empty.to_string(), "");
    }

    #[test]
    fn test_error_row_and_field() {
        let err = CodecError::NumericParseFailure {
            row: 3,
            field: Field::Scale,
            value: "abc".to_string(),
        };
        assert_eq!(err.row(), Some(3));
        assert_eq!(err.field(), Some(Field::Scale));
        assert_eq!(
            err.to_string(),
            "Row 3: field 'Scale' holds 'abc', which is not a valid number"
        );

        let err = CodecError::MalformedIdentifier {
            location: Location::Message("FOO".to_string()),
            token: "xyz".to_string(),
            reason: "not hexadecimal".to_string(),
        };
        assert_eq!(err.row(), None);
    }
}
