//! Signal encoding helpers shared by the flattener and the composer
//!
//! Keeps the textual forms of data types, byte orders, comments and numbers in
//! one place so that a flattened table composes back into the same DBC tokens.

use crate::types::{ByteOrder, ValueType};

/// Written in place of a signal comment when the signal has none at all
pub const ABSENT_COMMENT: &str = "None";

/// Unit written when the unit cell is blank
pub const DEFAULT_UNIT: &str = "NA";

/// Combined "Data Type" column value, e.g. `unsigned 8`
pub fn data_type_token(value_type: ValueType, length: u64) -> String {
    format!("{} {}", value_type, length)
}

/// DBC sign flag for a "Data Type" value
///
/// `+` when the value mentions "unsigned", `-` when it mentions "signed",
/// `None` otherwise. Matching ignores case and surrounding whitespace.
pub fn sign_flag(data_type: &str) -> Option<char> {
    let data_type = data_type.trim().to_lowercase();
    if data_type.contains("unsigned") {
        Some('+')
    } else if data_type.contains("signed") {
        Some('-')
    } else {
        None
    }
}

/// DBC byte order flag for an "Endianness" value
///
/// `1` for little-endian (Intel), `0` for anything else.
pub fn endian_flag(endianness: &str) -> char {
    match endianness.trim().to_lowercase().as_str() {
        "little_endian" | "little-endian" | "little" | "intel" => '1',
        _ => '0',
    }
}

/// Flag for a parsed byte order, consistent with [`endian_flag`]
pub fn byte_order_flag(byte_order: ByteOrder) -> char {
    endian_flag(byte_order.as_str())
}

/// Concatenate comments in order, without separator
pub fn join_comments<S: AsRef<str>>(comments: &[S]) -> String {
    comments.iter().map(AsRef::as_ref).collect()
}

/// Comment cell of a signal; an absent collection becomes [`ABSENT_COMMENT`]
pub fn signal_comment(comments: Option<&[String]>) -> String {
    match comments {
        Some(comments) => join_comments(comments),
        None => ABSENT_COMMENT.to_string(),
    }
}

/// Escape a comment for embedding in a double-quoted DBC string
pub fn escape_comment(comment: &str) -> String {
    comment.replace('"', "\\\"")
}

/// Shortest decimal form of a number (`0.25`, `0`, `8000`, `-40`)
pub fn format_number(value: f64) -> String {
    // Display never uses exponent notation and drops a trailing ".0"
    if value == 0.0 {
        // Avoid "-0"
        return "0".to_string();
    }
    format!("{}", value)
}
