//! CAN identifier rules
//!
//! A message is shown in the table with a textual identifier token (hex), its
//! decimal value and a Standard/Extended classification. The token is
//! obtained from the message through a pluggable [`IdentifierSource`]; the
//! token-to-decimal conversion is fixed and shared by both directions.

use crate::types::{CanMessage, CodecError, Location, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest decimal identifier of a standard (11-bit) frame
pub const STANDARD_ID_MAX: u32 = 2047;

/// Bit marking an extended frame in DBC-encoded identifiers
pub const EXTENDED_FRAME_FLAG: u32 = 0x8000_0000;

/// Mask of the 29 identifier bits of an extended frame
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Tokens with this many hex digits or more are extended identifiers
const EXTENDED_TOKEN_DIGITS: usize = 8;

/// CAN identifier classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanIdKind {
    /// 11-bit identifier
    Standard,
    /// 29-bit identifier
    Extended,
}

impl CanIdKind {
    /// Classify a decimal identifier value
    pub fn classify(decimal: u32) -> Self {
        if decimal <= STANDARD_ID_MAX {
            CanIdKind::Standard
        } else {
            CanIdKind::Extended
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CanIdKind::Standard => "Standard",
            CanIdKind::Extended => "Extended",
        }
    }
}

impl fmt::Display for CanIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message identifier in its table form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanIdentifier {
    /// Hex token as displayed in the "CAN ID" column
    pub token: String,
    /// Decimal value as written into `BO_` and `CM_` records
    pub decimal: u32,
    /// Standard or Extended
    pub kind: CanIdKind,
}

/// Why a token could not be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    pub token: String,
    pub reason: String,
}

impl TokenError {
    fn new(token: &str, reason: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach a location and turn into a codec error
    pub fn at(self, location: Location) -> CodecError {
        CodecError::MalformedIdentifier {
            location,
            token: self.token,
            reason: self.reason,
        }
    }
}

impl CanIdentifier {
    /// Convert a hex token into an identifier
    ///
    /// Tokens with 8 or more hex digits are extended identifiers: the leading
    /// digit gets 8 added to it (the extended-frame bit) before conversion.
    /// A leading digit that already has that bit set is left as is.
    pub fn from_token(token: &str) -> std::result::Result<Self, TokenError> {
        let trimmed = token.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(TokenError::new(token, "empty identifier"));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(TokenError::new(
                token,
                format!("'{}' is not a hexadecimal digit", bad),
            ));
        }

        let mut hex = digits.to_string();
        if digits.len() >= EXTENDED_TOKEN_DIGITS {
            // Checked above, every char is a hex digit
            let lead = digits
                .chars()
                .next()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| TokenError::new(token, "empty identifier"))?;
            if lead < 8 {
                hex = format!("{:X}{}", lead + 8, &digits[1..]);
            }
        }

        let decimal = u32::from_str_radix(&hex, 16)
            .map_err(|_| TokenError::new(token, "value does not fit in 32 bits"))?;

        Ok(Self {
            token: digits.to_string(),
            decimal,
            kind: CanIdKind::classify(decimal),
        })
    }

    /// Identifier of a frame id as stored by the DBC parser
    ///
    /// Extended ids carry [`EXTENDED_FRAME_FLAG`]; their token is the 29-bit
    /// id as 8 hex digits, which [`CanIdentifier::from_token`] maps back to
    /// the same decimal value.
    pub fn from_frame_id(frame_id: u32) -> Self {
        let token = if frame_id & EXTENDED_FRAME_FLAG != 0 {
            format!("{:08X}", frame_id & EXTENDED_ID_MASK)
        } else {
            format!("{:X}", frame_id)
        };

        Self {
            token,
            decimal: frame_id,
            kind: CanIdKind::classify(frame_id),
        }
    }
}

/// Produces the identifier token of a message
///
/// Different tools encode the identifier differently (some only in the
/// message name), so the extraction rule is supplied by the caller.
pub trait IdentifierSource {
    /// Token for the message, `None` if it cannot be determined
    fn token(&self, message: &CanMessage) -> Option<String>;

    /// Resolve the full identifier of a message
    fn identify(&self, message: &CanMessage) -> Result<CanIdentifier> {
        let location = || Location::Message(message.name.clone());
        let token = self.token(message).ok_or_else(|| CodecError::MalformedIdentifier {
            location: location(),
            token: String::new(),
            reason: "no identifier token could be extracted".to_string(),
        })?;
        CanIdentifier::from_token(&token).map_err(|e| e.at(location()))
    }
}

impl<F> IdentifierSource for F
where
    F: Fn(&CanMessage) -> Option<String>,
{
    fn token(&self, message: &CanMessage) -> Option<String> {
        self(message)
    }
}

/// Built-in identifier extraction rules
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum IdentifierRule {
    /// Use the frame id supplied by the DBC parser
    #[default]
    FrameId,

    /// Take one delimiter-separated segment of the message name
    NameSegment {
        delimiter: String,
        position: usize,
        /// Leading characters to drop from the segment (e.g. a "0x" prefix)
        #[serde(default)]
        skip: usize,
    },

    /// Choose between two rules by whether the name contains a marker
    NameMarker {
        marker: String,
        present: Box<IdentifierRule>,
        absent: Box<IdentifierRule>,
    },
}

impl IdentifierRule {
    pub fn name_segment(delimiter: impl Into<String>, position: usize, skip: usize) -> Self {
        IdentifierRule::NameSegment {
            delimiter: delimiter.into(),
            position,
            skip,
        }
    }

    /// Names like `CAN_ENGINE_100` carry the id in the third segment; other
    /// names like `MSGID_0x1A0_Status` carry it after a two-character prefix
    /// in the second.
    pub fn legacy_name() -> Self {
        IdentifierRule::NameMarker {
            marker: "CAN".to_string(),
            present: Box::new(Self::name_segment("_", 2, 0)),
            absent: Box::new(Self::name_segment("_", 1, 2)),
        }
    }
}

impl IdentifierSource for IdentifierRule {
    fn token(&self, message: &CanMessage) -> Option<String> {
        match self {
            IdentifierRule::FrameId => Some(CanIdentifier::from_frame_id(message.frame_id).token),
            IdentifierRule::NameSegment {
                delimiter,
                position,
                skip,
            } => {
                if delimiter.is_empty() {
                    return None;
                }
                let segment = message.name.split(delimiter.as_str()).nth(*position)?;
                let token: String = segment.chars().skip(*skip).collect();
                (!token.is_empty()).then_some(token)
            }
            IdentifierRule::NameMarker {
                marker,
                present,
                absent,
            } => {
                if message.name.contains(marker.as_str()) {
                    present.token(message)
                } else {
                    absent.token(message)
                }
            }
        }
    }

    fn identify(&self, message: &CanMessage) -> Result<CanIdentifier> {
        // Frame ids need no textual round trip
        if let IdentifierRule::FrameId = self {
            return Ok(CanIdentifier::from_frame_id(message.frame_id));
        }
        let location = || Location::Message(message.name.clone());
        let token = self.token(message).ok_or_else(|| CodecError::MalformedIdentifier {
            location: location(),
            token: message.name.clone(),
            reason: "no identifier token could be extracted from the message name".to_string(),
        })?;
        CanIdentifier::from_token(&token).map_err(|e| e.at(location()))
    }
}
