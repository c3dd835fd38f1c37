//! Flattener: CAN database -> table rows
//!
//! Each message becomes one message-summary row followed by one signal-detail
//! row per signal. Signal rows repeat the parent message columns so every row
//! can be read on its own.

use crate::encoding::{data_type_token, join_comments, signal_comment};
use crate::identifier::{CanIdentifier, IdentifierRule, IdentifierSource};
use crate::schema::{Field, TabularRow};
use crate::types::{Cell, CanMessage, CanSignal, Result};

/// Converts parsed messages into rows of the shared schema
pub struct Flattener<S = IdentifierRule> {
    source: S,
}

impl Default for Flattener<IdentifierRule> {
    fn default() -> Self {
        Self::new(IdentifierRule::default())
    }
}

impl<S: IdentifierSource> Flattener<S> {
    /// Create a flattener using the given identifier source
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Flatten messages into rows, in message-then-signal order
    ///
    /// # Arguments
    /// * `messages` - Messages in database order
    ///
    /// # Returns
    /// * `Result<Vec<TabularRow>>` - Rows, or an error if a message identifier
    ///   cannot be derived
    pub fn flatten(&self, messages: &[CanMessage]) -> Result<Vec<TabularRow>> {
        let mut rows = Vec::new();

        for message in messages {
            let identifier = self.source.identify(message)?;
            log::debug!(
                "Flattening message {} ({} {}, {} signals)",
                message.name,
                identifier.kind,
                identifier.token,
                message.signals.len()
            );

            let summary = message_row(message, &identifier);
            let signal_rows: Vec<TabularRow> = message
                .signals
                .iter()
                .map(|signal| signal_row(&summary, signal))
                .collect();

            rows.push(summary);
            rows.extend(signal_rows);
        }

        log::info!(
            "Flattened {} messages into {} rows",
            messages.len(),
            rows.len()
        );

        Ok(rows)
    }
}

/// Flatten messages using identifiers from the parsed frame ids
pub fn flatten(messages: &[CanMessage]) -> Result<Vec<TabularRow>> {
    Flattener::<IdentifierRule>::default().flatten(messages)
}

/// Message-level columns, shared by the summary row and its signal rows
fn message_row(message: &CanMessage, identifier: &CanIdentifier) -> TabularRow {
    TabularRow::new()
        .with(Field::CanId, identifier.token.as_str())
        .with(Field::Decimal, i64::from(identifier.decimal))
        .with(Field::CanIdType, identifier.kind.as_str())
        .with(Field::MessageName, message.name.as_str())
        .with(Field::Dlc, message.dlc as i64)
        .with(Field::Comments, join_comments(&message.comments))
}

fn signal_row(message_row: &TabularRow, signal: &CanSignal) -> TabularRow {
    let optional = |value: Option<f64>| value.map(Cell::Float).unwrap_or_default();

    message_row
        .clone()
        .with(Field::SignalName, signal.name.as_str())
        .with(Field::StartBit, signal.start_bit as i64)
        .with(Field::Length, signal.length as i64)
        .with(Field::Unit, signal.unit.as_str())
        .with(
            Field::DataType,
            data_type_token(signal.value_type, signal.length),
        )
        .with(Field::Comments, signal_comment(signal.comments.as_deref()))
        .with(Field::Offset, signal.offset)
        .with(Field::Minimum, optional(signal.min))
        .with(Field::Maximum, optional(signal.max))
        .with(Field::Endianness, signal.byte_order.as_str())
        .with(Field::Scale, signal.factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::EXTENDED_FRAME_FLAG;
    use crate::schema::RowKind;
    use crate::types::{ByteOrder, CodecError, ValueType};

    fn rpm_signal() -> CanSignal {
        CanSignal {
            name: "RPM".to_string(),
            start_bit: 0,
            length: 16,
            value_type: ValueType::Unsigned,
            byte_order: ByteOrder::LittleEndian,
            unit: "rpm".to_string(),
            factor: 0.25,
            offset: 0.0,
            min: Some(0.0),
            max: Some(8000.0),
            comments: Some(vec!["Engine ".to_string(), "speed".to_string()]),
        }
    }

    fn temp_signal() -> CanSignal {
        CanSignal {
            name: "Temp".to_string(),
            start_bit: 16,
            length: 8,
            value_type: ValueType::Signed,
            byte_order: ByteOrder::BigEndian,
            unit: String::new(),
            factor: 1.0,
            offset: -40.0,
            min: None,
            max: None,
            comments: None,
        }
    }

    fn engine_message() -> CanMessage {
        CanMessage {
            frame_id: 0x100,
            name: "CAN_ENGINE_100".to_string(),
            dlc: 8,
            comments: vec!["Critical ".to_string(), "message".to_string()],
            signals: vec![rpm_signal(), temp_signal()],
        }
    }

    #[test]
    fn test_empty_database() {
        assert!(flatten(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_row_order_and_kinds() {
        let other = CanMessage {
            frame_id: 0x200,
            name: "CAN_BODY_200".to_string(),
            dlc: 2,
            comments: Vec::new(),
            signals: vec![temp_signal()],
        };
        let rows = flatten(&[engine_message(), other]).unwrap();

        let kinds: Vec<RowKind> = rows.iter().map(TabularRow::kind).collect();
        assert_eq!(
            kinds,
            vec![
                RowKind::MessageSummary,
                RowKind::SignalDetail,
                RowKind::SignalDetail,
                RowKind::MessageSummary,
                RowKind::SignalDetail,
            ]
        );
        assert_eq!(rows[1].get(Field::SignalName), Some(&Cell::from("RPM")));
        assert_eq!(rows[2].get(Field::SignalName), Some(&Cell::from("Temp")));
        assert_eq!(rows[4].get(Field::MessageName), Some(&Cell::from("CAN_BODY_200")));
    }

    #[test]
    fn test_message_summary_row() {
        let rows = flatten(&[engine_message()]).unwrap();
        let summary = &rows[0];

        assert_eq!(summary.get(Field::CanId), Some(&Cell::from("100")));
        assert_eq!(summary.get(Field::Decimal), Some(&Cell::Integer(256)));
        assert_eq!(summary.get(Field::CanIdType), Some(&Cell::from("Standard")));
        assert_eq!(summary.get(Field::Dlc), Some(&Cell::Integer(8)));
        assert_eq!(
            summary.get(Field::Comments),
            Some(&Cell::from("Critical message"))
        );
        for field in Field::SIGNAL_FIELDS {
            assert!(summary.is_blank(field), "{} should be empty", field);
        }
    }

    #[test]
    fn test_signal_rows_denormalize_message() {
        let rows = flatten(&[engine_message()]).unwrap();
        let rpm = &rows[1];

        assert_eq!(rpm.get(Field::Decimal), Some(&Cell::Integer(256)));
        assert_eq!(rpm.get(Field::MessageName), Some(&Cell::from("CAN_ENGINE_100")));
        assert_eq!(rpm.get(Field::DataType), Some(&Cell::from("unsigned 16")));
        assert_eq!(rpm.get(Field::Endianness), Some(&Cell::from("little_endian")));
        assert_eq!(rpm.get(Field::Scale), Some(&Cell::Float(0.25)));
        assert_eq!(rpm.get(Field::Maximum), Some(&Cell::Float(8000.0)));
        assert_eq!(rpm.get(Field::Comments), Some(&Cell::from("Engine speed")));
    }

    #[test]
    fn test_signal_comments_do_not_leak() {
        let rows = flatten(&[engine_message()]).unwrap();
        let temp = &rows[2];

        // Absent comment collection gets the placeholder, not the previous comment
        assert_eq!(temp.get(Field::Comments), Some(&Cell::from("None")));
        assert_eq!(temp.get(Field::DataType), Some(&Cell::from("signed 8")));
        assert_eq!(temp.get(Field::Endianness), Some(&Cell::from("big_endian")));
        assert!(temp.is_blank(Field::Minimum));
        assert!(temp.is_blank(Field::Maximum));
    }

    #[test]
    fn test_extended_frame() {
        let message = CanMessage {
            frame_id: EXTENDED_FRAME_FLAG | 0x18FF_1234,
            name: "J1939_Status".to_string(),
            dlc: 8,
            comments: Vec::new(),
            signals: Vec::new(),
        };
        let rows = flatten(&[message]).unwrap();

        assert_eq!(rows[0].get(Field::CanId), Some(&Cell::from("18FF1234")));
        assert_eq!(rows[0].get(Field::CanIdType), Some(&Cell::from("Extended")));
        assert_eq!(
            rows[0].get(Field::Decimal),
            Some(&Cell::Integer(0x98FF_1234))
        );
    }

    #[test]
    fn test_name_based_identifier() {
        let flattener = Flattener::new(IdentifierRule::legacy_name());
        let mut message = engine_message();
        // The name wins over the frame id with this rule
        message.frame_id = 0;
        let rows = flattener.flatten(&[message]).unwrap();
        assert_eq!(rows[0].get(Field::Decimal), Some(&Cell::Integer(256)));
    }

    #[test]
    fn test_unextractable_identifier() {
        let flattener = Flattener::new(IdentifierRule::legacy_name());
        let mut message = engine_message();
        message.name = "CAN_ENGINE".to_string();
        let err = flattener.flatten(&[message]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedIdentifier { .. }));
    }
}
