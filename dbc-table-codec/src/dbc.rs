//! DBC file parser
//!
//! Parses Vector DBC files with the `can-dbc` crate and converts them into the
//! message model the flattener works on.

use crate::types::{ByteOrder, CanMessage, CanSignal, CodecError, Result, ValueType};
use std::path::Path;

/// Parse a DBC file and return its messages in file order
pub fn parse_dbc_file(path: &Path) -> Result<Vec<CanMessage>> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        CodecError::DbcParse(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Try UTF-8 first, then fallback to Latin-1/Windows-1252 encoding
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file {:?} is not UTF-8, trying Latin-1 encoding", path);
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let messages = parse_dbc_str(&dbc_content)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC text and return its messages in file order
pub fn parse_dbc_str(content: &str) -> Result<Vec<CanMessage>> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes())
        .map_err(|e| CodecError::DbcParse(format!("{:?}", e)))?;

    Ok(dbc
        .messages()
        .iter()
        .map(|dbc_msg| convert_message(&dbc, dbc_msg))
        .collect())
}

/// Convert a can-dbc message, pulling its comments from the `CM_` records
fn convert_message(dbc: &can_dbc::DBC, dbc_msg: &can_dbc::Message) -> CanMessage {
    let message_id = *dbc_msg.message_id();

    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| {
            let comment = dbc.signal_comment(message_id, dbc_sig.name());
            convert_signal(dbc_sig, comment)
        })
        .collect();

    CanMessage {
        frame_id: message_id.0,
        name: dbc_msg.message_name().to_string(),
        dlc: *dbc_msg.message_size(),
        comments: dbc
            .message_comment(message_id)
            .map(|c| vec![c.to_string()])
            .unwrap_or_default(),
        signals,
    }
}

fn convert_signal(dbc_sig: &can_dbc::Signal, comment: Option<&str>) -> CanSignal {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    CanSignal {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit(),
        length: *dbc_sig.signal_size(),
        value_type,
        byte_order,
        unit: dbc_sig.unit().to_string(),
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: Some(*dbc_sig.min()),
        max: Some(*dbc_sig.max()),
        comments: comment.map(|c| vec![c.to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENGINE_DBC: &str = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@0- (1,-40) [-40|215] "C" ECU2

BO_ 512 BatteryStatus: 8 ECU1
 SG_ BatteryVoltage : 0|16@1+ (0.01,0) [0|16] "V" ECU2

CM_ BO_ 291 "Engine state";
CM_ SG_ 291 EngineSpeed "Crankshaft speed";
"#;

    #[test]
    fn test_parse_simple_dbc() {
        let messages = parse_dbc_str(ENGINE_DBC).unwrap();
        assert_eq!(messages.len(), 2);

        let msg = &messages[0];
        assert_eq!(msg.frame_id, 291);
        assert_eq!(msg.name, "EngineData");
        assert_eq!(msg.dlc, 8);
        assert_eq!(msg.comments, vec!["Engine state".to_string()]);
        assert_eq!(msg.signals.len(), 2);

        let speed = &msg.signals[0];
        assert_eq!(speed.name, "EngineSpeed");
        assert_eq!(speed.start_bit, 0);
        assert_eq!(speed.length, 16);
        assert_eq!(speed.byte_order, ByteOrder::LittleEndian);
        assert_eq!(speed.value_type, ValueType::Unsigned);
        assert_eq!(speed.max, Some(8000.0));
        assert_eq!(speed.unit, "rpm");
        assert_eq!(speed.comments, Some(vec!["Crankshaft speed".to_string()]));

        let temp = &msg.signals[1];
        assert_eq!(temp.byte_order, ByteOrder::BigEndian);
        assert_eq!(temp.value_type, ValueType::Signed);
        assert_eq!(temp.offset, -40.0);
        assert_eq!(temp.comments, None);

        assert!(messages[1].comments.is_empty());
    }

    #[test]
    fn test_parse_dbc_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(ENGINE_DBC.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let messages = parse_dbc_file(temp_file.path()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].name, "BatteryStatus");
    }

    #[test]
    fn test_missing_file() {
        let err = parse_dbc_file(Path::new("/nonexistent/network.dbc")).unwrap_err();
        assert!(matches!(err, CodecError::DbcParse(_)));
    }
}
