//! Codec configuration types
//!
//! Everything a caller can tune about the conversion: how message identifiers
//! are extracted, the `VERSION` header of composed files, and which spreadsheet
//! column holds which field.

use crate::compose::ComposeOptions;
use crate::identifier::IdentifierRule;
use crate::schema::ColumnMapping;
use crate::types::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for both conversion directions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// How the "CAN ID" token is obtained when flattening
    #[serde(default)]
    pub identifier: IdentifierRule,

    /// Text of the `VERSION` header of composed DBC files
    #[serde(default)]
    pub version: String,

    /// Column slot -> field name; identity mapping when absent
    ///
    /// Slots are keyed by their number written as text, since TOML tables
    /// only have string keys.
    #[serde(default)]
    pub mapping: Option<BTreeMap<String, String>>,
}

impl CodecConfig {
    /// Create a new codec configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the identifier extraction rule
    pub fn with_identifier_rule(mut self, rule: IdentifierRule) -> Self {
        self.identifier = rule;
        self
    }

    /// Builder method: set the `VERSION` header text
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Builder method: map a column slot to a field name ("none" unmaps it)
    pub fn with_mapping(mut self, slot: usize, field: impl Into<String>) -> Self {
        self.mapping
            .get_or_insert_with(BTreeMap::new)
            .insert(slot.to_string(), field.into());
        self
    }

    /// Resolve the configured column mapping
    pub fn column_mapping(&self) -> Result<ColumnMapping> {
        match &self.mapping {
            Some(pairs) => {
                let mut slots = Vec::with_capacity(pairs.len());
                for (slot, name) in pairs {
                    let slot = slot.trim().parse::<usize>().map_err(|_| {
                        CodecError::InvalidMapping(format!("'{}' is not a column slot", slot))
                    })?;
                    slots.push((slot, name.as_str()));
                }
                ColumnMapping::from_pairs(slots)
            }
            None => Ok(ColumnMapping::identity()),
        }
    }

    /// Composer options derived from this configuration
    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions::new().with_version(self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_codec_config_builder() {
        let config = CodecConfig::new()
            .with_identifier_rule(IdentifierRule::legacy_name())
            .with_version("2.0")
            .with_mapping(0, "Message Name")
            .with_mapping(1, "none");

        assert_eq!(config.identifier, IdentifierRule::legacy_name());
        assert_eq!(config.compose_options().version, "2.0");

        let mapping = config.column_mapping().unwrap();
        assert_eq!(mapping.field_at(0), Some(Field::MessageName));
        assert_eq!(mapping.field_at(1), None);
        assert_eq!(mapping.field_at(2), None);
    }

    #[test]
    fn test_default_mapping_is_identity() {
        let config = CodecConfig::new();
        assert_eq!(config.column_mapping().unwrap(), ColumnMapping::identity());
        assert_eq!(config.identifier, IdentifierRule::FrameId);
    }

    #[test]
    fn test_bad_mapping_is_reported() {
        let config = CodecConfig::new().with_mapping(3, "Frequency");
        assert!(config.column_mapping().is_err());

        let mut config = CodecConfig::new();
        config
            .mapping
            .get_or_insert_with(BTreeMap::new)
            .insert("first".to_string(), "Scale".to_string());
        assert!(matches!(
            config.column_mapping(),
            Err(CodecError::InvalidMapping(_))
        ));
    }
}
