//! Shared tabular schema
//!
//! Both conversion directions speak the same fixed set of 16 columns. Rows
//! produced by the flattener are keyed by [`Field`]; rows read back from a
//! spreadsheet are positional and are projected onto fields through a
//! [`ColumnMapping`] resolved once per composition.

use crate::types::{Cell, CodecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of column slots a mapping can assign
pub const COLUMN_SLOTS: usize = 16;

/// A column of the shared schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    CanId,
    Decimal,
    CanIdType,
    MessageName,
    SignalName,
    Dlc,
    StartBit,
    Length,
    Unit,
    DataType,
    Comments,
    Offset,
    Minimum,
    Maximum,
    Endianness,
    Scale,
}

impl Field {
    /// All fields in canonical column order
    pub const ALL: [Field; COLUMN_SLOTS] = [
        Field::CanId,
        Field::Decimal,
        Field::CanIdType,
        Field::MessageName,
        Field::SignalName,
        Field::Dlc,
        Field::StartBit,
        Field::Length,
        Field::Unit,
        Field::DataType,
        Field::Comments,
        Field::Offset,
        Field::Minimum,
        Field::Maximum,
        Field::Endianness,
        Field::Scale,
    ];

    /// Fields that only carry a value on signal-detail rows
    pub const SIGNAL_FIELDS: [Field; 10] = [
        Field::SignalName,
        Field::StartBit,
        Field::Length,
        Field::Unit,
        Field::DataType,
        Field::Offset,
        Field::Minimum,
        Field::Maximum,
        Field::Endianness,
        Field::Scale,
    ];

    /// Column header as it appears in the table
    pub fn header(&self) -> &'static str {
        match self {
            Field::CanId => "CAN ID",
            Field::Decimal => "Decimal",
            Field::CanIdType => "CAN ID Type",
            Field::MessageName => "Message Name",
            Field::SignalName => "Signal Name",
            Field::Dlc => "DLC",
            Field::StartBit => "Start Bit",
            Field::Length => "Length",
            Field::Unit => "Unit",
            Field::DataType => "Data Type",
            Field::Comments => "Comments",
            Field::Offset => "Offset",
            Field::Minimum => "Minimum",
            Field::Maximum => "Maximum",
            Field::Endianness => "Endianness",
            Field::Scale => "Scale",
        }
    }

    /// Header row in canonical order
    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(Field::header).collect()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Header names compare without case or whitespace, so "CANID Type" and
/// "can id type" both resolve to [`Field::CanIdType`].
fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Field {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_header(s);
        Field::ALL
            .iter()
            .copied()
            .find(|field| normalize_header(field.header()) == wanted)
            .ok_or_else(|| CodecError::InvalidMapping(format!("unknown field name '{}'", s)))
    }
}

/// What a row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Message-level row, no signal fields populated
    MessageSummary,
    /// One signal, with the parent message fields repeated
    SignalDetail,
}

/// One table row as a typed mapping from field to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    values: BTreeMap<Field, Cell>,
}

impl TabularRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a field, `None` when the field is absent
    pub fn get(&self, field: Field) -> Option<&Cell> {
        self.values.get(&field)
    }

    /// Value of a field unless it is absent or blank
    pub fn value(&self, field: Field) -> Option<&Cell> {
        self.get(field).filter(|cell| !cell.is_blank())
    }

    pub fn set(&mut self, field: Field, value: impl Into<Cell>) {
        self.values.insert(field, value.into());
    }

    /// Builder form of [`TabularRow::set`]
    pub fn with(mut self, field: Field, value: impl Into<Cell>) -> Self {
        self.set(field, value);
        self
    }

    /// True if the field is absent or blank
    pub fn is_blank(&self, field: Field) -> bool {
        self.value(field).is_none()
    }

    /// Classify the row by whether it names a signal
    pub fn kind(&self) -> RowKind {
        if self.is_blank(Field::SignalName) {
            RowKind::MessageSummary
        } else {
            RowKind::SignalDetail
        }
    }

    /// Lay the row out positionally in the given column order
    pub fn to_cells(&self, order: &[Field]) -> Vec<Cell> {
        order
            .iter()
            .map(|field| self.get(*field).cloned().unwrap_or_default())
            .collect()
    }

    /// Iterate over populated fields in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &Cell)> {
        self.values.iter().map(|(field, cell)| (*field, cell))
    }
}

/// Assignment of spreadsheet column slots to schema fields
///
/// Slots are 0-based and limited to [`COLUMN_SLOTS`]. Any slot may be left
/// unmapped; fields without a slot read as missing for every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    slots: [Option<Field>; COLUMN_SLOTS],
}

impl ColumnMapping {
    /// An empty mapping (every slot unmapped)
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot `i` mapped to the `i`-th field of the canonical order
    pub fn identity() -> Self {
        let mut mapping = Self::new();
        for (slot, field) in Field::ALL.iter().enumerate() {
            mapping.slots[slot] = Some(*field);
        }
        mapping
    }

    /// Build a mapping from slot/field-name pairs
    ///
    /// A field name of "none" (or an empty name) leaves the slot unmapped.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new();
        for (slot, name) in pairs {
            let name = name.as_ref().trim();
            if name.is_empty() || name.eq_ignore_ascii_case("none") {
                mapping.unassign(slot)?;
            } else {
                mapping.assign(slot, name.parse()?)?;
            }
        }
        Ok(mapping)
    }

    /// Map a slot to a field
    pub fn assign(&mut self, slot: usize, field: Field) -> Result<()> {
        *self.slot_mut(slot)? = Some(field);
        Ok(())
    }

    /// Leave a slot unmapped
    pub fn unassign(&mut self, slot: usize) -> Result<()> {
        *self.slot_mut(slot)? = None;
        Ok(())
    }

    /// Field mapped to a slot
    pub fn field_at(&self, slot: usize) -> Option<Field> {
        self.slots.get(slot).copied().flatten()
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut Option<Field>> {
        self.slots.get_mut(slot).ok_or_else(|| {
            CodecError::InvalidMapping(format!(
                "column slot {} is out of range (0-{})",
                slot,
                COLUMN_SLOTS - 1
            ))
        })
    }

    /// Resolve into a field -> column lookup
    pub fn resolve(&self) -> ColumnIndex {
        let mut columns = [None; COLUMN_SLOTS];
        for (slot, field) in self.slots.iter().enumerate() {
            let Some(field) = field else { continue };
            let entry = &mut columns[*field as usize];
            if let Some(existing) = *entry {
                log::warn!(
                    "Field '{}' is mapped to columns {} and {}; using column {}",
                    field,
                    existing,
                    slot,
                    existing
                );
            } else {
                *entry = Some(slot);
            }
        }
        ColumnIndex { columns }
    }
}

/// Resolved field -> column lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    columns: [Option<usize>; COLUMN_SLOTS],
}

impl ColumnIndex {
    /// Column holding a field, `None` when the field is unmapped
    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns[field as usize]
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.column(field).is_some()
    }

    /// Read a positional row into a typed row
    ///
    /// Unmapped fields and columns past the end of the row are left out.
    pub fn project(&self, cells: &[Cell]) -> TabularRow {
        let mut row = TabularRow::new();
        for field in Field::ALL {
            if let Some(cell) = self.column(field).and_then(|col| cells.get(col)) {
                row.set(field, cell.clone());
            }
        }
        row
    }
}
