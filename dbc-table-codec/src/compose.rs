//! DBC Composer: table rows -> DBC text
//!
//! Rows are read through a column mapping and walked once, in order. Message
//! records (`BO_`/`SG_`) and comment records (`CM_`) are collected into
//! separate buffers and joined behind the fixed DBC header at the end. Any
//! error aborts the whole composition; no partial text is returned.
//!
//! Signal lines are written as `SG_ <name>: ...`, without a space before the
//! colon, which is the form downstream tools of this table format expect.
//! Stricter parsers such as `can-dbc` want `SG_ <name> : ...`, so composed
//! text is not read back by [`crate::parse_dbc_str`] unless that space is
//! inserted first.

use crate::encoding::{
    endian_flag, escape_comment, format_number, sign_flag, DEFAULT_UNIT,
};
use crate::identifier::CanIdentifier;
use crate::schema::{ColumnMapping, Field, TabularRow};
use crate::types::{Cell, CodecError, Location, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Symbols listed in the `NS_` block
pub const NS_SYMBOLS: &[&str] = &[
    "NS_DESC_",
    "CM_",
    "BA_DEF_",
    "BA_",
    "VAL_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "BA_DEF_DEF_",
    "EV_DATA_",
    "ENVVAR_DATA_",
    "SGTYPE_",
    "SGTYPE_VAL_",
    "BA_DEF_SGTYPE_",
    "BA_SGTYPE_",
    "SIG_TYPE_REF_",
    "VAL_TABLE_",
    "SIG_GROUP_",
    "SIG_VALTYPE_",
    "SIGTYPE_VALTYPE_",
    "BO_TX_BU_",
    "BA_DEF_REL_",
    "BA_REL_",
    "BA_DEF_DEF_REL_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
    "SG_MUL_VAL_",
];

/// Transmitter/receiver placeholder for records without a node
const NO_NODE: &str = "Vector__XXX";

/// Options for DBC composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOptions {
    /// Text of the `VERSION` header
    #[serde(default)]
    pub version: String,
}

impl ComposeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the `VERSION` header text
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Builds DBC text from table rows
#[derive(Debug, Clone, Default)]
pub struct Composer {
    options: ComposeOptions,
}

impl Composer {
    pub fn new(options: ComposeOptions) -> Self {
        Self { options }
    }

    /// Compose positional rows read from a spreadsheet
    ///
    /// # Arguments
    /// * `rows` - Rows in message-then-signal order, one cell per column
    /// * `mapping` - Which column holds which schema field
    ///
    /// # Returns
    /// * `Result<String>` - The complete DBC text, or the first error found
    pub fn compose(&self, rows: &[Vec<Cell>], mapping: &ColumnMapping) -> Result<String> {
        let columns = mapping.resolve();
        for field in [Field::MessageName, Field::SignalName] {
            if !columns.is_mapped(field) {
                log::warn!("Field '{}' is not mapped to any column", field);
            }
        }

        let rows: Vec<TabularRow> = rows.iter().map(|cells| columns.project(cells)).collect();
        self.compose_rows(&rows)
    }

    /// Compose rows that are already keyed by field
    pub fn compose_rows(&self, rows: &[TabularRow]) -> Result<String> {
        let mut state = CompositionState::default();

        for (index, row) in rows.iter().enumerate() {
            state.apply(&RowReader { index, row })?;
        }

        log::info!(
            "Composed {} messages and {} signals from {} rows",
            state.opened.len(),
            state.signal_count,
            rows.len()
        );

        Ok(self.assemble(&state))
    }

    /// Join the sections in the order the grammar requires
    fn assemble(&self, state: &CompositionState) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "VERSION \"{}\"\n\n\n",
            escape_comment(&self.options.version)
        ));

        out.push_str("NS_ :\n");
        for symbol in NS_SYMBOLS {
            out.push('\t');
            out.push_str(symbol);
            out.push('\n');
        }
        out.push('\n');

        out.push_str("BS_:\n\n");
        out.push_str("BU_:\n");

        out.push_str(&state.messages);
        out.push('\n');
        out.push('\n');
        out.push_str(&state.comments);

        out
    }
}

/// Compose positional rows with default options
pub fn compose(rows: &[Vec<Cell>], mapping: &ColumnMapping) -> Result<String> {
    Composer::default().compose(rows, mapping)
}

/// Accumulated output of one composition call
#[derive(Default)]
struct CompositionState {
    /// `BO_` records with their `SG_` lines
    messages: String,
    /// `CM_` records
    comments: String,
    /// Message names that already have a `BO_` record
    opened: HashSet<String>,
    /// Decimal id of the most recently opened record
    current: Option<u32>,
    signal_count: usize,
}

impl CompositionState {
    fn apply(&mut self, row: &RowReader<'_>) -> Result<()> {
        let decimal = row.decimal()?;

        if let Some(name) = row.text(Field::MessageName) {
            if !self.opened.contains(&name) {
                self.open_message(row, &name, decimal)?;
            }
        }

        // Rows without their own id belong to the open record
        let id = decimal.or(self.current);

        if let Some(signal) = row.text(Field::SignalName) {
            self.add_signal(row, &signal, id)
        } else if let Some(comment) = row.text(Field::Comments) {
            let id = id.ok_or_else(|| row.missing(Field::Decimal))?;
            self.comments.push_str(&format!(
                "CM_ BO_ {} \"{}\";\n",
                id,
                escape_comment(&comment)
            ));
            Ok(())
        } else {
            Ok(())
        }
    }

    fn open_message(&mut self, row: &RowReader<'_>, name: &str, decimal: Option<u32>) -> Result<()> {
        let id = decimal.ok_or_else(|| row.missing(Field::Decimal))?;
        let dlc = row.required_integer(Field::Dlc)?;

        log::debug!("Row {}: opening message {} ({})", row.index, name, id);
        self.messages.push_str(&format!(
            "\nBO_ {} {}: {} {}\n",
            id, name, dlc, NO_NODE
        ));
        self.opened.insert(name.to_string());
        self.current = Some(id);
        Ok(())
    }

    fn add_signal(&mut self, row: &RowReader<'_>, name: &str, id: Option<u32>) -> Result<()> {
        if self.current.is_none() {
            return Err(row.missing(Field::MessageName));
        }
        let id = id.ok_or_else(|| row.missing(Field::Decimal))?;

        let start_bit = row.required_integer(Field::StartBit)?;
        let length = row.required_integer(Field::Length)?;

        let data_type = row
            .text(Field::DataType)
            .ok_or_else(|| row.missing(Field::DataType))?;
        let sign = sign_flag(&data_type).ok_or_else(|| CodecError::UnrecognizedDataType {
            row: row.index,
            value: data_type.clone(),
        })?;
        let endian = row
            .text(Field::Endianness)
            .map(|value| endian_flag(&value))
            .unwrap_or('0');

        let scale = row.required_number(Field::Scale)?;
        let offset = row.required_number(Field::Offset)?;
        let min = row.number(Field::Minimum)?.unwrap_or(0.0);
        let max = row.number(Field::Maximum)?.unwrap_or(0.0);
        let unit = row
            .text(Field::Unit)
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());

        self.messages.push_str(&format!(
            " SG_ {}: {}|{}@{}{} ({},{}) [{}|{}] \"{}\" {}\n",
            name,
            start_bit,
            length,
            endian,
            sign,
            format_number(scale),
            format_number(offset),
            format_number(min),
            format_number(max),
            escape_comment(&unit),
            NO_NODE
        ));

        let comment = row.text(Field::Comments).unwrap_or_default();
        self.comments.push_str(&format!(
            "CM_ SG_ {} {} \"{}\";\n",
            id,
            name,
            escape_comment(&comment)
        ));

        self.signal_count += 1;
        Ok(())
    }
}

/// Typed access to the fields of one row, with errors naming the row
struct RowReader<'a> {
    index: usize,
    row: &'a TabularRow,
}

impl RowReader<'_> {
    fn missing(&self, field: Field) -> CodecError {
        CodecError::MissingRequiredField {
            row: self.index,
            field,
        }
    }

    fn not_numeric(&self, field: Field, cell: &Cell) -> CodecError {
        CodecError::NumericParseFailure {
            row: self.index,
            field,
            value: cell.to_string(),
        }
    }

    /// Trimmed text of a field, `None` when missing or blank
    fn text(&self, field: Field) -> Option<String> {
        self.row
            .value(field)
            .map(|cell| cell.to_string().trim().to_string())
    }

    /// Finite number, `None` when missing or blank
    fn number(&self, field: Field) -> Result<Option<f64>> {
        let Some(cell) = self.row.value(field) else {
            return Ok(None);
        };
        let value = match cell {
            Cell::Integer(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty => None,
        };
        match value {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(self.not_numeric(field, cell)),
        }
    }

    fn required_number(&self, field: Field) -> Result<f64> {
        self.number(field)?.ok_or_else(|| self.missing(field))
    }

    /// Non-negative integer; `16.0` is accepted as 16
    fn integer(&self, field: Field) -> Result<Option<u64>> {
        let Some(cell) = self.row.value(field) else {
            return Ok(None);
        };
        let value = match cell {
            Cell::Integer(v) => u64::try_from(*v).ok(),
            Cell::Text(s) => match s.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => s.trim().parse::<f64>().ok().and_then(whole_number),
            },
            Cell::Float(v) => whole_number(*v),
            Cell::Empty => None,
        };
        value.map(Some).ok_or_else(|| self.not_numeric(field, cell))
    }

    fn required_integer(&self, field: Field) -> Result<u64> {
        self.integer(field)?.ok_or_else(|| self.missing(field))
    }

    /// Decimal id of the row: the "Decimal" column, else derived from "CAN ID"
    fn decimal(&self) -> Result<Option<u32>> {
        if let Some(value) = self.integer(Field::Decimal)? {
            return u32::try_from(value).map(Some).map_err(|_| {
                self.not_numeric(Field::Decimal, &Cell::Integer(value as i64))
            });
        }

        match self.text(Field::CanId) {
            Some(token) => CanIdentifier::from_token(&token)
                .map(|id| Some(id.decimal))
                .map_err(|e| e.at(Location::Row(self.index))),
            None => Ok(None),
        }
    }
}

fn whole_number(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}
