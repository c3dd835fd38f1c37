//! DBC Table Codec Library
//!
//! A stateless library for converting CAN databases between DBC files and a
//! flat table with one row per message or signal.
//!
//! # Architecture
//!
//! Two independent directions share one 16-column schema:
//! - The [`Flattener`] turns parsed messages into table rows
//! - The [`Composer`] turns table rows, read through a [`ColumnMapping`],
//!   back into DBC text
//!
//! The library does NOT:
//! - Read or write spreadsheet files
//! - Cover the full DBC grammar (value tables, multiplexing, attributes)
//!
//! File handling lives in the application layer (dbc-table-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use dbc_table_codec::{compose, flatten, parse_dbc_file, ColumnMapping, Field};
//! use std::path::Path;
//!
//! // DBC -> table
//! let messages = parse_dbc_file(Path::new("powertrain.dbc")).unwrap();
//! let rows = flatten(&messages).unwrap();
//!
//! // table -> DBC
//! let cells: Vec<_> = rows.iter().map(|row| row.to_cells(&Field::ALL)).collect();
//! let dbc_text = compose(&cells, &ColumnMapping::identity()).unwrap();
//! println!("{}", dbc_text);
//! ```

// Public modules
pub mod compose;
pub mod config;
pub mod dbc;
pub mod encoding;
pub mod flatten;
pub mod identifier;
pub mod schema;
pub mod types;

// Re-export main types for convenience
pub use compose::{compose, ComposeOptions, Composer};
pub use config::CodecConfig;
pub use dbc::{parse_dbc_file, parse_dbc_str};
pub use flatten::{flatten, Flattener};
pub use identifier::{CanIdKind, CanIdentifier, IdentifierRule, IdentifierSource};
pub use schema::{ColumnIndex, ColumnMapping, Field, RowKind, TabularRow, COLUMN_SLOTS};
pub use types::{ByteOrder, CanMessage, CanSignal, Cell, CodecError, Location, Result, ValueType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
