//! File-level conversions
//!
//! Wraps the codec with file handling: deriving output paths, reading the
//! input and writing the result atomically (temporary sibling + rename).

use crate::config::{AppConfig, TableFormat};
use crate::table;
use anyhow::{Context, Result};
use dbc_table_codec::{parse_dbc_file, Composer, Flattener};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use tempfile::NamedTempFile;
use std::path::{Path, PathBuf};

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// DBC file -> table file
    ToTable(TableFormat),
    /// Table file -> DBC file
    ToDbc,
}

impl Direction {
    pub fn extension(&self) -> &'static str {
        match self {
            Direction::ToTable(format) => format.extension(),
            Direction::ToDbc => "dbc",
        }
    }
}

/// Destination for a converted file
///
/// Same stem as the input with the new extension, placed in `output_dir` when
/// given, otherwise next to the input.
pub fn output_path(input: &Path, output_dir: Option<&Path>, extension: &str) -> PathBuf {
    let file_name = input
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output"))
        .with_extension(extension);

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// Convert one file
///
/// # Arguments
/// * `input` - DBC or table file to read
/// * `output` - Explicit destination, derived from `input` when `None`
/// * `direction` - Which way to convert
/// * `config` - Application configuration
///
/// # Returns
/// * `Result<PathBuf>` - Path of the written file
pub fn convert_file(
    input: &Path,
    output: Option<&Path>,
    direction: Direction,
    config: &AppConfig,
) -> Result<PathBuf> {
    let destination = match output {
        Some(path) => path.to_path_buf(),
        None => output_path(
            input,
            config.output.output_dir.as_deref(),
            direction.extension(),
        ),
    };

    if destination == input {
        anyhow::bail!("Refusing to overwrite input file {:?}", input);
    }

    let contents = match direction {
        Direction::ToTable(format) => dbc_to_table(input, format, config)?,
        Direction::ToDbc => table_to_dbc(input, config)?.into_bytes(),
    };

    write_atomic(&destination, &contents)?;
    log::info!("Wrote {:?}", destination);

    Ok(destination)
}

/// Flatten a DBC file into table bytes
fn dbc_to_table(input: &Path, format: TableFormat, config: &AppConfig) -> Result<Vec<u8>> {
    let messages = parse_dbc_file(input)?;
    let rows = Flattener::new(config.codec.identifier.clone())
        .flatten(&messages)
        .with_context(|| format!("Failed to flatten {:?}", input))?;

    let mut buffer = Vec::new();
    match format {
        TableFormat::Csv => table::write_csv(&mut buffer, &rows, &config.table)?,
        TableFormat::Json => table::write_json(&mut buffer, &rows)?,
    }
    Ok(buffer)
}

/// Compose a CSV table file into DBC text
fn table_to_dbc(input: &Path, config: &AppConfig) -> Result<String> {
    let file = File::open(input).with_context(|| format!("Failed to open table {:?}", input))?;
    let rows = table::read_csv(BufReader::new(file), &config.table)
        .with_context(|| format!("Failed to read table {:?}", input))?;

    let mapping = config.codec.column_mapping()?;
    let composer = Composer::new(config.codec.compose_options());

    // Row numbers in errors count data rows from 0, header excluded
    let dbc = composer
        .compose(&rows, &mapping)
        .with_context(|| format!("Failed to compose {:?}", input))?;
    Ok(dbc)
}

/// Write a file in one step: uniquely named temporary sibling, then rename
/// over the target
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {:?}", parent))?;

    // Dropped (and removed) on any error before persist
    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
    temp.write_all(contents)
        .and_then(|_| temp.flush())
        .with_context(|| format!("Failed to write {:?}", path))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 256 CAN_ENGINE_100: 8 ECU1
 SG_ RPM : 0|16@1+ (0.25,0) [0|8000] "rpm" ECU1

CM_ SG_ 256 RPM "Engine speed";
"#;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("/data/net.dbc"), None, "csv"),
            PathBuf::from("/data/net.csv")
        );
        assert_eq!(
            output_path(Path::new("/data/net.csv"), Some(Path::new("/out")), "dbc"),
            PathBuf::from("/out/net.dbc")
        );
    }

    #[test]
    fn test_dbc_to_csv_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let dbc_path = dir.path().join("engine.dbc");
        fs::write(&dbc_path, DBC).unwrap();

        let config = AppConfig::default();
        let csv_path =
            convert_file(&dbc_path, None, Direction::ToTable(TableFormat::Csv), &config).unwrap();
        assert_eq!(csv_path, dir.path().join("engine.csv"));

        let out_path = dir.path().join("rebuilt.dbc");
        convert_file(&csv_path, Some(&out_path), Direction::ToDbc, &config).unwrap();

        let dbc = fs::read_to_string(&out_path).unwrap();
        assert!(dbc.contains("BO_ 256 CAN_ENGINE_100: 8 Vector__XXX"));
        assert!(dbc.contains(" SG_ RPM: 0|16@1+ (0.25,0) [0|8000] \"rpm\" Vector__XXX"));
        assert!(dbc.contains("CM_ SG_ 256 RPM \"Engine speed\";"));
        // Only the inputs and the two outputs, no temporaries left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_failed_composition_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("broken.csv");
        fs::write(
            &csv_path,
            "CAN ID,Decimal,CAN ID Type,Message Name,Signal Name,DLC,Start Bit,Length,Unit,Data Type,Comments,Offset,Minimum,Maximum,Endianness,Scale\n\
             100,256,Standard,ENGINE,RPM,8,0,16,rpm,float 32,,0,0,8000,little_endian,1\n",
        )
        .unwrap();

        let err = convert_file(&csv_path, None, Direction::ToDbc, &AppConfig::default())
            .unwrap_err();
        let codec_err = err.downcast_ref::<dbc_table_codec::CodecError>().unwrap();
        assert_eq!(codec_err.row(), Some(0));
        assert!(!dir.path().join("broken.dbc").exists());
    }

    #[test]
    fn test_refuses_to_overwrite_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.dbc");
        fs::write(&path, DBC).unwrap();

        let result = convert_file(&path, Some(&path), Direction::ToDbc, &AppConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_concurrent_writes_to_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.dbc");
        let b = dir.path().join("b.dbc");

        std::thread::scope(|scope| {
            for i in 0..8 {
                let target = if i % 2 == 0 { &a } else { &b };
                scope.spawn(move || {
                    write_atomic(target, format!("writer {}", i % 2).as_bytes()).unwrap()
                });
            }
        });

        assert_eq!(fs::read_to_string(&a).unwrap(), "writer 0");
        assert_eq!(fs::read_to_string(&b).unwrap(), "writer 1");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_write_atomic_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.csv");
        write_atomic(&target, b"CAN ID\n").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"CAN ID\n");
    }
}
