//! Writing baby ntuples to ROOT (oxyroot) or Parquet (arrow) files.

use super::{BabyColumns, Column};
use crate::utils::enums::OutputFormat;
use crate::{BabyError, BabyResult};
use arrow::array::{ArrayRef, BooleanArray, Float32Array, Int32Array, Int64Array, ListArray};
use arrow::datatypes::{Float32Type, Int32Type};
use arrow::record_batch::RecordBatch;
use oxyroot::{RootFile, WriterTree};
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Default number of rows per Parquet record batch.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 10_000;
/// Default name of the output tree.
pub const DEFAULT_OUTPUT_TREE: &str = "Events";
/// Name of the single-entry tree holding the job counters.
pub const METADATA_TREE: &str = "Metadata";

fn expand_output_path(file_path: &str) -> BabyResult<PathBuf> {
    Ok(PathBuf::from(&*shellexpand::full(file_path)?))
}

/// Event counts of one job, stored next to the output tree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct JobCounters {
    /// Entries found across all input files.
    pub n_input: u64,
    /// Entries visited by the event loop.
    pub n_processed: u64,
    /// Rows written to the output tree.
    pub n_output: u64,
}

impl JobCounters {
    fn entries(&self) -> [(&'static str, i64); 3] {
        [
            ("nevents_input", self.n_input as i64),
            ("nevents_processed", self.n_processed as i64),
            ("nevents_output", self.n_output as i64),
        ]
    }
}

/// Options for writing a baby ntuple.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Number of rows in each Parquet record batch.
    pub batch_size: usize,
    /// Output tree name for ROOT files.
    pub tree: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_WRITE_BATCH_SIZE,
            tree: DEFAULT_OUTPUT_TREE.to_string(),
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the batch size used for Parquet output; defaults to 10_000.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the ROOT tree name (defaults to "Events").
    pub fn tree<S: Into<String>>(mut self, name: S) -> Self {
        self.tree = name.into();
        self
    }
}

/// Write `columns` and the job counters to `file_path`, choosing the format from the extension.
pub fn write_baby(
    columns: BabyColumns,
    counters: &JobCounters,
    file_path: &str,
    options: &WriteOptions,
) -> BabyResult<()> {
    let path = expand_output_path(file_path)?;
    let n_rows = columns.n_rows();
    match OutputFormat::from_path(&path) {
        OutputFormat::Root => write_root(columns, counters, &path, options)?,
        OutputFormat::Parquet => write_parquet(columns, counters, &path, options)?,
    }
    info!(path = %path.display(), rows = n_rows, "wrote output");
    Ok(())
}

fn write_root(
    columns: BabyColumns,
    counters: &JobCounters,
    file_path: &Path,
    options: &WriteOptions,
) -> BabyResult<()> {
    let mut file = RootFile::create(file_path).map_err(|err| {
        BabyError::Custom(format!(
            "Failed to create ROOT file '{}': {err}",
            file_path.display()
        ))
    })?;

    let mut tree = WriterTree::new(options.tree.as_str());
    for (name, column) in columns.into_columns() {
        match column {
            Column::F32(values) => tree.new_branch(name, values.into_iter()),
            Column::I32(values) => tree.new_branch(name, values.into_iter()),
            Column::I64(values) => tree.new_branch(name, values.into_iter()),
            Column::Bool(values) => tree.new_branch(name, values.into_iter()),
            Column::VecF32(values) => tree.new_branch(name, values.into_iter()),
            Column::VecI32(values) => tree.new_branch(name, values.into_iter()),
        }
    }
    tree.write(&mut file).map_err(|err| {
        BabyError::Custom(format!(
            "Failed to write ROOT tree '{}' to '{}': {err}",
            options.tree,
            file_path.display()
        ))
    })?;

    let mut metadata = WriterTree::new(METADATA_TREE);
    for (name, value) in counters.entries() {
        metadata.new_branch(name, std::iter::once(value));
    }
    metadata.write(&mut file).map_err(|err| {
        BabyError::Custom(format!(
            "Failed to write ROOT tree '{METADATA_TREE}' to '{}': {err}",
            file_path.display()
        ))
    })?;

    file.close().map_err(|err| {
        BabyError::Custom(format!(
            "Failed to close ROOT file '{}': {err}",
            file_path.display()
        ))
    })?;
    Ok(())
}

fn column_to_array(column: Column) -> ArrayRef {
    match column {
        Column::F32(values) => Arc::new(Float32Array::from(values)),
        Column::I32(values) => Arc::new(Int32Array::from(values)),
        Column::I64(values) => Arc::new(Int64Array::from(values)),
        Column::Bool(values) => Arc::new(BooleanArray::from(values)),
        Column::VecF32(values) => Arc::new(ListArray::from_iter_primitive::<Float32Type, _, _>(
            values
                .into_iter()
                .map(|row| Some(row.into_iter().map(Some).collect::<Vec<_>>())),
        )),
        Column::VecI32(values) => Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(
            values
                .into_iter()
                .map(|row| Some(row.into_iter().map(Some).collect::<Vec<_>>())),
        )),
    }
}

fn write_parquet(
    columns: BabyColumns,
    counters: &JobCounters,
    file_path: &Path,
    options: &WriteOptions,
) -> BabyResult<()> {
    let batch_size = options.batch_size.max(1);
    let n_rows = columns.n_rows();
    let batch = RecordBatch::try_from_iter(
        columns
            .into_columns()
            .map(|(name, column)| (name, column_to_array(column))),
    )
    .map_err(|err| BabyError::Custom(format!("Failed to build Parquet batch: {err}")))?;

    let metadata = counters
        .entries()
        .iter()
        .map(|(name, value)| KeyValue::new(name.to_string(), value.to_string()))
        .collect();
    let properties = WriterProperties::builder()
        .set_key_value_metadata(Some(metadata))
        .build();
    let file = File::create(file_path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties))
        .map_err(|err| BabyError::Custom(format!("Failed to create Parquet writer: {err}")))?;

    let mut start = 0usize;
    while start < n_rows {
        let end = (start + batch_size).min(n_rows);
        writer
            .write(&batch.slice(start, end - start))
            .map_err(|err| BabyError::Custom(format!("Failed to write Parquet batch: {err}")))?;
        start = end;
    }

    writer
        .close()
        .map_err(|err| BabyError::Custom(format!("Failed to finalise Parquet file: {err}")))?;
    Ok(())
}
