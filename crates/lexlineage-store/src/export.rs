//! Export the result set as JSON, Parquet, or CSV.
//!
//! JSON is the nested interchange form (groups with their members, plus
//! chains). Parquet and CSV carry the flattened member rows from
//! [`lexlineage_core::tabular`].

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use lexlineage_core::tabular::{group_rows, groups_from_rows};
use lexlineage_core::{AmendmentChain, StatuteGroup};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::StoreError;

/// Nested interchange document for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultExport {
    pub run_id: String,
    pub exported_at: DateTime<Utc>,
    pub groups: Vec<StatuteGroup>,
    #[serde(default)]
    pub chains: Vec<AmendmentChain>,
}

impl ResultExport {
    pub fn new(run_id: &str, groups: Vec<StatuteGroup>, chains: Vec<AmendmentChain>) -> Self {
        Self {
            run_id: run_id.to_string(),
            exported_at: Utc::now(),
            groups,
            chains,
        }
    }
}

pub fn write_json(path: &Path, export: &ResultExport) -> Result<(), StoreError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, export)?;
    info!(
        path = %path.display(),
        groups = export.groups.len(),
        chains = export.chains.len(),
        "wrote JSON export"
    );
    Ok(())
}

pub fn read_json(path: &Path) -> Result<ResultExport, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write one row per group member. Returns the row count.
pub fn write_parquet(path: &Path, groups: &[StatuteGroup]) -> Result<usize, StoreError> {
    let batch = group_rows(groups)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote Parquet export");
    Ok(batch.num_rows())
}

pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    if !path.exists() {
        return Err(StoreError::ParquetNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Read a member-row Parquet export back into nested groups.
pub fn read_groups_parquet(path: &Path) -> Result<Vec<StatuteGroup>, StoreError> {
    Ok(groups_from_rows(&read_parquet(path)?)?)
}

/// Write one row per group member as CSV with a header row.
pub fn write_csv(path: &Path, groups: &[StatuteGroup]) -> Result<usize, StoreError> {
    let batch = group_rows(groups)?;
    let file = BufWriter::new(File::create(path)?);
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(file);
    writer.write(&batch)?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote CSV export");
    Ok(batch.num_rows())
}
