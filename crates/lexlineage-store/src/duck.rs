//! DuckDB analytics over exported member Parquet files.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use tracing::info;

use crate::StoreError;

const MEMBERS_TABLE: &str = "statute_members";

/// Summary row for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSize {
    pub group_id: String,
    pub base_name: String,
    pub jurisdiction: String,
    pub members: i64,
}

/// DuckDB store over the flattened `statute_members` table.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Load an exported member Parquet file into `statute_members`.
    pub fn load_members(&self, path: &Path) -> Result<(), StoreError> {
        if !path.exists() {
            return Err(StoreError::ParquetNotFound(path.to_path_buf()));
        }
        let sql = format!(
            "CREATE OR REPLACE TABLE {MEMBERS_TABLE} AS SELECT * FROM read_parquet('{}')",
            path.display().to_string().replace('\'', "''")
        );
        self.conn.execute_batch(&sql)?;
        let count = self.member_count()?;
        info!(count, "loaded statute_members table");
        Ok(())
    }

    /// Number of member rows loaded.
    pub fn member_count(&self) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT FROM {MEMBERS_TABLE}");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Member rows and distinct groups per jurisdiction, largest first.
    pub fn rows_per_jurisdiction(&self) -> Result<Vec<(String, i64, i64)>, StoreError> {
        let sql = format!(
            "SELECT jurisdiction, count(*)::BIGINT AS members, \
             count(DISTINCT group_id)::BIGINT AS group_count \
             FROM {MEMBERS_TABLE} GROUP BY jurisdiction ORDER BY members DESC, jurisdiction"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The `limit` groups with the most members.
    pub fn largest_groups(&self, limit: usize) -> Result<Vec<GroupSize>, StoreError> {
        let sql = format!(
            "SELECT group_id, base_name, jurisdiction, count(*)::BIGINT AS members \
             FROM {MEMBERS_TABLE} GROUP BY group_id, base_name, jurisdiction \
             ORDER BY members DESC, base_name LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(GroupSize {
                    group_id: row.get(0)?,
                    base_name: row.get(1)?,
                    jurisdiction: row.get(2)?,
                    members: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Member rows per grouping method (`oracle` / `fallback`).
    pub fn rows_per_method(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let sql = format!(
            "SELECT method, count(*)::BIGINT FROM {MEMBERS_TABLE} GROUP BY method ORDER BY method"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}
