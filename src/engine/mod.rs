//! The seam between the verification workflow and whatever executes it.
//!
//! [`SparkSession`](crate::SparkSession) drives a remote Spark cluster;
//! [`InMemoryEngine`] keeps the catalog in process for dry runs.

mod memory;

pub use memory::InMemoryEngine;

use crate::catalog::{NamespaceIdent, TableIdent};
use crate::error::EtlError;
use crate::spark::write_operation;

use arrow::array::RecordBatch;

/// How a write treats an existing table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveMode {
    Append,
    Overwrite,
    #[default]
    ErrorIfExists,
    Ignore,
}

impl From<SaveMode> for write_operation::SaveMode {
    fn from(mode: SaveMode) -> Self {
        match mode {
            SaveMode::Append => write_operation::SaveMode::Append,
            SaveMode::Overwrite => write_operation::SaveMode::Overwrite,
            SaveMode::ErrorIfExists => write_operation::SaveMode::ErrorIfExists,
            SaveMode::Ignore => write_operation::SaveMode::Ignore,
        }
    }
}

/// Catalog and table operations used by the verification workflow.
///
/// Table references passed to [`write_table`](CatalogEngine::write_table) and
/// [`scan_table`](CatalogEngine::scan_table) are resolved by name against the
/// namespace selected with [`use_namespace`](CatalogEngine::use_namespace).
#[allow(async_fn_in_trait)]
pub trait CatalogEngine {
    /// Creates the namespace unless it already exists.
    async fn ensure_namespace(&self, namespace: &NamespaceIdent) -> Result<(), EtlError>;

    /// Makes `namespace` the target of unqualified table references.
    async fn use_namespace(&self, namespace: &NamespaceIdent) -> Result<(), EtlError>;

    async fn write_table(&self, table: &TableIdent, batch: RecordBatch, mode: SaveMode) -> Result<(), EtlError>;

    /// Full scan of the table.
    async fn scan_table(&self, table: &TableIdent) -> Result<Vec<RecordBatch>, EtlError>;
}
