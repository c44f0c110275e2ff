use crate::catalog::{CatalogError, CatalogErrorKind, NamespaceIdent, TableIdent};
use crate::engine::{CatalogEngine, SaveMode};
use crate::error::EtlError;

use arrow::array::RecordBatch;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Catalog {
    namespaces: BTreeMap<NamespaceIdent, BTreeMap<String, Vec<RecordBatch>>>,
    current: Option<NamespaceIdent>,
}

impl Catalog {
    fn active(&mut self, table: &TableIdent) -> Result<&mut BTreeMap<String, Vec<RecordBatch>>, CatalogError> {
        let current = self.current.as_ref().ok_or_else(|| {
            CatalogError::new(CatalogErrorKind::NoActiveNamespace { table: table.name().to_string() })
        })?;

        self.namespaces
            .get_mut(current)
            .ok_or_else(|| CatalogError::new(CatalogErrorKind::NamespaceNotFound(current.to_string())))
    }
}

/// Catalog held in process memory.
///
/// Follows the engine's table semantics closely enough to run the whole job
/// without a cluster: namespaces are created on demand, tables resolve
/// against the selected namespace and writes honour [`SaveMode`].
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    catalog: Mutex<Catalog>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn namespaces(&self) -> Vec<NamespaceIdent> {
        self.lock().namespaces.keys().cloned().collect()
    }

    pub fn current_namespace(&self) -> Option<NamespaceIdent> {
        self.lock().current.clone()
    }

    /// Row count of `name` in `namespace`, if the table exists.
    pub fn row_count(&self, namespace: &NamespaceIdent, name: &str) -> Option<usize> {
        self.lock()
            .namespaces
            .get(namespace)
            .and_then(|tables| tables.get(name))
            .map(|batches| batches.iter().map(RecordBatch::num_rows).sum())
    }
}

impl CatalogEngine for InMemoryEngine {
    async fn ensure_namespace(&self, namespace: &NamespaceIdent) -> Result<(), EtlError> {
        self.lock().namespaces.entry(namespace.clone()).or_default();
        Ok(())
    }

    async fn use_namespace(&self, namespace: &NamespaceIdent) -> Result<(), EtlError> {
        let mut catalog = self.lock();
        if !catalog.namespaces.contains_key(namespace) {
            return Err(CatalogError::new(CatalogErrorKind::NamespaceNotFound(namespace.to_string())).into());
        }
        catalog.current = Some(namespace.clone());
        Ok(())
    }

    async fn write_table(&self, table: &TableIdent, batch: RecordBatch, mode: SaveMode) -> Result<(), EtlError> {
        let mut catalog = self.lock();
        let tables = catalog.active(table)?;

        match tables.get_mut(table.name()) {
            Some(existing) => match mode {
                SaveMode::Overwrite => *existing = vec![batch],
                SaveMode::Append => existing.push(batch),
                SaveMode::Ignore => {}
                SaveMode::ErrorIfExists => {
                    return Err(CatalogError::new(CatalogErrorKind::TableExists(table.to_string())).into());
                }
            },
            None => {
                tables.insert(table.name().to_string(), vec![batch]);
            }
        }
        Ok(())
    }

    async fn scan_table(&self, table: &TableIdent) -> Result<Vec<RecordBatch>, EtlError> {
        let mut catalog = self.lock();
        catalog
            .active(table)?
            .get(table.name())
            .cloned()
            .ok_or_else(|| CatalogError::new(CatalogErrorKind::TableNotFound(table.to_string())).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NAMESPACE_NAME, TABLE_NAME};
    use crate::error::EtlErrorKind;
    use crate::records;

    fn batch() -> RecordBatch {
        records::to_record_batch(&records::sample_rows()).unwrap()
    }

    fn catalog_kind(err: EtlError) -> CatalogErrorKind {
        match err.kind {
            EtlErrorKind::Catalog(err) => err.kind,
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_namespace_is_idempotent() {
        let engine = InMemoryEngine::new();
        let ns = NamespaceIdent::new(None, NAMESPACE_NAME).unwrap();

        engine.ensure_namespace(&ns).await.unwrap();
        engine.ensure_namespace(&ns).await.unwrap();
        engine.use_namespace(&ns).await.unwrap();

        assert_eq!(engine.namespaces(), vec![ns.clone()]);
        assert_eq!(engine.current_namespace(), Some(ns));
    }

    #[tokio::test]
    async fn test_use_unknown_namespace() {
        let engine = InMemoryEngine::new();
        let ns = NamespaceIdent::new(Some("glue_catalog"), "missing").unwrap();

        let kind = catalog_kind(engine.use_namespace(&ns).await.unwrap_err());
        assert_eq!(kind, CatalogErrorKind::NamespaceNotFound("glue_catalog.missing".to_string()));
    }

    #[tokio::test]
    async fn test_write_needs_active_namespace() {
        let engine = InMemoryEngine::new();
        let table = NamespaceIdent::new(None, NAMESPACE_NAME).unwrap().table(TABLE_NAME).unwrap();

        let kind = catalog_kind(engine.write_table(&table, batch(), SaveMode::Overwrite).await.unwrap_err());
        assert_eq!(kind, CatalogErrorKind::NoActiveNamespace { table: TABLE_NAME.to_string() });
    }

    #[tokio::test]
    async fn test_save_modes() {
        let engine = InMemoryEngine::new();
        let ns = NamespaceIdent::new(None, NAMESPACE_NAME).unwrap();
        let table = ns.table(TABLE_NAME).unwrap();
        engine.ensure_namespace(&ns).await.unwrap();
        engine.use_namespace(&ns).await.unwrap();

        engine.write_table(&table, batch(), SaveMode::ErrorIfExists).await.unwrap();
        engine.write_table(&table, batch(), SaveMode::Append).await.unwrap();
        assert_eq!(engine.row_count(&ns, TABLE_NAME), Some(6));

        engine.write_table(&table, batch(), SaveMode::Ignore).await.unwrap();
        assert_eq!(engine.row_count(&ns, TABLE_NAME), Some(6));

        engine.write_table(&table, batch(), SaveMode::Overwrite).await.unwrap();
        assert_eq!(engine.row_count(&ns, TABLE_NAME), Some(3));

        let kind = catalog_kind(engine.write_table(&table, batch(), SaveMode::ErrorIfExists).await.unwrap_err());
        assert_eq!(kind, CatalogErrorKind::TableExists("local_db.local_table".to_string()));
    }

    #[tokio::test]
    async fn test_scan_missing_table() {
        let engine = InMemoryEngine::new();
        let ns = NamespaceIdent::new(None, NAMESPACE_NAME).unwrap();
        engine.ensure_namespace(&ns).await.unwrap();
        engine.use_namespace(&ns).await.unwrap();

        let kind = catalog_kind(engine.scan_table(&ns.table("nope").unwrap()).await.unwrap_err());
        assert_eq!(kind, CatalogErrorKind::TableNotFound("local_db.nope".to_string()));
    }
}
