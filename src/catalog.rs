//! Structured catalog identifiers.
//!
//! Namespace and table references are validated once at construction and
//! rendered through [`NamespaceIdent::qualified`] / [`TableIdent::qualified`],
//! so nothing downstream assembles SQL identifiers from raw strings.

use regex::Regex;

use std::error::Error;
use std::fmt;
use std::sync::LazyLock;

/// Catalog name used when the job runs against the managed metastore.
pub const MANAGED_CATALOG: &str = "glue_catalog";
/// Namespace created and verified by the job.
pub const NAMESPACE_NAME: &str = "local_db";
/// Table written and read back by the job.
pub const TABLE_NAME: &str = "local_table";

static IDENTIFIER_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

#[derive(Debug)]
pub struct CatalogError {
    pub(crate) kind: CatalogErrorKind,
}

impl CatalogError {
    pub(crate) fn new(kind: CatalogErrorKind) -> Self {
        CatalogError { kind }
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CatalogError: {}", self.kind)
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CatalogErrorKind {
    InvalidIdentifier(String),
    NamespaceNotFound(String),
    NoActiveNamespace { table: String },
    TableExists(String),
    TableNotFound(String),
}

impl fmt::Display for CatalogErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier(part) => write!(
                f, "'{part}' is not a valid identifier; use letters, digits and underscores"
            ),
            Self::NamespaceNotFound(namespace) => write!(f, "Namespace '{namespace}' does not exist"),
            Self::NoActiveNamespace { table } => write!(
                f, "Cannot resolve table '{table}': no namespace is selected"
            ),
            Self::TableExists(table) => write!(f, "Table '{table}' already exists"),
            Self::TableNotFound(table) => write!(f, "Table '{table}' does not exist"),
        }
    }
}

impl Error for CatalogErrorKind {}

fn validate(part: &str) -> Result<String, CatalogError> {
    if IDENTIFIER_PART.is_match(part) {
        Ok(part.to_string())
    } else {
        Err(CatalogError::new(CatalogErrorKind::InvalidIdentifier(part.to_string())))
    }
}

fn quote(part: &str) -> String {
    format!("`{}`", part.replace('`', "``"))
}

/// A namespace (database), optionally qualified by a catalog.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceIdent {
    catalog: Option<String>,
    name: String,
}

impl NamespaceIdent {
    pub fn new(catalog: Option<&str>, name: &str) -> Result<Self, CatalogError> {
        Ok(NamespaceIdent {
            catalog: catalog.map(validate).transpose()?,
            name: validate(name)?,
        })
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The catalog prefix as it appears in front of the namespace name:
    /// empty for the default catalog, `"<catalog>."` otherwise.
    pub fn prefix(&self) -> String {
        self.catalog
            .as_ref()
            .map(|catalog| format!("{catalog}."))
            .unwrap_or_default()
    }

    /// SQL rendering with every part back-quoted.
    pub fn qualified(&self) -> String {
        match &self.catalog {
            Some(catalog) => format!("{}.{}", quote(catalog), quote(&self.name)),
            None => quote(&self.name),
        }
    }

    pub fn table(&self, name: &str) -> Result<TableIdent, CatalogError> {
        Ok(TableIdent {
            namespace: self.clone(),
            name: validate(name)?,
        })
    }
}

impl fmt::Display for NamespaceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.name)
    }
}

/// A table inside a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdent {
    namespace: NamespaceIdent,
    name: String,
}

impl TableIdent {
    pub fn namespace(&self) -> &NamespaceIdent {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace.qualified(), quote(&self.name))
    }

    /// The bare table name, resolved by the engine against the active namespace.
    pub fn unqualified(&self) -> String {
        quote(&self.name)
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_namespace_rendering() {
        let ns = NamespaceIdent::new(Some(MANAGED_CATALOG), NAMESPACE_NAME).unwrap();

        assert_eq!(ns.prefix(), "glue_catalog.");
        assert_eq!(ns.to_string(), "glue_catalog.local_db");
        assert_eq!(ns.qualified(), "`glue_catalog`.`local_db`");
    }

    #[test]
    fn test_default_catalog_rendering() {
        let ns = NamespaceIdent::new(None, NAMESPACE_NAME).unwrap();
        let table = ns.table(TABLE_NAME).unwrap();

        assert_eq!(ns.prefix(), "");
        assert_eq!(table.to_string(), "local_db.local_table");
        assert_eq!(table.qualified(), "`local_db`.`local_table`");
        assert_eq!(table.unqualified(), "`local_table`");
    }

    #[test]
    fn test_rejects_injection_attempt() {
        let err = NamespaceIdent::new(None, "db; DROP TABLE x").unwrap_err();
        assert_eq!(
            err.kind,
            CatalogErrorKind::InvalidIdentifier("db; DROP TABLE x".to_string())
        );

        let ns = NamespaceIdent::new(None, "db").unwrap();
        assert!(ns.table("bad`name").is_err());
        assert!(NamespaceIdent::new(Some("1catalog"), "db").is_err());
    }
}
