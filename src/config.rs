//! Execution mode, fixed engine options and the resolved job configuration.

use crate::catalog::{CatalogError, MANAGED_CATALOG, NAMESPACE_NAME, NamespaceIdent};
use crate::job::{FinalizePolicy, JobArgs};
use crate::client::DEFAULT_REMOTE;

use std::env;
use std::error::Error;
use std::fmt;

/// Environment variable selecting the execution mode.
pub const EXECUTION_MODE_VAR: &str = "GLUE_ENV";

pub const APP_NAME: &str = "LocalGlueJob";

#[derive(Debug)]
pub struct ConfigError {
    pub(crate) kind: ConfigErrorKind,
}

impl ConfigError {
    pub(crate) fn new(kind: ConfigErrorKind) -> Self {
        ConfigError { kind }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError: {}", self.kind)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ConfigErrorKind {
    MissingArgument(&'static str),
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument(name) => write!(f, "Required job argument '--{name}' was not supplied"),
        }
    }
}

impl Error for ConfigErrorKind {}

/// Where the job runs, which decides the catalog it targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Local container: the default (Hive) catalog.
    Local,
    /// Managed platform: the `glue_catalog` catalog.
    Managed,
}

impl ExecutionMode {
    /// Only the exact value `"local"` selects [`ExecutionMode::Local`].
    pub fn resolve(value: Option<&str>) -> ExecutionMode {
        match value {
            Some("local") => ExecutionMode::Local,
            _ => ExecutionMode::Managed,
        }
    }

    pub fn from_env() -> ExecutionMode {
        ExecutionMode::resolve(env::var(EXECUTION_MODE_VAR).ok().as_deref())
    }

    pub fn catalog(self) -> Option<&'static str> {
        match self {
            ExecutionMode::Local => None,
            ExecutionMode::Managed => Some(MANAGED_CATALOG),
        }
    }

    /// The job's namespace, qualified for this mode.
    pub fn namespace(self) -> Result<NamespaceIdent, CatalogError> {
        NamespaceIdent::new(self.catalog(), NAMESPACE_NAME)
    }
}

/// Static options handed to the engine session as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    pairs: Vec<(String, String)>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions::new(APP_NAME)
            .with("spark.sql.warehouse.dir", "file:///home/glue_user/spark-warehouse")
            .with("spark.hadoop.fs.s3a.endpoint", "http://localstack:4566")
            .with(
                "spark.hadoop.fs.s3a.aws.credentials.provider",
                "org.apache.hadoop.fs.s3a.SimpleAWSCredentialsProvider",
            )
            .with("spark.hadoop.fs.s3a.path.style.access", "true")
            .with(
                "javax.jdo.option.ConnectionURL",
                "jdbc:derby:;databaseName=/home/glue_user/metastore_db;create=true",
            )
            .with("spark.sql.catalogImplementation", "hive")
    }
}

impl EngineOptions {
    /// An empty option set carrying only the application name.
    pub fn new(app_name: &str) -> Self {
        EngineOptions { pairs: vec![] }.with("spark.app.name", app_name)
    }

    /// Adds `key`, replacing an earlier value in place.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        match self.pairs.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Everything the job binary collected before touching the engine.
///
/// `job_name` and `region` stay optional here; they are checked when the
/// job context is bootstrapped.
#[derive(Clone, Debug)]
pub struct JobConfig {
    pub job_name: Option<String>,
    pub region: Option<String>,
    pub extra: Vec<String>,
    pub mode: ExecutionMode,
    pub remote: String,
    pub policy: FinalizePolicy,
    pub options: EngineOptions,
}

impl JobConfig {
    /// Defaults for everything but the invocation parameters.
    pub fn new(job_name: Option<String>, region: Option<String>) -> Self {
        JobConfig {
            job_name,
            region,
            extra: vec![],
            mode: ExecutionMode::from_env(),
            remote: DEFAULT_REMOTE.to_string(),
            policy: FinalizePolicy::default(),
            options: EngineOptions::default(),
        }
    }

    pub fn job_args(&self) -> Result<JobArgs, ConfigError> {
        JobArgs::resolve(self.job_name.clone(), self.region.clone(), self.extra.clone())
    }
}
