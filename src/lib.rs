//! Catalog verification job for Spark, driven over Spark Connect.
//!
//! The job resolves its catalog from the execution mode, bootstraps an
//! engine session and a job handle, creates a namespace, overwrites a small
//! table in it, reads the table back and finalizes the job:
//!
//! ```no_run
//! use spark_etl_verify::{JobConfig, JobContext, SparkSessionBuilder};
//!
//! # async fn demo() -> Result<(), spark_etl_verify::EtlError> {
//! let config = JobConfig::new(Some("verify".into()), Some("eu-west-1".into()));
//!
//! let mut context = JobContext::bootstrap(config, |remote, options| async move {
//!     SparkSessionBuilder::new(&remote).options(options).build().await
//! })
//! .await?;
//!
//! let report = context.run().await?;
//! println!("{} rows verified in {}", report.rows_read, report.table);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod engine;
mod error;
mod io;
pub mod job;
pub mod records;
mod session;
mod workflow;

/// Spark Connect protocol messages and the generated gRPC client.
pub mod spark {
    tonic::include_proto!("spark.connect");
}

pub use catalog::{NamespaceIdent, TableIdent};
pub use config::{EngineOptions, ExecutionMode, JobConfig};
pub use engine::{CatalogEngine, InMemoryEngine, SaveMode};
pub use error::EtlError;
pub use job::{FinalizePolicy, Job, JobArgs, JobRun, JobState};
pub use session::{DataFrame, DataFrameWriter, SparkSession, SparkSessionBuilder};
pub use workflow::{JobContext, VerifyReport};
