//! The catalog verification run: bootstrap, verify, finalize.

use crate::catalog::{NamespaceIdent, TABLE_NAME, TableIdent};
use crate::config::{EngineOptions, ExecutionMode, JobConfig};
use crate::engine::{CatalogEngine, SaveMode};
use crate::error::{EtlError, EtlErrorKind};
use crate::job::{FinalizePolicy, Job, JobError, JobErrorKind, JobRun, JobState};
use crate::records;

use std::future::Future;

/// Outcome of a successful run.
#[derive(Clone, Debug)]
pub struct VerifyReport {
    pub namespace: NamespaceIdent,
    pub table: TableIdent,
    pub rows_written: usize,
    pub rows_read: usize,
    pub job_run: JobRun,
}

struct Verified {
    namespace: NamespaceIdent,
    table: TableIdent,
    rows_written: usize,
    rows_read: usize,
}

/// Owns the engine and the job handle for the duration of one run.
#[derive(Debug)]
pub struct JobContext<E> {
    engine: E,
    job: Job,
    mode: ExecutionMode,
    policy: FinalizePolicy,
}

impl<E: CatalogEngine> JobContext<E> {
    pub fn new(engine: E, job: Job, mode: ExecutionMode, policy: FinalizePolicy) -> Self {
        JobContext { engine, job, mode, policy }
    }

    /// Resolves the invocation parameters, initializes the job and only then
    /// calls `connect` to acquire the engine.
    pub async fn bootstrap<F, Fut>(config: JobConfig, connect: F) -> Result<Self, EtlError>
    where
        F: FnOnce(String, EngineOptions) -> Fut,
        Fut: Future<Output = Result<E, EtlError>>,
    {
        let args = config.job_args()?;
        let job = Job::init(args);
        let engine = connect(config.remote, config.options).await?;

        tracing::info!(mode = ?config.mode, policy = ?config.policy, "Engine and job contexts initialized successfully.");

        Ok(JobContext::new(engine, job, config.mode, config.policy))
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Runs the verification and then finalizes the job, whatever the outcome.
    ///
    /// A verification error is returned after finalization. If finalization
    /// itself fails, that error wins and carries the verification error.
    pub async fn run(&mut self) -> Result<VerifyReport, EtlError> {
        if self.job.state() != JobState::Running {
            return Err(JobError::new(JobErrorKind::AlreadyFinalized {
                job_name: self.job.args().job_name.clone(),
                state: self.job.state(),
            })
            .into());
        }

        let outcome = self.verify().await;

        if let Err(err) = &outcome {
            tracing::error!(error = %err, "An error occurred during the ETL process");
        }

        let failure = outcome.as_ref().err().map(ToString::to_string);
        let finalized = self.job.finalize(self.policy, failure.as_deref());

        match (outcome, finalized) {
            (Ok(verified), Ok(job_run)) => Ok(VerifyReport {
                namespace: verified.namespace,
                table: verified.table,
                rows_written: verified.rows_written,
                rows_read: verified.rows_read,
                job_run,
            }),
            (Err(err), Ok(_)) => Err(err),
            (outcome, Err(source)) => {
                tracing::error!(error = %source, "Job finalization failed");
                Err(EtlError::new(EtlErrorKind::Finalize {
                    source,
                    verification: outcome.err().map(Box::new),
                }))
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(mode = ?self.mode))]
    async fn verify(&self) -> Result<Verified, EtlError> {
        let namespace = self.mode.namespace()?;
        let table = namespace.table(TABLE_NAME)?;

        tracing::info!(%namespace, "Attempting to create database");
        self.engine.ensure_namespace(&namespace).await?;
        self.engine.use_namespace(&namespace).await?;
        tracing::info!(%namespace, "Successfully created and switched to database");

        tracing::info!("Creating a sample DataFrame...");
        let rows = records::sample_rows();
        let batch = records::to_record_batch(&rows)?;
        println!("{}", records::pretty(std::slice::from_ref(&batch))?);

        tracing::info!(table = %table.name(), "Writing DataFrame to managed table");
        self.engine.write_table(&table, batch, SaveMode::Overwrite).await?;
        tracing::info!(%table, "Successfully wrote data");

        tracing::info!("Verifying data by reading from the metastore table...");
        let batches = self.engine.scan_table(&table).await?;
        println!("{}", records::pretty(&batches)?);

        let read = records::from_record_batches(&batches)?;
        if !records::same_rows(&rows, &read) {
            return Err(EtlError::new(EtlErrorKind::Verification {
                written: rows.len(),
                read: read.len(),
                missing: records::missing_rows(&rows, &read),
            }));
        }
        tracing::info!(rows = read.len(), "Verification successful!");

        Ok(Verified {
            namespace,
            table,
            rows_written: rows.len(),
            rows_read: read.len(),
        })
    }
}
