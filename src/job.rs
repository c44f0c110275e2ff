//! Managed-job handle: invocation arguments, run tracking and finalization.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use std::error::Error;
use std::fmt;

use crate::config::{ConfigError, ConfigErrorKind};

#[derive(Debug)]
pub struct JobError {
    pub(crate) kind: JobErrorKind,
}

impl JobError {
    pub(crate) fn new(kind: JobErrorKind) -> Self {
        JobError { kind }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobError: {}", self.kind)
    }
}

impl Error for JobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum JobErrorKind {
    AlreadyFinalized { job_name: String, state: JobState },
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyFinalized { job_name, state } => write!(
                f, "Job '{job_name}' was already finalized as {state}"
            ),
        }
    }
}

impl Error for JobErrorKind {}

/// Resolved invocation parameters, `--JOB_NAME` and `--region` plus whatever
/// else the orchestrator passed along.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobArgs {
    pub job_name: String,
    pub region: String,
    pub extra: Vec<String>,
}

impl JobArgs {
    /// Both parameters are required; an empty value counts as missing.
    pub fn resolve(
        job_name: Option<String>,
        region: Option<String>,
        extra: Vec<String>,
    ) -> Result<JobArgs, ConfigError> {
        let required = |value: Option<String>, name: &'static str| {
            value
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::new(ConfigErrorKind::MissingArgument(name)))
        };

        Ok(JobArgs {
            job_name: required(job_name, "JOB_NAME")?,
            region: required(region, "region")?,
            extra,
        })
    }
}

/// What the finalizer does when the verification step failed.
///
/// A successful run is always committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FinalizePolicy {
    /// Commit the job even after a failure.
    #[default]
    Always,
    /// Abort the job after a failure.
    OnSuccess,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Committed,
    Aborted,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Committed => write!(f, "committed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Summary of a finalized run.
#[derive(Clone, Debug)]
pub struct JobRun {
    pub job_name: String,
    pub region: String,
    pub run_id: Uuid,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Job {
    args: JobArgs,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    state: JobState,
}

impl Job {
    pub fn init(args: JobArgs) -> Job {
        let job = Job {
            args,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: JobState::Running,
        };
        tracing::info!(
            job_name = %job.args.job_name,
            region = %job.args.region,
            run_id = %job.run_id,
            "Job initialized"
        );
        job
    }

    pub fn args(&self) -> &JobArgs {
        &self.args
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn commit(&mut self) -> Result<JobRun, JobError> {
        let run = self.finish(JobState::Committed)?;
        tracing::info!(run_id = %run.run_id, "Job committed successfully.");
        Ok(run)
    }

    pub fn abort(&mut self, reason: &str) -> Result<JobRun, JobError> {
        let run = self.finish(JobState::Aborted)?;
        tracing::warn!(run_id = %run.run_id, reason, "Job aborted");
        Ok(run)
    }

    /// Applies `policy` to the outcome of the run.
    pub fn finalize(&mut self, policy: FinalizePolicy, failure: Option<&str>) -> Result<JobRun, JobError> {
        match (policy, failure) {
            (FinalizePolicy::OnSuccess, Some(reason)) => self.abort(reason),
            _ => self.commit(),
        }
    }

    fn finish(&mut self, state: JobState) -> Result<JobRun, JobError> {
        if self.state != JobState::Running {
            return Err(JobError::new(JobErrorKind::AlreadyFinalized {
                job_name: self.args.job_name.clone(),
                state: self.state,
            }));
        }
        self.state = state;

        Ok(JobRun {
            job_name: self.args.job_name.clone(),
            region: self.args.region.clone(),
            run_id: self.run_id,
            state,
            started_at: self.started_at,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> JobArgs {
        JobArgs::resolve(Some("verify".to_string()), Some("eu-west-1".to_string()), vec![]).unwrap()
    }

    #[test]
    fn test_missing_arguments() {
        let err = JobArgs::resolve(Some("verify".to_string()), None, vec![]).unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::MissingArgument("region"));

        let err = JobArgs::resolve(Some("  ".to_string()), Some("eu-west-1".to_string()), vec![]).unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::MissingArgument("JOB_NAME"));
    }

    #[test]
    fn test_commit_once() {
        let mut job = Job::init(args());
        assert_eq!(job.state(), JobState::Running);

        let run = job.commit().unwrap();
        assert_eq!(run.state, JobState::Committed);
        assert_eq!(run.run_id, job.run_id());
        assert!(run.finished_at >= run.started_at);

        let err = job.commit().unwrap_err();
        assert_eq!(
            err.kind,
            JobErrorKind::AlreadyFinalized { job_name: "verify".to_string(), state: JobState::Committed }
        );
    }

    #[test]
    fn test_finalize_policies() {
        let mut job = Job::init(args());
        let run = job.finalize(FinalizePolicy::Always, Some("boom")).unwrap();
        assert_eq!(run.state, JobState::Committed);

        let mut job = Job::init(args());
        let run = job.finalize(FinalizePolicy::OnSuccess, Some("boom")).unwrap();
        assert_eq!(run.state, JobState::Aborted);

        let mut job = Job::init(args());
        let run = job.finalize(FinalizePolicy::OnSuccess, None).unwrap();
        assert_eq!(run.state, JobState::Committed);
    }
}
