use clap::{CommandFactory, Parser};
use spark_etl_verify::client::DEFAULT_REMOTE;
use spark_etl_verify::{
    EtlError, FinalizePolicy, InMemoryEngine, JobConfig, JobContext, SparkSessionBuilder, VerifyReport,
};

use std::error::Error;
use std::process::ExitCode;

const DEFAULT_LOGGING_CONFIG: &str = "info";
const VERBOSE_LOGGING_CONFIG: &str = "debug";

/// Creates a namespace and table in the metastore, writes a sample dataset
/// into it and reads it back.
///
/// The execution mode comes from `GLUE_ENV`: `local` targets the default
/// catalog, anything else the managed `glue_catalog`.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Name the job run is tracked under.
    #[arg(long = "JOB_NAME", value_name = "NAME")]
    job_name: Option<String>,

    /// Region of the managed platform.
    #[arg(long, value_name = "REGION")]
    region: Option<String>,

    /// Spark Connect connection string.
    #[arg(long, env = "SPARK_REMOTE", default_value = DEFAULT_REMOTE)]
    remote: String,

    /// What to do with the job handle when verification fails.
    #[arg(long, value_enum, default_value_t = FinalizePolicy::Always)]
    finalize: FinalizePolicy,

    /// Run against an in-process catalog instead of a Spark cluster.
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Additional arguments passed by the orchestrator.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    extra: Vec<String>,
}

impl Cli {
    /// Parses `args` the way the managed platform passes them: known flags may
    /// appear anywhere, interleaved with `--key value` pairs this binary does
    /// not declare. Those end up in `extra`.
    fn parse_job_args<I, T>(args: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Cli::try_parse_from(reorder_args(args))
    }
}

/// Moves every argument clap does not declare behind `--`, keeping known flags
/// together with their values in front.
fn reorder_args<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut command = Cli::command();
    command.build();

    let mut args = args.into_iter().map(Into::into);
    let mut known: Vec<String> = args.next().into_iter().collect();
    let mut extra = vec![];

    while let Some(arg) = args.next() {
        if arg == "--" {
            extra.extend(args.by_ref());
            break;
        }

        match declared_flag(&command, &arg) {
            Some(takes_value) => {
                let inline_value = arg.contains('=');
                known.push(arg);
                if takes_value && !inline_value {
                    known.extend(args.next());
                }
            }
            None => extra.push(arg),
        }
    }

    if !extra.is_empty() {
        known.push("--".to_string());
        known.extend(extra);
    }
    known
}

/// `Some(takes_value)` when `arg` names a declared flag.
fn declared_flag(command: &clap::Command, arg: &str) -> Option<bool> {
    if let Some(long) = arg.strip_prefix("--") {
        let name = long.split_once('=').map_or(long, |(name, _)| name);
        return command
            .get_arguments()
            .find(|declared| declared.get_long() == Some(name))
            .map(|declared| declared.get_action().takes_values());
    }

    let shorts = arg.strip_prefix('-').filter(|shorts| !shorts.is_empty())?;
    let mut takes_value = false;
    for short in shorts.chars() {
        let declared = command.get_arguments().find(|declared| declared.get_short() == Some(short))?;
        takes_value |= declared.get_action().takes_values();
    }
    Some(takes_value)
}

fn configure_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    // Use configuration from RUST_LOG env var if provided
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new(DEFAULT_LOGGING_CONFIG),
        _ => EnvFilter::new(VERBOSE_LOGGING_CONFIG),
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<VerifyReport, EtlError> {
    let mut config = JobConfig::new(cli.job_name, cli.region);
    config.extra = cli.extra;
    config.remote = cli.remote;
    config.policy = cli.finalize;

    if cli.dry_run {
        let mut context = JobContext::bootstrap(config, |_, _| async { Ok(InMemoryEngine::new()) }).await?;
        context.run().await
    } else {
        let mut context = JobContext::bootstrap(config, |remote, options| async move {
            SparkSessionBuilder::new(&remote).options(options).build().await
        })
        .await?;
        context.run().await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse_job_args(std::env::args()) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    configure_logging(cli.verbose);

    match run(cli).await {
        Ok(report) => {
            tracing::info!(
                table = %report.table,
                rows = report.rows_read,
                run_id = %report.job_run.run_id,
                state = %report.job_run.state,
                "Job finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let mut message = err.to_string();
            let mut source = err.source();
            while let Some(cause) = source {
                message.push_str(&format!("\n  caused by: {cause}"));
                source = cause.source();
            }
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glue_style_arguments() {
        let cli = Cli::parse_job_args([
            "spark-etl-verify",
            "--JOB_NAME",
            "verify",
            "--region",
            "eu-west-1",
            "--finalize",
            "on-success",
            "--job-bookmark-option",
            "job-bookmark-disable",
        ])
        .unwrap();

        assert_eq!(cli.job_name.as_deref(), Some("verify"));
        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        assert_eq!(cli.finalize, FinalizePolicy::OnSuccess);
        assert_eq!(cli.extra, vec!["--job-bookmark-option", "job-bookmark-disable"]);
    }

    #[test]
    fn test_orchestrator_flags_before_job_arguments() {
        let cli = Cli::parse_job_args([
            "spark-etl-verify",
            "--JOB_ID",
            "j_1",
            "--JOB_RUN_ID",
            "jr_1",
            "--JOB_NAME",
            "verify",
            "--TempDir",
            "s3://bucket/tmp",
            "--region=eu-west-1",
            "-vv",
            "--job-bookmark-option",
            "job-bookmark-disable",
        ])
        .unwrap();

        assert_eq!(cli.job_name.as_deref(), Some("verify"));
        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.extra,
            vec![
                "--JOB_ID",
                "j_1",
                "--JOB_RUN_ID",
                "jr_1",
                "--TempDir",
                "s3://bucket/tmp",
                "--job-bookmark-option",
                "job-bookmark-disable",
            ]
        );
    }

    #[test]
    fn test_explicit_separator_is_kept() {
        let cli = Cli::parse_job_args(["spark-etl-verify", "--region", "eu-west-1", "--", "--JOB_NAME", "verify"])
            .unwrap();

        assert_eq!(cli.job_name, None);
        assert_eq!(cli.extra, vec!["--JOB_NAME", "verify"]);
    }

    #[tokio::test]
    async fn test_dry_run_without_region_fails() {
        let cli = Cli::parse_job_args(["spark-etl-verify", "--JOB_ID", "j_1", "--JOB_NAME", "verify", "--dry-run"])
            .unwrap();

        let err = run(cli).await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_dry_run_succeeds() {
        let cli = Cli::parse_job_args([
            "spark-etl-verify",
            "--JOB_RUN_ID",
            "jr_1",
            "--JOB_NAME",
            "verify",
            "--region",
            "eu-west-1",
            "--dry-run",
        ])
        .unwrap();

        let report = run(cli).await.unwrap();
        assert_eq!(report.rows_read, 3);
    }
}
