//! volgrid — locate the volumes a correlation job needs and decide which
//! node reads each input stream.
//!
//! # Usage
//!
//! ```text
//! volgrid -m cluster.toml job1.input job2.input
//! ```

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use volgrid_cli::workflow::{self, JobOptions, JobStatus};
use volgrid_cli::{GetSlotCommand, ReportFormat};
use volgrid_core::ClusterDefinition;
use volgrid_discovery::{
    DEFAULT_GROUP, DEFAULT_PORT, DiscoverySettings, DnsResolver, MonotonicClock, MulticastTransport,
};
use volgrid_placement::FileAccess;

const EXIT_INTERRUPTED: u8 = 130;

/// Set on clusters where a whole group shares job directories.
const GROUP_ENV: &str = "VOLGRID_GROUP_ID";

#[derive(Parser)]
#[command(
    name = "volgrid",
    about = "Locate job volumes on the cluster and write the node assignment",
    version
)]
struct Cli {
    /// Job description files (`<name>.input`).
    #[arg(required = true)]
    jobs: Vec<PathBuf>,

    /// Cluster definition file.
    #[arg(short, long, env = "VOLGRID_MACHINES")]
    machines: Option<PathBuf>,

    /// Do not write the `.threads` file.
    #[arg(short = 'n', long)]
    no_threads: bool,

    /// Look up the library slot of missing modules with `getslot`.
    #[arg(short = 'd', long)]
    difxdb: bool,

    /// Increase log verbosity and list found modules (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Discovery report format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Multicast group of the discovery channel.
    #[arg(long, env = "VOLGRID_MESSAGE_GROUP", default_value_t = DEFAULT_GROUP)]
    group: Ipv4Addr,

    /// UDP port of the discovery channel.
    #[arg(long, env = "VOLGRID_MESSAGE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Discovery time budget in seconds.
    #[arg(long, hide = true, default_value_t = 5.0)]
    timeout: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("ERROR: cannot start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run_until_interrupted(&cli));
    // Reverse lookups still blocking in the pool must not delay exit.
    runtime.shutdown_background();
    code
}

async fn run_until_interrupted(cli: &Cli) -> ExitCode {
    tokio::select! {
        result = run(cli) => match result {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!(error = %e, "volgrid failed");
                eprintln!("ERROR: {e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// `Ok(false)` when at least one job was blocked or failed.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let machines = cli
        .machines
        .as_deref()
        .ok_or_else(|| anyhow!("no cluster definition: pass -m/--machines or set VOLGRID_MACHINES"))?;
    workflow::check_job_files(&cli.jobs)?;

    let cluster = workflow::load_cluster(machines)?;
    let head = workflow::local_host_name();
    workflow::check_head_node(&cluster, &head)?;

    let time_budget = Duration::try_from_secs_f64(cli.timeout)
        .map_err(|e| anyhow!("invalid --timeout {}: {e}", cli.timeout))?;
    let settings = DiscoverySettings::new(head.clone()).with_time_budget(time_budget);
    let access = if std::env::var_os(GROUP_ENV).is_some() {
        FileAccess::GroupWritable
    } else {
        FileAccess::OwnerWritable
    };
    let options = JobOptions {
        write_threads: !cli.no_threads,
        format: cli.format,
        show_found: cli.verbose >= 1,
        slot_lookup: cli.difxdb,
        access,
    };

    let mut all_written = true;
    for job in &cli.jobs {
        match process(job, &cluster, &head, &settings, options, cli).await {
            Ok(JobStatus::Written(_)) => info!(job = %job.display(), "job allocated"),
            Ok(JobStatus::Blocked(_)) => all_written = false,
            Err(e) => {
                error!(job = %job.display(), error = %e, "job failed");
                eprintln!("ERROR: {}: {e:#}", job.display());
                all_written = false;
            }
        }
    }
    Ok(all_written)
}

async fn process(
    job: &Path,
    cluster: &ClusterDefinition,
    head: &str,
    settings: &DiscoverySettings,
    options: JobOptions,
    cli: &Cli,
) -> anyhow::Result<JobStatus> {
    let plan = workflow::plan_job(job)?;
    let mut transport = MulticastTransport::bind(cli.group, cli.port)?;
    let clock = MonotonicClock::start();

    workflow::execute_job(
        &plan,
        cluster,
        head,
        &mut transport,
        &DnsResolver,
        &clock,
        &GetSlotCommand::default(),
        settings,
        options,
        &mut std::io::stdout(),
    )
    .await
}
