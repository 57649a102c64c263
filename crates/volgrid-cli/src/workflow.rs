//! One `volgrid` run: gates, then discover-and-place for each job file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use volgrid_core::{
    ClusterDefinition, InputStream, JobDescription, JobPaths, MIN_TOPOLOGY_VERSION, RequiredSet,
    Topology, ensure_head_node,
};
use volgrid_discovery::protocol::short_hostname;
use volgrid_discovery::{Clock, DiscoveryOutcome, DiscoverySettings, HostResolver, Transport, discover};
use volgrid_placement::{FileAccess, NodeAssignment, allocate, write_job_outputs};

use crate::report::{ReportContext, ReportFormat, render};
use crate::slots::{SlotLocator, locate_missing};

/// Per-run switches shared by every job.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub write_threads: bool,
    pub format: ReportFormat,
    /// List located volumes in text reports, not only problems.
    pub show_found: bool,
    /// Ask the module database where missing volumes are shelved.
    pub slot_lookup: bool,
    pub access: FileAccess,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            write_threads: true,
            format: ReportFormat::Text,
            show_found: false,
            slot_lookup: false,
            access: FileAccess::OwnerWritable,
        }
    }
}

/// A parsed job, ready for discovery.
#[derive(Debug)]
pub struct JobPlan {
    pub paths: JobPaths,
    pub streams: Vec<InputStream>,
    pub required: RequiredSet,
}

#[derive(Debug)]
pub enum JobStatus {
    /// Output files were written.
    Written(NodeAssignment),
    /// Discovery found problems; the report lists them and nothing was written.
    Blocked(DiscoveryOutcome),
}

/// Load the cluster definition and reject versions older than supported.
pub fn load_cluster(path: &Path) -> Result<ClusterDefinition> {
    let cluster = ClusterDefinition::from_file(path)?;
    cluster.version().ensure_at_least(MIN_TOPOLOGY_VERSION)?;
    info!(
        path = %path.display(),
        version = %cluster.version(),
        nodes = cluster.nodes.len(),
        "cluster definition loaded"
    );
    Ok(cluster)
}

/// Short name of the local machine.
pub fn local_host_name() -> String {
    let name = gethostname::gethostname();
    short_hostname(&name.to_string_lossy()).to_string()
}

/// The local machine must be a head node of the cluster.
pub fn check_head_node(topology: &impl Topology, host: &str) -> Result<()> {
    ensure_head_node(topology, host)?;
    Ok(())
}

/// Every job file must exist before any of them is processed.
pub fn check_job_files(jobs: &[PathBuf]) -> Result<()> {
    let absent: Vec<String> = jobs
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| p.display().to_string())
        .collect();
    if !absent.is_empty() {
        bail!("job file not found: {}", absent.join(", "));
    }
    Ok(())
}

/// Parse a job description and derive the serials it needs.
///
/// Runs before any network activity, so duplicate serials fail fast.
pub fn plan_job(input: &Path) -> Result<JobPlan> {
    let paths = JobPaths::from_input(input)?;
    let job = JobDescription::from_file(&paths.input)?;
    let required = RequiredSet::build(&job.streams)
        .with_context(|| format!("invalid job {}", input.display()))?;
    info!(
        job = %input.display(),
        streams = job.streams.len(),
        required = required.len(),
        "job parsed"
    );
    Ok(JobPlan {
        paths,
        streams: job.streams,
        required,
    })
}

/// Locate the job's volumes, print the report and, when nothing blocks
/// the job, write its machines and threads files.
#[allow(clippy::too_many_arguments)]
pub async fn execute_job<T, R, C, S, W>(
    plan: &JobPlan,
    topology: &impl Topology,
    head_node: &str,
    transport: &mut T,
    resolver: &R,
    clock: &C,
    slots: &S,
    settings: &DiscoverySettings,
    options: JobOptions,
    out: &mut W,
) -> Result<JobStatus>
where
    T: Transport,
    R: HostResolver,
    C: Clock,
    S: SlotLocator,
    W: Write,
{
    let outcome = discover(transport, resolver, clock, &plan.required, settings).await?;

    let mut context = ReportContext {
        show_found: options.show_found,
        ..ReportContext::default()
    };
    if options.slot_lookup && !outcome.missing.is_empty() {
        context.missing_slots = locate_missing(slots, &outcome.missing).await;
    }
    out.write_all(render(&outcome, options.format, &context)?.as_bytes())?;
    out.flush()?;

    if !outcome.is_clean() {
        warn!(
            job = %plan.paths.input.display(),
            conflicts = outcome.conflicts.len(),
            missing = outcome.missing.len(),
            not_ready = outcome.not_ready.len(),
            incomplete = outcome.incomplete.len(),
            "job blocked, no output written"
        );
        return Ok(JobStatus::Blocked(outcome));
    }

    let assignment = allocate(topology, head_node, &plan.streams, &outcome)
        .with_context(|| format!("cannot allocate nodes for {}", plan.paths.input.display()))?;

    let threads = options.write_threads.then_some(plan.paths.threads.as_path());
    write_job_outputs(
        &plan.paths.machines,
        threads,
        &plan.paths.threads,
        &assignment,
        options.access,
    )?;

    Ok(JobStatus::Written(assignment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_job_files_are_listed_together() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.input");
        std::fs::write(&present, "").unwrap();
        let jobs = vec![present, dir.path().join("b.input"), dir.path().join("c.input")];

        let err = check_job_files(&jobs).unwrap_err().to_string();
        assert!(err.contains("b.input"));
        assert!(err.contains("c.input"));
        assert!(!err.contains("a.input"));
    }

    #[test]
    fn old_cluster_definition_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        std::fs::write(&path, "version = \"0.9\"\n[[node]]\nname = \"head1\"\nhead = true\n").unwrap();

        let err = load_cluster(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<volgrid_core::CoreError>(),
            Some(volgrid_core::CoreError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn local_host_name_is_short() {
        assert!(!local_host_name().contains('.'));
    }
}
