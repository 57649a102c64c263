//! End-to-end job tests.
//!
//! Each test writes a cluster definition and a job description into a
//! temporary directory, drives discovery with a scripted transport and a
//! manual clock, and checks the report and the files left behind. No
//! sockets are opened and no test waits on wall-clock time.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use volgrid_cli::workflow::{self, JobOptions, JobStatus};
use volgrid_cli::{ReportFormat, SlotLocator};
use volgrid_core::{ClusterDefinition, CoreError};
use volgrid_discovery::{Clock, Datagram, DiscoverySettings, HostResolver, Transport};
use volgrid_placement::PlacementError;

const CLUSTER: &str = r#"
version = "1.0"

[[node]]
name = "head1"
head = true
threads = 4

[[node]]
name = "c1"
threads = 8

[[node]]
name = "mark5-1"
module_host = true

[[node]]
name = "mark6-1"
array_host = true

[[node]]
name = "store1"
storage = ["/data/exp1"]
"#;

const JOB: &str = "\
ACTIVE DATASTREAMS: 3
DATASTREAM 0 INDEX: 0
DATASTREAM 1 INDEX: 1
DATASTREAM 2 INDEX: 2
DATA SOURCE:        MODULE
DATA SOURCE:        FILE
DATA SOURCE:        MARK6
FILE 0/0:           ABC12345
FILE 1/0:           /data/exp1/scan3/file0001.vdif
FILE 2/0:           MSN00001
";

const MARK5_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
const MARK6_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6));
const C1_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

// ── Fakes ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct ManualClock(Rc<Cell<Duration>>);

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.0.get()
    }
}

/// Hands out queued datagrams, then idles out each receive timeout.
struct ScriptedTransport {
    clock: ManualClock,
    queue: VecDeque<Datagram>,
}

impl ScriptedTransport {
    fn new(clock: &ManualClock, datagrams: Vec<Datagram>) -> Self {
        Self {
            clock: clock.clone(),
            queue: datagrams.into(),
        }
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, _payload: &[u8]) -> std::io::Result<()> {
        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> std::io::Result<Option<Datagram>> {
        let clock = &self.clock.0;
        match self.queue.pop_front() {
            Some(datagram) => {
                clock.set(clock.get() + Duration::from_millis(5));
                Ok(Some(datagram))
            }
            None => {
                clock.set(clock.get() + timeout);
                Ok(None)
            }
        }
    }
}

struct TableResolver(HashMap<IpAddr, String>);

impl HostResolver for TableResolver {
    async fn resolve(&self, addr: IpAddr) -> Option<String> {
        self.0.get(&addr).cloned()
    }
}

fn resolver() -> TableResolver {
    TableResolver(HashMap::from([
        (MARK5_ADDR, "mark5-1.cluster.local".to_string()),
        (MARK6_ADDR, "mark6-1".to_string()),
        (C1_ADDR, "c1".to_string()),
    ]))
}

/// Module database stand-in: known serials map to a shelf slot.
struct TableSlots(HashMap<&'static str, &'static str>);

impl SlotLocator for TableSlots {
    async fn locate(&self, serial: &str) -> Option<String> {
        self.0.get(serial).map(|slot| slot.to_string())
    }
}

fn slots() -> TableSlots {
    TableSlots(HashMap::from([("ABC12345", "B-17")]))
}

// ── Helpers ────────────────────────────────────────────────────

struct Workspace {
    _dir: tempfile::TempDir,
    cluster: ClusterDefinition,
    job: PathBuf,
}

impl Workspace {
    fn new(job: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cluster_path = dir.path().join("cluster.toml");
        std::fs::write(&cluster_path, CLUSTER).unwrap();
        let job_path = dir.path().join("exp1_1.input");
        std::fs::write(&job_path, job).unwrap();

        Self {
            cluster: workflow::load_cluster(&cluster_path).unwrap(),
            job: job_path,
            _dir: dir,
        }
    }

    fn output(&self, ext: &str) -> PathBuf {
        self.job.with_extension(ext)
    }
}

fn module_status(unit: &str, bank_a: &str, bank_b: &str, state: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <difxMessage><header><from>{unit}</from><to>head1</to><type>Mark5StatusMessage</type></header>\
         <body><mark5Status><bankAVSN>{bank_a}</bankAVSN><bankBVSN>{bank_b}</bankBVSN>\
         <state>{state}</state></mark5Status></body></difxMessage>"
    )
}

fn array_status(unit: &str, serial: &str, missing_disks: u32) -> String {
    format!(
        "<difxMessage><header><from>{unit}</from></header><body><mark6Status>\
         <state>Idle</state><slot1MSN>{serial}</slot1MSN><slot1Disks>8</slot1Disks>\
         <slot1MissingDisks>{missing_disks}</slot1MissingDisks></mark6Status></body></difxMessage>"
    )
}

fn datagram(source: IpAddr, payload: String) -> Datagram {
    Datagram {
        payload: payload.into_bytes(),
        source,
    }
}

async fn run_job(
    ws: &Workspace,
    datagrams: Vec<Datagram>,
    options: JobOptions,
) -> (anyhow::Result<JobStatus>, String) {
    let clock = ManualClock::default();
    let mut transport = ScriptedTransport::new(&clock, datagrams);
    let settings = DiscoverySettings::new("head1");
    let mut out = Vec::new();

    let plan = workflow::plan_job(&ws.job).unwrap();
    let status = workflow::execute_job(
        &plan,
        &ws.cluster,
        "head1",
        &mut transport,
        &resolver(),
        &clock,
        &slots(),
        &settings,
        options,
        &mut out,
    )
    .await;
    (status, String::from_utf8(out).unwrap())
}

fn happy_responses() -> Vec<Datagram> {
    vec![
        datagram(MARK5_ADDR, module_status("MARK5-1", "abc12345", "none", "Idle")),
        datagram(MARK6_ADDR, array_status("mark6-1", "MSN00001", 0)),
    ]
}

fn verbose() -> JobOptions {
    JobOptions {
        show_found: true,
        ..JobOptions::default()
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn clean_discovery_writes_both_files() {
    let ws = Workspace::new(JOB);

    let (status, report) = run_job(&ws, happy_responses(), verbose()).await;

    assert!(matches!(status.unwrap(), JobStatus::Written(_)));
    assert!(report.starts_with("Found modules:\n"));
    assert!(report.contains("mark5-1"));
    assert!(!report.contains("Missing modules"));

    assert_eq!(
        read(&ws.output("machines")),
        "head1\nmark5-1\nstore1\nmark6-1\nhead1\nc1\n"
    );
    assert_eq!(read(&ws.output("threads")), "NUMBER OF CORES:    2\n3\n8\n");
}

#[tokio::test]
async fn clean_discovery_prints_nothing_by_default() {
    let ws = Workspace::new(JOB);

    let (status, report) = run_job(&ws, happy_responses(), JobOptions::default()).await;

    assert!(matches!(status.unwrap(), JobStatus::Written(_)));
    assert_eq!(report, "");
}

#[tokio::test]
async fn no_threads_option_skips_threads_file() {
    let ws = Workspace::new(JOB);
    let options = JobOptions {
        write_threads: false,
        ..JobOptions::default()
    };

    let (status, _) = run_job(&ws, happy_responses(), options).await;

    assert!(matches!(status.unwrap(), JobStatus::Written(_)));
    assert!(ws.output("machines").exists());
    assert!(!ws.output("threads").exists());
}

#[tokio::test]
async fn no_threads_run_removes_threads_file_of_earlier_run() {
    let ws = Workspace::new(JOB);
    std::fs::write(ws.output("machines"), "head1\nc1\n").unwrap();
    std::fs::write(ws.output("threads"), "NUMBER OF CORES:    1\n7\n").unwrap();
    let options = JobOptions {
        write_threads: false,
        ..JobOptions::default()
    };

    let (status, _) = run_job(&ws, happy_responses(), options).await;

    assert!(matches!(status.unwrap(), JobStatus::Written(_)));
    assert_eq!(
        read(&ws.output("machines")),
        "head1\nmark5-1\nstore1\nmark6-1\nhead1\nc1\n"
    );
    assert!(!ws.output("threads").exists());
}

#[tokio::test]
async fn missing_volume_blocks_job_after_time_budget() {
    let ws = Workspace::new(JOB);
    let only_array = vec![datagram(MARK6_ADDR, array_status("mark6-1", "MSN00001", 0))];

    let (status, report) = run_job(&ws, only_array, JobOptions::default()).await;

    match status.unwrap() {
        JobStatus::Blocked(outcome) => assert_eq!(outcome.missing, vec!["ABC12345"]),
        JobStatus::Written(_) => panic!("job should be blocked"),
    }
    assert!(report.contains("Missing modules:\n  ABC12345\n"));
    assert!(!report.contains("slot ="));
    assert!(!ws.output("machines").exists());
    assert!(!ws.output("threads").exists());
}

#[tokio::test]
async fn slot_lookup_annotates_missing_modules() {
    let ws = Workspace::new(JOB);
    let options = JobOptions {
        slot_lookup: true,
        ..JobOptions::default()
    };

    let (status, report) = run_job(&ws, Vec::new(), options).await;

    assert!(matches!(status.unwrap(), JobStatus::Blocked(_)));
    assert!(report.contains("Missing modules:\n  ABC12345 (slot = B-17)\n  MSN00001 (slot = unknown)\n"));
}

#[tokio::test]
async fn busy_module_and_degraded_array_reported_together() {
    let ws = Workspace::new(JOB);
    let responses = vec![
        datagram(MARK5_ADDR, module_status("mark5-1", "ABC12345", "none", "Busy")),
        datagram(MARK6_ADDR, array_status("mark6-1", "MSN00001", 2)),
    ];

    let (status, report) = run_job(&ws, responses, JobOptions::default()).await;

    assert!(matches!(status.unwrap(), JobStatus::Blocked(_)));
    assert!(report.contains("Modules not ready:\n  ABC12345\n"));
    assert!(report.contains("Incomplete modules:\n  MSN00001\n"));
    assert!(!ws.output("machines").exists());
}

#[tokio::test]
async fn json_report_is_parseable() {
    let ws = Workspace::new(JOB);
    let options = JobOptions {
        format: ReportFormat::Json,
        ..JobOptions::default()
    };

    let (_, report) = run_job(&ws, happy_responses(), options).await;

    let json: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(json["resolved"].as_array().unwrap().len(), 2);
    assert!(json["missing"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_unit_name_falls_back_to_origin_host() {
    let ws = Workspace::new(JOB);
    let mut responses = happy_responses();
    responses[0] = datagram(MARK5_ADDR, module_status("rogue", "ABC12345", "none", "Idle"));

    let (status, _) = run_job(&ws, responses, JobOptions::default()).await;

    match status.unwrap() {
        JobStatus::Written(assignment) => assert_eq!(assignment.stream_nodes[0], "mark5-1"),
        JobStatus::Blocked(outcome) => panic!("unexpected block: {outcome:?}"),
    }
}

#[tokio::test]
async fn module_on_compute_node_fails_allocation() {
    let ws = Workspace::new(JOB);
    let responses = vec![
        datagram(C1_ADDR, module_status("c1", "ABC12345", "none", "Idle")),
        datagram(MARK6_ADDR, array_status("mark6-1", "MSN00001", 0)),
    ];

    let (status, _) = run_job(&ws, responses, JobOptions::default()).await;

    let err = status.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PlacementError>(),
        Some(PlacementError::UnassignableStream { role: "module", .. })
    ));
    assert!(!ws.output("machines").exists());
}

#[test]
fn duplicate_serial_fails_before_discovery() {
    let job = JOB.replace("MSN00001", "ABC12345");
    let ws = Workspace::new(&job);

    let err = workflow::plan_job(&ws.job).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::DuplicateIdentifier { .. })
    ));
}

#[test]
fn job_file_must_have_input_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exp1_1.txt");
    std::fs::write(&path, JOB).unwrap();

    let err = workflow::plan_job(&path).unwrap_err();
    assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NotAJobFile(_))));
}

#[test]
fn caller_must_be_head_node() {
    let ws = Workspace::new(JOB);
    assert!(workflow::check_head_node(&ws.cluster, "head1").is_ok());

    let err = workflow::check_head_node(&ws.cluster, "c1").unwrap_err();
    assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NotHeadNode { .. })));
}
