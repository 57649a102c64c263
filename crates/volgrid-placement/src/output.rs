//! Machines and threads files consumed by the correlator launcher.
//!
//! Each file is written to a temporary sibling and renamed into place.
//! [`write_job_outputs`] additionally orders the pair so an interrupted
//! run never leaves a new machines file next to an old threads file.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::allocator::NodeAssignment;
use crate::error::{PlacementError, PlacementResult};

/// Who may modify the written files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileAccess {
    /// `rw-r--r--`
    #[default]
    OwnerWritable,
    /// `rw-rw-r--`, for clusters where a whole group runs jobs.
    GroupWritable,
}

impl FileAccess {
    pub fn mode(self) -> u32 {
        match self {
            FileAccess::OwnerWritable => 0o644,
            FileAccess::GroupWritable => 0o664,
        }
    }
}

/// One node name per line: head node, stream nodes, compute nodes.
pub fn write_machines_file(path: &Path, assignment: &NodeAssignment, access: FileAccess) -> PlacementResult<()> {
    let mut content = String::new();
    for name in assignment.ordered_node_names() {
        let _ = writeln!(content, "{name}");
    }
    write_atomic(path, &content, access)?;
    info!(path = %path.display(), "wrote machines file");
    Ok(())
}

/// Compute node count header, then one thread count per compute node.
pub fn write_threads_file(path: &Path, assignment: &NodeAssignment, access: FileAccess) -> PlacementResult<()> {
    let budget = assignment.thread_budget();
    let mut content = format!("NUMBER OF CORES:    {}\n", budget.len());
    for threads in budget {
        let _ = writeln!(content, "{threads}");
    }
    write_atomic(path, &content, access)?;
    info!(path = %path.display(), "wrote threads file");
    Ok(())
}

/// Replace a job's outputs as a pair.
///
/// The old machines file goes first and the new one lands last, so a
/// machines file on disk always belongs with the threads file beside it.
/// With `threads` set to `None`, a threads file from an earlier run is
/// removed instead of rewritten.
pub fn write_job_outputs(
    machines: &Path,
    threads: Option<&Path>,
    stale_threads: &Path,
    assignment: &NodeAssignment,
    access: FileAccess,
) -> PlacementResult<()> {
    remove_stale(machines)?;
    match threads {
        Some(path) => write_threads_file(path, assignment, access)?,
        None => remove_stale(stale_threads)?,
    }
    write_machines_file(machines, assignment, access)
}

fn remove_stale(path: &Path) -> PlacementResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed previous output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PlacementError::RemoveStale {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_atomic(path: &Path, content: &str, access: FileAccess) -> PlacementResult<()> {
    let write_err = |source: std::io::Error| PlacementError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    set_access(&tmp, access).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Temporary files start out owner-only; widen to the requested mode.
#[cfg(unix)]
fn set_access(tmp: &NamedTempFile, access: FileAccess) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(access.mode()))
}

#[cfg(not(unix))]
fn set_access(_tmp: &NamedTempFile, _access: FileAccess) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::ThreadBudget;

    fn assignment() -> NodeAssignment {
        NodeAssignment {
            head_node: "head1".to_string(),
            stream_nodes: vec!["mark5-1".to_string(), "store1".to_string()],
            compute: vec![
                ThreadBudget {
                    node: "head1".to_string(),
                    threads: 3,
                },
                ThreadBudget {
                    node: "c1".to_string(),
                    threads: 8,
                },
            ],
        }
    }

    #[test]
    fn machines_file_lists_nodes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.machines");

        write_machines_file(&path, &assignment(), FileAccess::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "head1\nmark5-1\nstore1\nhead1\nc1\n");
    }

    #[test]
    fn threads_file_has_header_and_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.threads");

        write_threads_file(&path, &assignment(), FileAccess::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "NUMBER OF CORES:    2\n3\n8\n");
    }

    #[test]
    fn rewrite_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.machines");
        std::fs::write(&path, "stale\nstale\nstale\nstale\nstale\nstale\n").unwrap();

        write_machines_file(&path, &assignment(), FileAccess::default()).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 5);
        // Only the target remains; the temporary file was renamed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("job.machines");

        let err = write_machines_file(&path, &assignment(), FileAccess::default()).unwrap_err();
        assert!(matches!(err, PlacementError::Write { .. }));
    }

    #[test]
    fn skipped_threads_file_removes_stale_one() {
        let dir = tempfile::tempdir().unwrap();
        let machines = dir.path().join("job.machines");
        let threads = dir.path().join("job.threads");
        std::fs::write(&machines, "old\n").unwrap();
        std::fs::write(&threads, "NUMBER OF CORES:    1\n9\n").unwrap();

        write_job_outputs(&machines, None, &threads, &assignment(), FileAccess::default()).unwrap();

        assert!(std::fs::read_to_string(&machines).unwrap().starts_with("head1\n"));
        assert!(!threads.exists());
    }

    #[test]
    fn pair_is_written_together() {
        let dir = tempfile::tempdir().unwrap();
        let machines = dir.path().join("job.machines");
        let threads = dir.path().join("job.threads");

        write_job_outputs(&machines, Some(&threads), &threads, &assignment(), FileAccess::default())
            .unwrap();

        assert_eq!(std::fs::read_to_string(&threads).unwrap(), "NUMBER OF CORES:    2\n3\n8\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn failed_threads_write_leaves_no_machines_file() {
        let dir = tempfile::tempdir().unwrap();
        let machines = dir.path().join("job.machines");
        std::fs::write(&machines, "old\n").unwrap();
        // A directory cannot be replaced by the renamed threads file.
        let threads = dir.path().join("job.threads");
        std::fs::create_dir(&threads).unwrap();
        std::fs::write(threads.join("keep"), "").unwrap();

        let err = write_job_outputs(&machines, Some(&threads), &threads, &assignment(), FileAccess::default())
            .unwrap_err();

        assert!(matches!(err, PlacementError::Write { .. }));
        assert!(!machines.exists());
    }

    #[cfg(unix)]
    #[test]
    fn group_writable_outputs() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.machines");

        write_machines_file(&path, &assignment(), FileAccess::GroupWritable).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);

        write_machines_file(&path, &assignment(), FileAccess::OwnerWritable).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
