//! Job description (`.input`) parser.
//!
//! Only the datastream sections are read:
//!
//! ```text
//! ACTIVE DATASTREAMS: 2
//! DATASTREAM 0 INDEX: 0
//! DATASTREAM 1 INDEX: 1
//! DATA SOURCE:        MODULE
//! DATA SOURCE:        FILE
//! FILE 0/0:           ABC12345
//! FILE 1/0:           /data/exp1/scan3/file0001.vdif
//! ```
//!
//! Every other line is ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::types::{InputStream, StreamKind};

/// Locations of a job description and the two files written beside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub input: PathBuf,
    pub machines: PathBuf,
    pub threads: PathBuf,
}

impl JobPaths {
    pub fn from_input(input: &Path) -> CoreResult<Self> {
        if input.extension().and_then(|e| e.to_str()) != Some("input") {
            return Err(CoreError::NotAJobFile(input.to_path_buf()));
        }
        Ok(JobPaths {
            input: input.to_path_buf(),
            machines: input.with_extension("machines"),
            threads: input.with_extension("threads"),
        })
    }
}

/// Active input streams of one job, in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    pub streams: Vec<InputStream>,
}

/// Datastream table entry before it is bound to an active stream.
#[derive(Debug, Default)]
struct TableEntry {
    source: Option<String>,
    files: BTreeMap<usize, String>,
}

impl JobDescription {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CoreResult<Self> {
        let mut active_count = 0usize;
        let mut active: BTreeMap<usize, usize> = BTreeMap::new();
        let mut table: BTreeMap<usize, TableEntry> = BTreeMap::new();
        let mut source_count = 0usize;

        for (lineno, line) in content.lines().enumerate() {
            let lineno = lineno + 1;
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let parts: Vec<&str> = key.split_whitespace().collect();

            if key == "ACTIVE DATASTREAMS" {
                active_count = parse_index(value, lineno)?;
            } else if parts.len() == 3 && parts[0] == "DATASTREAM" && parts[2] == "INDEX" {
                let stream = parse_index(parts[1], lineno)?;
                let entry = parse_index(value, lineno)?;
                if active.insert(stream, entry).is_some() {
                    return Err(CoreError::Parse {
                        line: lineno,
                        message: format!("active stream {stream} declared twice"),
                    });
                }
            } else if key == "DATA SOURCE" {
                table.entry(source_count).or_default().source = Some(value.to_string());
                source_count += 1;
            } else if parts.len() == 2 && parts[0] == "FILE" {
                let (entry, file) = parts[1].split_once('/').ok_or_else(|| CoreError::Parse {
                    line: lineno,
                    message: format!("malformed file key {key:?}"),
                })?;
                let entry = parse_index(entry, lineno)?;
                let file = parse_index(file, lineno)?;
                table
                    .entry(entry)
                    .or_default()
                    .files
                    .insert(file, value.to_string());
            }
        }

        let mut claimed: BTreeMap<usize, usize> = BTreeMap::new();
        let mut streams = Vec::with_capacity(active_count);

        for stream_idx in 0..active_count {
            let entry_idx = *active
                .get(&stream_idx)
                .ok_or(CoreError::UndefinedStream(stream_idx))?;
            if claimed.insert(entry_idx, stream_idx).is_some() {
                return Err(CoreError::DuplicateStreamIndex(entry_idx));
            }

            let entry = table
                .get(&entry_idx)
                .ok_or(CoreError::UndefinedStream(stream_idx))?;
            let raw_kind = entry
                .source
                .as_deref()
                .ok_or(CoreError::UndefinedStream(stream_idx))?;
            let kind = StreamKind::from_keyword(raw_kind).ok_or_else(|| {
                CoreError::UnsupportedDataSource {
                    index: entry_idx,
                    kind: raw_kind.to_string(),
                }
            })?;

            let stream = build_stream(kind, entry);
            if stream.is_empty() {
                return Err(CoreError::EmptyStream(stream_idx));
            }
            debug!(stream = stream_idx, entry = entry_idx, %kind, "parsed input stream");
            streams.push(stream);
        }

        Ok(JobDescription { streams })
    }
}

fn build_stream(kind: StreamKind, entry: &TableEntry) -> InputStream {
    match kind {
        StreamKind::Module => {
            InputStream::module(entry.files.values().last().cloned().unwrap_or_default())
        }
        StreamKind::File => {
            let path = entry
                .files
                .values()
                .next()
                .and_then(|f| Path::new(f).parent())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            InputStream::file(path)
        }
        StreamKind::DiskArray => InputStream::disk_array(entry.files.values().cloned()),
    }
}

fn parse_index(raw: &str, line: usize) -> CoreResult<usize> {
    raw.trim().parse().map_err(|_| CoreError::Parse {
        line,
        message: format!("expected a non-negative integer, found {raw:?}"),
    })
}
