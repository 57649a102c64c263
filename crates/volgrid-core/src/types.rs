//! Input streams declared by a job.

use serde::{Deserialize, Serialize};

/// Storage backing for an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamKind {
    File,
    Module,
    DiskArray,
}

impl StreamKind {
    /// Parse the `DATA SOURCE` keyword of a job description.
    ///
    /// Disk arrays are written `MARK6` by the job generators; `DISK_ARRAY`
    /// is accepted as well.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "FILE" => Some(StreamKind::File),
            "MODULE" => Some(StreamKind::Module),
            "MARK6" | "DISK_ARRAY" => Some(StreamKind::DiskArray),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::File => "FILE",
            StreamKind::Module => "MODULE",
            StreamKind::DiskArray => "DISK_ARRAY",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One data source required by the job.
///
/// Exactly one kind of locator is carried, so a stream can never hold
/// both a volume serial and a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputStream {
    /// Files under a filesystem path prefix.
    File { path: String },
    /// A removable module, addressed by its volume serial.
    Module { volume: String },
    /// A multi-disk array, addressed by its ordered module serials.
    DiskArray { serials: Vec<String> },
}

impl InputStream {
    pub fn file(path: impl Into<String>) -> Self {
        InputStream::File { path: path.into() }
    }

    pub fn module(volume: impl Into<String>) -> Self {
        InputStream::Module {
            volume: volume.into(),
        }
    }

    pub fn disk_array<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InputStream::DiskArray {
            serials: serials.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            InputStream::File { .. } => StreamKind::File,
            InputStream::Module { .. } => StreamKind::Module,
            InputStream::DiskArray { .. } => StreamKind::DiskArray,
        }
    }

    /// Serials this stream needs located on the network. File streams need none.
    pub fn serials(&self) -> Vec<&str> {
        match self {
            InputStream::File { .. } => Vec::new(),
            InputStream::Module { volume } => vec![volume.as_str()],
            InputStream::DiskArray { serials } => serials.iter().map(String::as_str).collect(),
        }
    }

    /// `true` when the stream carries no locator at all.
    pub fn is_empty(&self) -> bool {
        match self {
            InputStream::File { path } => path.is_empty(),
            InputStream::Module { volume } => volume.is_empty(),
            InputStream::DiskArray { serials } => serials.is_empty(),
        }
    }
}
