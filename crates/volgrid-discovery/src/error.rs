//! Error types for discovery runs.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Failures that abort a discovery run.
///
/// Undecodable payloads and unresolvable senders are not errors; they are
/// logged and skipped by the poll loop.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("{0} is not an IPv4 multicast group")]
    InvalidGroup(Ipv4Addr),

    #[error("failed to open multicast socket on {group}:{port}: {source}")]
    Socket {
        group: Ipv4Addr,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send {class} query: {source}")]
    Send {
        class: &'static str,
        #[source]
        source: std::io::Error,
    },
}
