//! volgrid-discovery — locate recorded volumes on the cluster.
//!
//! A discovery run broadcasts one query per holder class, then listens
//! for status messages until every required serial has been seen or the
//! time budget runs out.
//!
//! # Architecture
//!
//! ```text
//! discover()
//!   ├── wire::encode_query() → multicast, once per holder class
//!   └── poll loop (deadline checked before every receive)
//!       ├── Transport::recv(≤ receive_timeout)
//!       ├── HostResolver::resolve(source) → short origin host
//!       ├── decoder::decode() → StatusRecord
//!       └── DiscoverySession::absorb() → missing / conflicts / not ready / incomplete
//! ```
//!
//! The transport, resolver and clock are traits so the loop can be driven
//! without sockets or wall-clock waits.

pub mod decoder;
pub mod error;
pub mod protocol;
pub mod record;
pub mod session;
pub mod udp;
pub mod wire;

pub use decoder::decode;
pub use error::{DiscoveryError, DiscoveryResult};
pub use protocol::{Clock, Datagram, DiscoverySettings, HostResolver, Transport, discover, run};
pub use record::{NO_VOLUME, StatusPayload, StatusRecord};
pub use session::{Absorbed, Conflict, DiscoveryOutcome, DiscoverySession};
pub use udp::{DEFAULT_GROUP, DEFAULT_PORT, DnsResolver, MonotonicClock, MulticastTransport};
pub use wire::{HolderClass, encode_query};
