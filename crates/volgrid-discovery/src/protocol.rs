//! The discovery poll loop.
//!
//! Queries are sent exactly once. The loop then receives with a short
//! per-receive timeout, checking the deadline before every receive, and
//! stops as soon as the required set is satisfied or the budget is spent.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, info, trace, warn};
use volgrid_core::RequiredSet;

use crate::decoder::decode;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::session::{Absorbed, DiscoveryOutcome, DiscoverySession};
use crate::wire::{HolderClass, encode_query};

/// One received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: IpAddr,
}

/// Datagram transport used by the poll loop.
pub trait Transport {
    /// Send one query to every listener on the discovery channel.
    fn send(&mut self, payload: &[u8]) -> impl Future<Output = std::io::Result<()>>;

    /// Wait at most `timeout` for one datagram; `Ok(None)` when nothing arrived.
    fn recv(&mut self, timeout: Duration) -> impl Future<Output = std::io::Result<Option<Datagram>>>;
}

/// Reverse lookup of a datagram's source address.
pub trait HostResolver {
    /// Hostname for `addr`, or `None` when the address does not resolve.
    fn resolve(&self, addr: IpAddr) -> impl Future<Output = Option<String>>;
}

/// Monotonic time since the run started.
pub trait Clock {
    fn elapsed(&self) -> Duration;
}

/// Timing and identity of a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Name placed in the `from` field of outgoing queries.
    pub sender: String,
    /// Overall listening budget.
    pub time_budget: Duration,
    /// Upper bound on a single receive.
    pub receive_timeout: Duration,
}

impl DiscoverySettings {
    pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(5);
    pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(200);

    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            time_budget: Self::DEFAULT_TIME_BUDGET,
            receive_timeout: Self::DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

/// Locate every serial of `required` and return the sorted outcome.
pub async fn discover<T, R, C>(
    transport: &mut T,
    resolver: &R,
    clock: &C,
    required: &RequiredSet,
    settings: &DiscoverySettings,
) -> DiscoveryResult<DiscoveryOutcome>
where
    T: Transport,
    R: HostResolver,
    C: Clock,
{
    let mut session = DiscoverySession::new(required);
    run(&mut session, transport, resolver, clock, settings).await?;
    Ok(session.finish())
}

/// Drive `session` until it is satisfied or the time budget elapses.
///
/// Nothing is sent when the session has nothing left to locate.
pub async fn run<T, R, C>(
    session: &mut DiscoverySession,
    transport: &mut T,
    resolver: &R,
    clock: &C,
    settings: &DiscoverySettings,
) -> DiscoveryResult<()>
where
    T: Transport,
    R: HostResolver,
    C: Clock,
{
    if session.is_satisfied() {
        debug!("no serials to locate, skipping discovery");
        return Ok(());
    }

    for class in HolderClass::ALL {
        let query = encode_query(&settings.sender, class);
        transport
            .send(query.as_bytes())
            .await
            .map_err(|source| DiscoveryError::Send {
                class: class.address(),
                source,
            })?;
        debug!(class = class.address(), "query sent");
    }

    while !session.is_satisfied() {
        let elapsed = clock.elapsed();
        if elapsed >= settings.time_budget {
            info!(
                missing = session.missing().len(),
                "discovery time budget exhausted"
            );
            break;
        }
        let wait = settings.receive_timeout.min(settings.time_budget - elapsed);

        let datagram = match transport.recv(wait).await {
            Ok(Some(datagram)) => datagram,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "receive failed");
                continue;
            }
        };

        let remaining = settings.time_budget.saturating_sub(clock.elapsed());
        let hostname = match tokio::time::timeout(remaining, resolver.resolve(datagram.source)).await {
            Ok(Some(hostname)) => hostname,
            Ok(None) => {
                warn!(addr = %datagram.source, "cannot resolve sender address, skipping response");
                continue;
            }
            Err(_elapsed) => {
                warn!(addr = %datagram.source, "sender lookup outlived the time budget, skipping response");
                continue;
            }
        };
        let host = short_hostname(&hostname);
        trace!(%host, payload = %String::from_utf8_lossy(&datagram.payload), "response received");

        match session.absorb(decode(host, &datagram.payload)) {
            Absorbed::Unknown => debug!(%host, "ignoring undecodable response"),
            Absorbed::DuplicateHost | Absorbed::Irrelevant | Absorbed::Located(_) => {}
        }
    }

    if session.is_satisfied() {
        info!(elapsed_ms = clock.elapsed().as_millis() as u64, "all required serials located");
    }
    Ok(())
}

/// Hostname up to the first dot.
pub fn short_hostname(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
