//! Region hostname resolution with TTL caching
//!
//! The write region is identified by a configured DNS name whose resolved
//! addresses change when the region fails over. `RegionResolver` re-resolves
//! that name lazily under a time-to-live and keeps serving the last
//! successfully resolved set when DNS is transiently unavailable, so a
//! resolution hiccup never breaks request routing.

use crate::clock::{Clock, SystemClock};
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An immutable set of addresses produced by one resolution attempt.
///
/// A refresh publishes a brand-new set; a published set is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    addrs: HashSet<IpAddr>,
}

impl AddressSet {
    /// Whether the given address belongs to the current write region.
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.addrs.contains(&addr)
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl FromIterator<IpAddr> for AddressSet {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}

/// Name-resolution oracle for the region hostname.
///
/// Implementations perform one resolution attempt per call and do no
/// caching of their own; `RegionResolver` layers the TTL cache and the
/// last-known-good fallback on top.
pub trait ResolveRegion: Send + Sync {
    /// Resolve the hostname to the set of addresses currently serving as
    /// the write region.
    fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>>;
}

/// Production resolver backed by the system DNS configuration.
pub struct DnsRegionResolver {
    inner: hickory_resolver::Resolver,
}

impl DnsRegionResolver {
    /// Create a resolver from the system configuration (/etc/resolv.conf).
    pub fn from_system_conf() -> Result<Self> {
        let inner = hickory_resolver::Resolver::from_system_conf().map_err(|e| {
            Error::Resolution(format!("failed to construct DNS resolver: {}", e))
        })?;
        Ok(Self { inner })
    }
}

impl ResolveRegion for DnsRegionResolver {
    fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>> {
        let lookup = self.inner.lookup_ip(hostname).map_err(|e| {
            Error::Resolution(format!("failed to resolve '{}': {}", hostname, e))
        })?;
        Ok(lookup.iter().collect())
    }
}

/// Cached address set stamped with the time of its successful resolution.
struct CachedAddresses {
    set: Arc<AddressSet>,
    resolved_at: Instant,
}

/// TTL-caching resolver for the region hostname.
///
/// Readers take a single atomic load on the hot path. The refresh path is
/// guarded by a mutex so at most one caller performs a resolution at a
/// time; concurrent callers reuse the stale set rather than blocking.
pub struct RegionResolver {
    hostname: String,
    ttl: Duration,
    backend: Arc<dyn ResolveRegion>,
    clock: Arc<dyn Clock>,
    cached: ArcSwapOption<CachedAddresses>,
    refresh_lock: Mutex<()>,
}

impl RegionResolver {
    /// Create a resolver for the given hostname and time-to-live.
    pub fn new(hostname: String, ttl: Duration, backend: Arc<dyn ResolveRegion>) -> Self {
        Self::with_clock(hostname, ttl, backend, Arc::new(SystemClock))
    }

    /// Create a resolver with an explicit time source.
    pub fn with_clock(
        hostname: String,
        ttl: Duration,
        backend: Arc<dyn ResolveRegion>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            hostname,
            ttl,
            backend,
            clock,
            cached: ArcSwapOption::const_empty(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The hostname this resolver tracks.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the current address set, re-resolving if the cached one is
    /// older than the TTL.
    ///
    /// Fails only when resolution fails and no set has ever been cached.
    /// After the first success, a failed refresh serves the last good set.
    pub fn current(&self) -> Result<Arc<AddressSet>> {
        if let Some(cached) = self.cached.load_full() {
            if self.is_fresh(&cached) {
                return Ok(cached.set.clone());
            }
        }

        match self.refresh_lock.try_lock() {
            Some(_guard) => self.refresh(),
            None => {
                // Another caller is already resolving. Serve the stale set
                // if one exists; only the first-ever resolution must wait.
                if let Some(cached) = self.cached.load_full() {
                    return Ok(cached.set.clone());
                }
                let _guard = self.refresh_lock.lock();
                if let Some(cached) = self.cached.load_full() {
                    return Ok(cached.set.clone());
                }
                self.refresh()
            }
        }
    }

    fn is_fresh(&self, cached: &CachedAddresses) -> bool {
        self.clock.now().duration_since(cached.resolved_at) < self.ttl
    }

    /// Performs one resolution attempt. Caller must hold `refresh_lock`.
    fn refresh(&self) -> Result<Arc<AddressSet>> {
        // A concurrent refresh may have published while we waited.
        if let Some(cached) = self.cached.load_full() {
            if self.is_fresh(&cached) {
                return Ok(cached.set.clone());
            }
        }

        match self.backend.resolve(&self.hostname) {
            Ok(addrs) => {
                let set: Arc<AddressSet> = Arc::new(addrs.into_iter().collect());
                debug!(
                    hostname = %self.hostname,
                    addresses = set.len(),
                    "Resolved region hostname"
                );
                self.cached.store(Some(Arc::new(CachedAddresses {
                    set: set.clone(),
                    resolved_at: self.clock.now(),
                })));
                Ok(set)
            }
            Err(e) => match self.cached.load_full() {
                Some(cached) => {
                    warn!(
                        hostname = %self.hostname,
                        "Resolution failed, serving last known addresses: {}", e
                    );
                    Ok(cached.set.clone())
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests_support::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted oracle: serves the configured answers in order, repeating
    /// the last one, and counts resolution attempts.
    struct ScriptedResolver {
        answers: Vec<Result<Vec<IpAddr>>>,
        calls: AtomicUsize,
    }

    impl ScriptedResolver {
        fn new(answers: Vec<Result<Vec<IpAddr>>>) -> Self {
            Self {
                answers,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ResolveRegion for ScriptedResolver {
        fn resolve(&self, _hostname: &str) -> Result<Vec<IpAddr>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = call.min(self.answers.len() - 1);
            match &self.answers[idx] {
                Ok(addrs) => Ok(addrs.clone()),
                Err(Error::Config(msg)) => Err(Error::Config(msg.clone())),
                Err(Error::Resolution(msg)) => Err(Error::Resolution(msg.clone())),
            }
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn first_failure_is_fatal() {
        let backend = Arc::new(ScriptedResolver::new(vec![Err(Error::Resolution(
            "no such host".to_string(),
        ))]));
        let resolver =
            RegionResolver::new("region.db.example".to_string(), Duration::from_secs(60), backend);

        let err = resolver.current().unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn serves_cached_set_within_ttl() {
        let backend = Arc::new(ScriptedResolver::new(vec![Ok(vec![ip("10.0.0.1")])]));
        let resolver = RegionResolver::new(
            "region.db.example".to_string(),
            Duration::from_secs(60),
            backend.clone(),
        );

        let first = resolver.current().unwrap();
        let second = resolver.current().unwrap();

        assert!(Arc::ptr_eq(&first, &second), "cached set must be reused");
        assert_eq!(backend.calls(), 1, "no re-resolution within the TTL");
    }

    #[test]
    fn re_resolves_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(ScriptedResolver::new(vec![
            Ok(vec![ip("10.0.0.1")]),
            Ok(vec![ip("10.0.0.2")]),
        ]));
        let resolver = RegionResolver::with_clock(
            "region.db.example".to_string(),
            Duration::from_secs(60),
            backend.clone(),
            clock.clone(),
        );

        let first = resolver.current().unwrap();
        assert!(first.contains(ip("10.0.0.1")));

        clock.advance(Duration::from_secs(61));

        let second = resolver.current().unwrap();
        assert!(second.contains(ip("10.0.0.2")));
        assert!(!second.contains(ip("10.0.0.1")));
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn transient_failure_serves_last_good_set() {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(ScriptedResolver::new(vec![
            Ok(vec![ip("10.0.0.1")]),
            Err(Error::Resolution("temporary outage".to_string())),
        ]));
        let resolver = RegionResolver::with_clock(
            "region.db.example".to_string(),
            Duration::from_secs(60),
            backend,
            clock.clone(),
        );

        let first = resolver.current().unwrap();
        clock.advance(Duration::from_secs(61));

        let fallback = resolver.current().unwrap();
        assert!(
            Arc::ptr_eq(&first, &fallback),
            "failed refresh must serve the last good set"
        );
    }

    #[test]
    fn failed_refresh_retries_on_next_call() {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(ScriptedResolver::new(vec![
            Ok(vec![ip("10.0.0.1")]),
            Err(Error::Resolution("temporary outage".to_string())),
            Ok(vec![ip("10.0.0.9")]),
        ]));
        let resolver = RegionResolver::with_clock(
            "region.db.example".to_string(),
            Duration::from_secs(60),
            backend.clone(),
            clock.clone(),
        );

        resolver.current().unwrap();
        clock.advance(Duration::from_secs(61));
        resolver.current().unwrap(); // absorbed failure

        let recovered = resolver.current().unwrap();
        assert!(recovered.contains(ip("10.0.0.9")));
        assert_eq!(backend.calls(), 3);
    }
}
