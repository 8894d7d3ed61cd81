//! Source-address hash routing.
//!
//! # Responsibilities
//! - Keep the ordered, append-only backend pool
//! - Pick `fnv1a_32(source IP) mod pool size` for each connection
//! - Close connections that cannot be routed
//!
//! # Design Decisions
//! - Length check, modulo and lookup share one lock scope
//! - The chosen handler runs after the lock is released
//! - Diagnostics go through the `Dispatch` captured at construction,
//!   not whatever subscriber happens to be ambient at call time
//! - Growing the pool remaps addresses; there is no affinity memory

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Dispatch;

use crate::load_balancer::backend::BackendEntry;
use crate::load_balancer::error::{RouteError, RouteResult};
use crate::load_balancer::hash::{bucket, fnv1a_32};
use crate::load_balancer::Handler;
use crate::net::connection::Connection;
use crate::observability::metrics;

/// Routes each connection to a backend chosen by hashing its source IP.
pub struct AddressHashRouter<C> {
    entries: Mutex<Vec<BackendEntry<C>>>,
    dispatch: Dispatch,
}

impl<C: Connection> AddressHashRouter<C> {
    /// Create an empty router that logs through the current default dispatcher.
    pub fn new() -> Self {
        Self::with_dispatch(tracing::dispatcher::get_default(Dispatch::clone))
    }

    /// Create an empty router that logs through `dispatch`.
    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            dispatch,
        }
    }

    /// Append a backend. Returns the index it was assigned.
    ///
    /// Every address may move to a different backend afterwards.
    pub fn add_backend(&self, handler: Arc<dyn Handler<C>>) -> usize {
        let entry = BackendEntry::new(handler);
        let weight = entry.weight();

        let index = {
            let mut entries = self.lock_entries();
            entries.push(entry);
            entries.len() - 1
        };

        self.log(|| tracing::debug!(backend = index, weight, "Backend registered"));
        index
    }

    /// Hand `conn` to the backend its source IP hashes to.
    ///
    /// With an empty pool the connection is closed and one error is logged.
    pub fn route(&self, conn: C) {
        let peer = conn.remote_addr();
        let key = hash_key(peer.ip());

        match self.pick(&key) {
            Ok((index, handler)) => {
                self.log(|| tracing::debug!(peer = %peer, backend = index, "Routing connection"));
                metrics::connection_routed(index);
                handler.serve(conn);
            }
            Err(err) => {
                self.log(|| tracing::error!(peer = %peer, error = %err, "Load balancing failed"));
                metrics::route_failed();
                conn.close();
            }
        }
    }

    /// Index `ip` would be routed to with the current pool.
    pub fn select(&self, ip: IpAddr) -> RouteResult<usize> {
        let entries = self.lock_entries();
        bucket(fnv1a_32(hash_key(ip).as_bytes()), entries.len()).ok_or(RouteError::EmptyPool)
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pick(&self, key: &str) -> RouteResult<(usize, Arc<dyn Handler<C>>)> {
        let entries = self.lock_entries();
        let index = bucket(fnv1a_32(key.as_bytes()), entries.len()).ok_or(RouteError::EmptyPool)?;
        Ok((index, Arc::clone(entries[index].handler())))
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<BackendEntry<C>>> {
        self.entries.lock().expect("backend pool mutex poisoned")
    }

    fn log(&self, event: impl FnOnce()) {
        tracing::dispatcher::with_default(&self.dispatch, event);
    }
}

impl<C: Connection> Default for AddressHashRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> Handler<C> for AddressHashRouter<C> {
    fn serve(&self, conn: C) {
        self.route(conn);
    }
}

impl<C> std::fmt::Debug for AddressHashRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backends = self.entries.lock().map(|e| e.len()).unwrap_or_default();
        f.debug_struct("AddressHashRouter")
            .field("backends", &backends)
            .finish_non_exhaustive()
    }
}

/// Text form of the source IP. IPv4-mapped IPv6 keys as plain IPv4.
fn hash_key(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Connection double counting `close` calls.
    struct TestConn {
        addr: SocketAddr,
        closes: Arc<AtomicUsize>,
    }

    impl TestConn {
        fn new(addr: &str) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let conn = Self {
                addr: addr.parse().unwrap(),
                closes: closes.clone(),
            };
            (conn, closes)
        }
    }

    impl Connection for TestConn {
        fn remote_addr(&self) -> SocketAddr {
            self.addr
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Handler double recording which backend served.
    struct Recorder {
        index: usize,
        served: Arc<Mutex<Vec<usize>>>,
    }

    impl Handler<TestConn> for Recorder {
        fn serve(&self, _conn: TestConn) {
            self.served.lock().unwrap().push(self.index);
        }
    }

    fn router_with(count: usize) -> (AddressHashRouter<TestConn>, Arc<Mutex<Vec<usize>>>) {
        let router = AddressHashRouter::with_dispatch(Dispatch::none());
        let served = Arc::new(Mutex::new(Vec::new()));
        for index in 0..count {
            router.add_backend(Arc::new(Recorder {
                index,
                served: served.clone(),
            }));
        }
        (router, served)
    }

    /// Layer counting ERROR events.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_routes_to_fnv_index() {
        let (router, served) = router_with(3);
        let (conn, closes) = TestConn::new("10.0.0.5:4000");

        router.route(conn);

        let expected = (fnv1a_32(b"10.0.0.5") % 3) as usize;
        assert_eq!(*served.lock().unwrap(), vec![expected]);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_address_same_backend() {
        let (router, served) = router_with(5);
        let (first, _) = TestConn::new("192.168.1.100:1111");
        let (second, _) = TestConn::new("192.168.1.100:2222");

        router.route(first);
        router.route(second);

        let served = served.lock().unwrap();
        assert_eq!(served.len(), 2);
        assert_eq!(served[0], served[1]);
    }

    #[test]
    fn test_port_is_not_part_of_key() {
        let (router, _) = router_with(7);
        let a = router.select("172.16.0.9".parse().unwrap()).unwrap();
        let (conn, _) = TestConn::new("172.16.0.9:65000");
        let b = router.select(conn.remote_addr().ip()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_growing_pool_remaps_some_address() {
        let (router, _) = router_with(3);
        let addrs: Vec<IpAddr> = (0..=255u8)
            .map(|i| IpAddr::from([10, 0, 0, i]))
            .collect();
        let before: Vec<usize> = addrs.iter().map(|ip| router.select(*ip).unwrap()).collect();

        router.add_backend(Arc::new(Recorder {
            index: 3,
            served: Arc::new(Mutex::new(Vec::new())),
        }));
        let after: Vec<usize> = addrs.iter().map(|ip| router.select(*ip).unwrap()).collect();

        assert!(before.iter().zip(&after).any(|(b, a)| b != a));
        for (ip, index) in addrs.iter().zip(&after) {
            let hash = fnv1a_32(ip.to_string().as_bytes());
            assert_eq!(*index, (hash % 4) as usize);
        }
    }

    #[test]
    fn test_empty_pool_closes_and_logs_once() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        let router: AddressHashRouter<TestConn> =
            AddressHashRouter::with_dispatch(Dispatch::new(subscriber));
        let (conn, closes) = TestConn::new("10.0.0.5:53");

        router.route(conn);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(router.select("10.0.0.5".parse().unwrap()), Err(RouteError::EmptyPool));
    }

    #[test]
    fn test_success_logs_no_error() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        let router = AddressHashRouter::with_dispatch(Dispatch::new(subscriber));
        let served = Arc::new(Mutex::new(Vec::new()));
        router.add_backend(Arc::new(Recorder {
            index: 0,
            served: served.clone(),
        }));

        let (conn, _) = TestConn::new("10.0.0.5:53");
        router.route(conn);

        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(*served.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_ipv4_mapped_keys_as_ipv4() {
        let (router, served) = router_with(3);
        let (mapped, _) = TestConn::new("[::ffff:10.0.0.5]:4000");
        let (plain, _) = TestConn::new("10.0.0.5:4000");

        router.route(mapped);
        router.route(plain);

        let served = served.lock().unwrap();
        assert_eq!(served[0], served[1]);
    }

    #[test]
    fn test_add_backend_returns_index() {
        let (router, _) = router_with(2);
        let index = router.add_backend(Arc::new(Recorder {
            index: 2,
            served: Arc::new(Mutex::new(Vec::new())),
        }));
        assert_eq!(index, 2);
        assert_eq!(router.len(), 3);
        assert!(!router.is_empty());
    }

    #[test]
    fn test_nested_router() {
        let (inner, served) = router_with(2);
        let outer = AddressHashRouter::with_dispatch(Dispatch::none());
        outer.add_backend(Arc::new(inner));

        let (conn, _) = TestConn::new("10.1.2.3:9");
        outer.route(conn);

        let expected = (fnv1a_32(b"10.1.2.3") % 2) as usize;
        assert_eq!(*served.lock().unwrap(), vec![expected]);
    }
}
