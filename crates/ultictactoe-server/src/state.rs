use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, RwLock};

use crate::config::ServerConfig;
use crate::registry::RoomRegistry;

pub type SharedRegistry = Arc<RwLock<RoomRegistry>>;
pub type IpConnectionCounts = Arc<Mutex<HashMap<IpAddr, usize>>>;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub config: Arc<ServerConfig>,
    /// Open WebSocket connections across both endpoints.
    pub ws_connection_count: Arc<AtomicUsize>,
    pub ws_per_ip: IpConnectionCounts,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(RoomRegistry::new(&config.rooms))),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            ws_per_ip: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Counts one open connection for as long as it lives.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    /// Reserve a slot, or `None` if `max` connections are already open.
    /// Check and increment happen in one atomic step.
    pub fn try_acquire(counter: Arc<AtomicUsize>, max: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        Some(Self { counter })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Holds one of an IP's connection slots; released on drop.
pub struct IpConnectionGuard {
    ip: IpAddr,
    counts: IpConnectionCounts,
}

impl IpConnectionGuard {
    /// Take a slot for `ip`, or `None` if it already has `max` connections.
    pub async fn try_acquire(ip: IpAddr, counts: IpConnectionCounts, max: usize) -> Option<Self> {
        {
            let mut map = counts.lock().await;
            let count = map.entry(ip).or_insert(0);
            if *count >= max {
                return None;
            }
            *count += 1;
        }
        Some(Self { ip, counts })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        let ip = self.ip;
        // Drop cannot await; release inline when the lock is free, otherwise
        // on the runtime.
        if let Ok(mut map) = self.counts.try_lock() {
            release(&mut map, ip);
            return;
        }
        let counts = Arc::clone(&self.counts);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut map = counts.lock().await;
                release(&mut map, ip);
            });
        }
    }
}

fn release(map: &mut HashMap<IpAddr, usize>, ip: IpAddr) {
    if let Some(count) = map.get_mut(&ip) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(&ip);
        }
    }
}
