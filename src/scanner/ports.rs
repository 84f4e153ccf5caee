use crate::utils::{Result, ScanError};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Fixed set of local ports (`base..base+count`) shared by checks that run a
/// local proxy. Each port is held by at most one lease at a time.
#[derive(Debug, Clone)]
pub struct PortPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<u16>>,
    returned: Notify,
    capacity: usize,
}

impl PoolInner {
    fn take(&self) -> Option<u16> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }
}

impl PortPool {
    pub fn new(base: u16, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(ScanError::Config(
                "port pool needs at least one port".to_string(),
            ));
        }
        let last = u64::from(base) + count as u64 - 1;
        if last > u64::from(u16::MAX) {
            return Err(ScanError::Config(format!(
                "port range starting at {base} with {count} ports exceeds 65535"
            )));
        }

        // Reversed so the lowest port is handed out first.
        let free: Vec<u16> = (0..count).rev().map(|i| base + i as u16).collect();

        Ok(Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                returned: Notify::new(),
                capacity: count,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Ports not currently leased.
    pub fn available(&self) -> usize {
        self.inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits until a port is free and leases it. The port returns to the pool
    /// when the lease is dropped.
    pub async fn acquire(&self) -> PortLease {
        loop {
            // A return racing this check leaves a stored notification behind.
            let returned = self.inner.returned.notified();
            if let Some(port) = self.inner.take() {
                return PortLease {
                    port,
                    pool: Arc::clone(&self.inner),
                };
            }
            returned.await;
        }
    }
}

/// Exclusive use of one port from a [`PortPool`].
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    pool: Arc<PoolInner>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.port);
        self.pool.returned.notify_one();
    }
}
