//! # Bounded Engine Pool
//!
//! ## Purpose
//! Grants exclusive, time-bounded access to one of a fixed set of
//! interchangeable engine instances.
//!
//! ## Design
//! - N instances are created up front; N never changes
//! - A semaphore with N permits gates checkout; waiters are served FIFO
//! - `acquire` gives up after its timeout and reports [`PoolError::Busy`]
//!   instead of queueing without bound
//! - A checkout is a [`PooledEngine`] guard; dropping it puts the engine back
//!   and releases the permit, on every exit path including panics in
//!   [`PooledEngine::run_blocking`]

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool capacity must be > 0")]
    NoEngines,

    #[error("No engine became available within {0:?}")]
    Busy(Duration),

    #[error("The engine pool has been shut down")]
    Closed,

    #[error("Engine task failed: {0}")]
    Failed(String),
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of engines owned by the pool
    pub capacity: usize,
    /// Engines currently free
    pub available: usize,
    /// Successful checkouts
    pub total_checkouts: u64,
    /// Acquisitions rejected after timing out
    pub busy_rejections: u64,
}

#[derive(Debug, Default)]
struct Counters {
    checkouts: AtomicU64,
    busy: AtomicU64,
}

/// Fixed-size pool of engines with exclusive checkout
pub struct EnginePool<E> {
    /// Engines not currently checked out
    slots: Arc<Mutex<Vec<E>>>,

    /// One permit per free engine
    permits: Arc<Semaphore>,

    counters: Arc<Counters>,

    capacity: usize,
}

impl<E: Send + 'static> EnginePool<E> {
    /// Create a pool owning `engines`
    pub fn new(engines: Vec<E>) -> Result<Self, PoolError> {
        if engines.is_empty() {
            return Err(PoolError::NoEngines);
        }

        let capacity = engines.len();
        Ok(Self {
            slots: Arc::new(Mutex::new(engines)),
            permits: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(Counters::default()),
            capacity,
        })
    }

    /// Check out an engine, waiting at most `timeout`
    ///
    /// A timed-out call leaves the pool exactly as it found it; the permit
    /// future is dropped before it can be granted.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledEngine<E>, PoolError> {
        let permit = match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                self.counters.busy.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::Busy(timeout));
            }
        };

        let engine = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        match engine {
            Some(engine) => {
                self.counters.checkouts.fetch_add(1, Ordering::Relaxed);
                Ok(PooledEngine {
                    engine: Some(engine),
                    slots: Arc::clone(&self.slots),
                    _permit: permit,
                })
            }
            None => {
                // Permits and free engines always move together, so this only
                // happens if an engine was leaked; treat the pool as unusable.
                tracing::error!("Engine pool granted a permit with no free engine");
                Err(PoolError::Closed)
            }
        }
    }

    /// Shut the pool down; current and future waiters get [`PoolError::Closed`]
    ///
    /// Engines already checked out are still returned when their guards drop.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of engines free right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            available: self.available(),
            total_checkouts: self.counters.checkouts.load(Ordering::Relaxed),
            busy_rejections: self.counters.busy.load(Ordering::Relaxed),
        }
    }
}

/// Checked-out engine; returned to the pool when dropped
pub struct PooledEngine<E> {
    /// Always `Some` until drop
    engine: Option<E>,

    slots: Arc<Mutex<Vec<E>>>,

    /// Released after the engine is back in `slots`
    _permit: OwnedSemaphorePermit,
}

impl<E: Send + 'static> PooledEngine<E> {
    /// Run `f` with exclusive use of the engine on the blocking thread pool
    ///
    /// The guard travels with the closure, so the engine is returned even if
    /// the caller stops waiting or `f` panics.
    pub async fn run_blocking<R, F>(self, f: F) -> Result<R, PoolError>
    where
        F: FnOnce(&mut E) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = self;
        tokio::task::spawn_blocking(move || f(&mut *guard))
            .await
            .map_err(|e| PoolError::Failed(e.to_string()))
    }
}

impl<E> Deref for PooledEngine<E> {
    type Target = E;

    fn deref(&self) -> &E {
        match self.engine.as_ref() {
            Some(engine) => engine,
            None => unreachable!("pooled engine used after release"),
        }
    }
}

impl<E> DerefMut for PooledEngine<E> {
    fn deref_mut(&mut self) -> &mut E {
        match self.engine.as_mut() {
            Some(engine) => engine,
            None => unreachable!("pooled engine used after release"),
        }
    }
}

impl<E> Drop for PooledEngine<E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(engine);
        }
        // `_permit` is dropped after this body runs
    }
}
