//! Busy/loading signal.
//!
//! # Design
//! A debounced boolean for a loading scope (a page, a component). A request
//! start arms a timer; only if the timer fires while requests are still in
//! flight does the signal turn active, so fast requests never flash a
//! loading indicator. In-flight requests are counted and the signal goes
//! idle when the last one ends. Every end that brings the count to zero
//! cancels the pending timer, and a generation number guards against a
//! timer that already woke up racing the end event.
//!
//! State is published through a `tokio::sync::watch` channel, which only
//! notifies receivers on real transitions.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::http::NormalizedRequest;
use crate::transport::RequestObserver;

#[derive(Debug, Default)]
struct Pending {
    in_flight: usize,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Inner {
    delay: Duration,
    state: watch::Sender<bool>,
    pending: Mutex<Pending>,
}

impl Inner {
    fn fire(&self, generation: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.generation != generation || pending.in_flight == 0 {
            return;
        }
        pending.timer = None;
        if self.state.send_if_modified(|active| !std::mem::replace(active, true)) {
            tracing::trace!(in_flight = pending.in_flight, "busy signal active");
        }
    }
}

/// Debounced loading state shared by every request of one scope.
#[derive(Debug, Clone)]
pub struct BusySignal {
    inner: Arc<Inner>,
}

impl BusySignal {
    pub fn new(delay: Duration) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                delay,
                state,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.loading_delay)
    }

    pub fn is_active(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every idle/active transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Record a request start. Must be called from within a tokio runtime.
    pub fn request_started(&self, loading: bool) {
        if !loading {
            return;
        }
        let mut pending = self.lock();
        pending.in_flight += 1;
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "busy signal used outside a tokio runtime");
                return;
            }
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let generation = pending.generation;
        let delay = self.inner.delay;
        pending.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation);
            }
        }));
    }

    /// Record a request end.
    pub fn request_ended(&self, loading: bool) {
        if !loading {
            return;
        }
        let mut pending = self.lock();
        pending.in_flight = pending.in_flight.saturating_sub(1);
        if pending.in_flight > 0 {
            return;
        }
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        if self.inner.state.send_if_modified(|active| std::mem::replace(active, false)) {
            tracing::trace!("busy signal idle");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RequestObserver for BusySignal {
    fn request_started(&self, request: &NormalizedRequest) {
        BusySignal::request_started(self, request.loading);
    }

    fn request_ended(&self, request: &NormalizedRequest) {
        BusySignal::request_ended(self, request.loading);
    }
}
