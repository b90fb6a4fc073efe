// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection instrumentation.
//!
//! Every statement marks itself active on the probe from the moment it holds
//! the gate until the connection hands its result back. An entry that finds
//! another statement already active is counted as an overlap; with the gate
//! working that count stays at zero and the peak stays at one.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Point-in-time counters read from a [`ConnectionProbe`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    /// Statements that reached the connection.
    pub statements: u64,
    /// Highest number of statements observed active on the connection at once.
    pub peak_active: usize,
    /// Entries that found another statement already active.
    pub overlaps: u64,
    /// Callers currently queued on the gate.
    pub waiting: usize,
}

#[derive(Debug, Default)]
pub struct ConnectionProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    statements: AtomicU64,
    overlaps: AtomicU64,
    waiting: AtomicUsize,
}

impl ConnectionProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark a statement active until the returned guard drops.
    pub fn enter(self: &Arc<Self>) -> ActiveGuard {
        let before = self.active.fetch_add(1, Ordering::SeqCst);
        self.peak.fetch_max(before + 1, Ordering::SeqCst);
        self.statements.fetch_add(1, Ordering::Relaxed);
        if before > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
            warn!(active = before + 1, "overlapping statement on the connection");
        }
        ActiveGuard(Arc::clone(self))
    }

    /// Count a caller as waiting for the gate until the returned guard drops.
    pub fn wait(self: &Arc<Self>) -> WaitGuard {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        WaitGuard(Arc::clone(self))
    }

    pub fn snapshot(&self) -> ProbeStats {
        ProbeStats {
            statements: self.statements.load(Ordering::Relaxed),
            peak_active: self.peak.load(Ordering::SeqCst),
            overlaps: self.overlaps.load(Ordering::SeqCst),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }
}

#[must_use]
pub struct ActiveGuard(Arc<ConnectionProbe>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[must_use]
pub struct WaitGuard(Arc<ConnectionProbe>);

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.0.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}
