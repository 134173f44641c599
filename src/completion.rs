//! # Completion Module
//!
//! The three-state machine that makes request completion exactly-once.
//!
//! Every request context carries a [`CompletionState`]: OPEN → STARTED →
//! COMPLETED, with both transitions performed as atomic compare-and-set
//! operations. A worker finishing normally and a transport timeout firing
//! at the same moment both attempt OPEN→STARTED; whichever wins proceeds to
//! render, the loser observes a failed CAS and takes a no-op path. Only the
//! winner constructs a [`CompletionGuard`], whose `Drop` impl finalizes the
//! context - so finalization happens exactly once, even when the render
//! step errors or panics.

use crate::context::RequestContext;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const OPEN: u8 = 0;
const STARTED: u8 = 1;
const COMPLETED: u8 = 2;

/// Lifecycle phase of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPhase {
    /// Initial state: no outcome has been accepted yet
    Open,
    /// A completion attempt won the CAS and is rendering
    Started,
    /// Terminal state: the context has been finalized
    Completed,
}

/// Atomic OPEN → STARTED → COMPLETED state machine.
///
/// The transition counters exist so tests can assert the exactly-once
/// property directly: under a race, `start_attempts` exceeds `starts_won`,
/// and `completions` never exceeds one.
#[derive(Debug)]
pub struct CompletionState {
    phase: AtomicU8,
    start_attempts: AtomicU64,
    starts_won: AtomicU64,
    completions: AtomicU64,
}

impl CompletionState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(OPEN),
            start_attempts: AtomicU64::new(0),
            starts_won: AtomicU64::new(0),
            completions: AtomicU64::new(0),
        }
    }

    /// Attempt the OPEN→STARTED transition.
    ///
    /// Returns `true` for exactly one caller per context; every other
    /// caller - however the race interleaves - gets `false` and must treat
    /// its outcome as lost.
    pub fn try_start(&self) -> bool {
        self.start_attempts.fetch_add(1, Ordering::Relaxed);
        let won = self
            .phase
            .compare_exchange(OPEN, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.starts_won.fetch_add(1, Ordering::Relaxed);
        }
        won
    }

    /// Attempt the STARTED→COMPLETED transition.
    ///
    /// Only meaningful from the start winner's guard; returns `false` if
    /// the context was never started or is already completed.
    pub fn try_complete(&self) -> bool {
        let won = self
            .phase
            .compare_exchange(STARTED, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.completions.fetch_add(1, Ordering::Relaxed);
        }
        won
    }

    pub fn phase(&self) -> CompletionPhase {
        match self.phase.load(Ordering::Acquire) {
            OPEN => CompletionPhase::Open,
            STARTED => CompletionPhase::Started,
            _ => CompletionPhase::Completed,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase() == CompletionPhase::Completed
    }

    /// Total OPEN→STARTED attempts, winners and losers both.
    pub fn start_attempts(&self) -> u64 {
        self.start_attempts.load(Ordering::Relaxed)
    }

    /// OPEN→STARTED transitions that won the CAS.
    pub fn starts_won(&self) -> u64 {
        self.starts_won.load(Ordering::Relaxed)
    }

    /// STARTED→COMPLETED transitions that won the CAS.
    pub fn completions(&self) -> u64 {
        self.completions.load(Ordering::Relaxed)
    }
}

impl Default for CompletionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped finalizer held by the completion winner while rendering.
///
/// Dropping the guard - on the normal path, after a render error, or while
/// unwinding from a render panic - marks the context COMPLETED, clears its
/// property map, and releases the transport's asynchronous context.
pub struct CompletionGuard {
    ctx: Arc<RequestContext>,
}

impl CompletionGuard {
    /// Enter the guarded section.
    ///
    /// Must only be called after winning [`CompletionState::try_start`];
    /// the dispatcher is the sole caller.
    pub(crate) fn new(ctx: Arc<RequestContext>) -> Self {
        Self { ctx }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.ctx.completion().try_complete() {
            self.ctx.clear_properties();
            self.ctx.async_context().complete();
            debug!(
                request_id = %self.ctx.id(),
                age_ms = self.ctx.age().as_millis() as u64,
                "Request context finalized"
            );
        }
    }
}
