//! # Dispatcher Module
//!
//! The orchestrator that ties the lookup tables together. For each
//! accepted request the dispatcher resolves the route, runs its filters,
//! resolves its arguments, invokes the handler on a worker coroutine, and
//! hands the outcome - value, error, or captured panic - to return-type
//! resolution behind the completion state machine's CAS gate.
//!
//! ## Request flow
//!
//! 1. Transport opens an async context and calls [`Dispatcher::handle`]
//! 2. The timeout is armed and the work is submitted to the executor -
//!    the transport thread never blocks on handler logic
//! 3. A worker resolves route → filters → arguments → invocation
//! 4. The outcome races any timeout/transport callback through
//!    `CompletionState::try_start`; the winner renders, the loser no-ops
//! 5. The completion guard finalizes the context exactly once
//!
//! ## Error handling
//!
//! Filter and handler errors flow through the same rendering pipeline as
//! successful results, keyed by the failure's concrete type. A renderer
//! failure is logged and the response abandoned - partial bytes may
//! already be on the wire, so there is no second outcome.

mod core;

pub use core::{Dispatcher, DispatcherBuilder};
