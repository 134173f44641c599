//! # Filter Module
//!
//! Pre-invocation hooks bound to a route. Filters run in declared order
//! before argument resolution; a filter that returns an error rejects the
//! request, skipping invocation in favor of error rendering. Filters are
//! ordinary components - resolve them from the component registry at
//! wiring time and hand the `Arc` to the route declaration.

use crate::context::RequestContext;

/// A pre-invocation guard for a route.
///
/// Return `Ok(())` to let the request proceed; return an error to reject
/// it. The error becomes the request's outcome and is rendered through
/// return-type resolution like any other failure.
pub trait Filter: Send + Sync {
    fn apply(&self, ctx: &RequestContext) -> anyhow::Result<()>;
}

impl<F> Filter for F
where
    F: Fn(&RequestContext) -> anyhow::Result<()> + Send + Sync,
{
    fn apply(&self, ctx: &RequestContext) -> anyhow::Result<()> {
        (self)(ctx)
    }
}
