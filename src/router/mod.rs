//! # Router Module
//!
//! Route declarations, the immutable [`Invokable`] bindings built from
//! them, and the method-keyed [`RoutingTable`] the dispatcher resolves
//! against.
//!
//! ## Overview
//!
//! Routes are registered explicitly in code at startup - there is no
//! runtime scanning. The builder validates each route's pattern through
//! its matcher, skipping (and logging) malformed ones, then freezes the
//! table: a multimap from HTTP method to the invokables registered for
//! it, in declaration order.
//!
//! ## Lookup semantics
//!
//! Resolution walks the method's list in declaration order and the first
//! matching pattern wins. Overlapping patterns are a configuration
//! concern the table does not try to disambiguate - declare the more
//! specific pattern first. A path served only under other methods
//! resolves to "method not allowed"; otherwise "not found".

mod core;

pub use core::{Invokable, Route, RouteResolution, RoutingTable, RoutingTableBuilder};
