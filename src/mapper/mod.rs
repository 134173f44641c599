//! # Mapper Module
//!
//! The two type-keyed lookup tables at the heart of the engine:
//!
//! - **Argument mappers** ([`args`]) turn a parameter's declared metadata
//!   into a value extracted from the request. Lookup is by exact parameter
//!   kind; an unregistered kind resolves the argument to null rather than
//!   failing.
//! - **Return-type mappers** ([`returns`]) turn whatever a handler produced
//!   - or threw - into a rendered HTTP response. Lookup walks an ordered
//!   list of structural predicates, first match wins, memoized per concrete
//!   payload type. A universal fallback guarantees resolution never fails.
//!
//! The asymmetry is deliberate and preserved from the system this engine
//! models: argument lookup consults only the first annotation on a
//! parameter, while return lookup takes the first *matching* entry.

pub mod args;
pub mod returns;

pub use args::{
    buffered_body, ArgumentMapper, ArgumentMapperRegistry, ParamDecl, ParamKind, ParamSpec,
};
pub use returns::{
    HeaderVec, Outcome, OutcomeKind, Response, ReturnMapper, ReturnMapperRegistry,
    ReturnMapperRegistryBuilder, MAX_INLINE_HEADERS,
};
