//! # Typed Handler Module
//!
//! Serde-driven sugar over the raw [`Handler`] contract: write a function
//! of a concrete request type, get JSON decoding of merged path/query/body
//! data and JSON encoding of the result for free.
//!
//! Path parameters, query parameters, and the fields of a JSON body (when
//! the route declares a [`ParamSpec::json_body`] parameter in slot 0) are
//! merged into one object and deserialized into the request type. A
//! non-object body lands under a `"body"` key. Decode failure renders 400.
//!
//! [`ParamSpec::json_body`]: crate::mapper::args::ParamSpec::json_body

use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::handler::{Args, Handler};
use crate::mapper::returns::Outcome;
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tracing::debug;

/// The decoded request a typed handler receives.
#[derive(Debug, Clone)]
pub struct TypedRequest<T> {
    /// HTTP method of the request
    pub method: Method,
    /// Request path
    pub path: String,
    /// Merged path/query/body data, decoded into `T`
    pub data: T,
}

/// A handler over decoded request data.
pub trait TypedHandler<TReq, TRes>: Send + Sync {
    fn handle(&self, req: TypedRequest<TReq>) -> TRes;
}

impl<TReq, TRes, F> TypedHandler<TReq, TRes> for F
where
    F: Fn(TypedRequest<TReq>) -> TRes + Send + Sync,
{
    fn handle(&self, req: TypedRequest<TReq>) -> TRes {
        (self)(req)
    }
}

/// Adapt a [`TypedHandler`] into the engine's raw [`Handler`] contract.
pub fn typed<TReq, TRes, H>(handler: H) -> Typed<TReq, TRes, H>
where
    TReq: DeserializeOwned,
    TRes: Serialize,
    H: TypedHandler<TReq, TRes>,
{
    Typed {
        handler,
        _marker: PhantomData,
    }
}

/// The adapter returned by [`typed`].
pub struct Typed<TReq, TRes, H> {
    handler: H,
    _marker: PhantomData<fn(TReq) -> TRes>,
}

impl<TReq, TRes, H> Typed<TReq, TRes, H> {
    fn merged_data(ctx: &RequestContext, args: &Args) -> Value {
        let mut data = Map::new();
        if let Some(params) = ctx.path_params() {
            for (name, value) in params.iter() {
                data.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        for (name, value) in ctx.query_params().iter() {
            data.insert(name.to_string(), Value::String(value.clone()));
        }
        if let Some(body) = args.get(0) {
            match body {
                Value::Object(fields) => {
                    for (name, value) in fields {
                        data.insert(name.clone(), value.clone());
                    }
                }
                other => {
                    data.insert("body".to_string(), other.clone());
                }
            }
        }
        Value::Object(data)
    }
}

impl<TReq, TRes, H> Handler for Typed<TReq, TRes, H>
where
    TReq: DeserializeOwned + Send + Sync + 'static,
    TRes: Serialize + Send + Sync + 'static,
    H: TypedHandler<TReq, TRes>,
{
    fn invoke(&self, ctx: &RequestContext, args: &Args) -> Outcome {
        let data = Self::merged_data(ctx, args);
        let decoded: TReq = match serde_json::from_value(data) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(
                    request_id = %ctx.id(),
                    error = %err,
                    "Typed request decode failed"
                );
                return Outcome::failure(DispatchError::InvalidArgument {
                    message: err.to_string(),
                });
            }
        };
        let response = self.handler.handle(TypedRequest {
            method: ctx.method().clone(),
            path: ctx.path().to_string(),
            data: decoded,
        });
        match serde_json::to_value(response) {
            Ok(value) => Outcome::json(value),
            Err(err) => Outcome::from_error(
                anyhow::Error::from(err).context("failed to serialize typed handler response"),
            ),
        }
    }
}
