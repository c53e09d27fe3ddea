//! Handler type shared by the app, the router and guards.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::{CoreError, RequestContext, Response};

/// Async request handler. Owns its `RequestContext`, so request state never
/// outlives or leaks out of the request it belongs to.
pub type Handler =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<Response, CoreError>> + Send + Sync>;

/// Adapt an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, CoreError>> + Send + 'static,
{
    Arc::new(move |ctx| -> BoxFuture<'static, Result<Response, CoreError>> { Box::pin(f(ctx)) })
}

/// Adapt a synchronous closure into a [`Handler`]; it runs inline on the calling task.
pub fn sync_handler<F>(f: F) -> Handler
where
    F: Fn(&RequestContext) -> Result<Response, CoreError> + Send + Sync + 'static,
{
    Arc::new(move |ctx| -> BoxFuture<'static, Result<Response, CoreError>> {
        Box::pin(std::future::ready(f(&ctx)))
    })
}
