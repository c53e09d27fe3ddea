//! App: routes requests to handlers (guarded or not) and turns errors into responses.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::guard::ExpectsJson;
use crate::handler::Handler;
use crate::router::{RouteId, Router};
use crate::{CoreError, RequestContext, Response};

/// Request in, response out. Any server (the built-in hyper one, or another host)
/// converts HTTP into a `RequestContext`, calls `call()` and writes the `Response` back.
#[async_trait]
pub trait HttpApplication: Send + Sync {
    async fn call(&self, req: RequestContext) -> Response;
}

/// Registered routes and their handlers.
pub struct App {
    router: Router,
    handlers: HashMap<RouteId, Handler>,
    next_route_id: u32,
}

impl App {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            handlers: HashMap::new(),
            next_route_id: 0,
        }
    }

    /// Register a handler for one method and path.
    pub fn route(&mut self, method: &str, path: &str, handler: Handler) -> RouteId {
        let id = RouteId(self.next_route_id);
        self.next_route_id += 1;
        self.router.add(method, path, id);
        self.handlers.insert(id, handler);
        id
    }

    /// Register `handler` behind `guard` for each of `methods`.
    pub fn guarded_route(
        &mut self,
        methods: &[&str],
        path: &str,
        guard: &ExpectsJson,
        handler: Handler,
    ) -> Vec<RouteId> {
        let guarded = guard.wrap(handler);
        methods
            .iter()
            .map(|method| self.route(method, path, guarded.clone()))
            .collect()
    }

    /// Dispatch one request. Errors become JSON `{"error": ...}` responses.
    pub async fn handle(&self, ctx: RequestContext) -> Response {
        match self.dispatch(ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(status = e.status_code(), error = %e, "request failed");
                Response::from_error(&e)
            }
        }
    }

    /// Handle a request without an ambient runtime (tests, synchronous hosts).
    /// Builds a current-thread runtime per call. Inside a tokio runtime, where
    /// blocking would panic, it answers 500 instead; use [`App::handle`] there.
    pub fn handle_blocking(&self, ctx: RequestContext) -> Response {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Response::from_error(&CoreError::Handler(
                "handle_blocking called inside an async runtime".into(),
            ));
        }
        match tokio::runtime::Builder::new_current_thread().build() {
            Ok(rt) => rt.block_on(self.handle(ctx)),
            Err(e) => Response::from_error(&CoreError::Handler(e.to_string())),
        }
    }

    async fn dispatch(&self, ctx: RequestContext) -> Result<Response, CoreError> {
        let route_id = self.router.match_route(&ctx.method, &ctx.path).ok_or_else(|| {
            if self.router.has_path(&ctx.path) {
                CoreError::Abort {
                    status: 405,
                    message: format!("method {} not allowed for {}", ctx.method, ctx.path),
                }
            } else {
                CoreError::NotFound(format!("{} {}", ctx.method, ctx.path))
            }
        })?;
        let handler = self
            .handlers
            .get(&route_id)
            .ok_or_else(|| CoreError::NotFound(format!("route_id {:?}", route_id)))?;
        handler(ctx).await
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpApplication for App {
    async fn call(&self, req: RequestContext) -> Response {
        self.handle(req).await
    }
}
