//! Async HTTP server: tokio + hyper. Converts each request into a `RequestContext`,
//! calls the `HttpApplication` and writes the `Response` back.
//! Host/port: env HOST/PORT and --host/--port arguments (arguments win).

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::app::{App, HttpApplication};
use crate::{CoreError, RequestContext, Response};

/// Serve `app` until Ctrl-C. Blocks the calling thread.
pub fn run(app: App, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run_with(Arc::new(app), host, port)
}

/// Serve any [`HttpApplication`] until Ctrl-C on a multi-threaded runtime.
pub fn run_with(
    app: Arc<dyn HttpApplication>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", host, port);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let listener = rt.block_on(TcpListener::bind(&addr))?;
    rt.block_on(serve(app, listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
        }
    }))
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    app: Arc<dyn HttpApplication>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()>,
{
    tracing::info!(addr = %listener.local_addr()?, "listening");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                return Ok(());
            }
            accept_result = listener.accept() => {
                let (stream, peer) = match accept_result {
                    Ok(x) => x,
                    Err(e) => {
                        tracing::error!(error = %e, "accept error");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let app = Arc::clone(&app);
                tokio::task::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let app = Arc::clone(&app);
                        async move { handle_hyper(app, req).await }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        tracing::error!(%peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }
}

async fn handle_hyper(
    app: Arc<dyn HttpApplication>,
    req: Request<hyper::body::Incoming>,
) -> Result<HyperResponse<Full<Bytes>>, std::convert::Infallible> {
    let ctx = match hyper_request_to_context(req).await {
        Ok(ctx) => ctx,
        Err(e) => return Ok(to_hyper(Response::from_error(&e))),
    };
    Ok(to_hyper(app.call(ctx).await))
}

async fn hyper_request_to_context(
    req: Request<hyper::body::Incoming>,
) -> Result<RequestContext, CoreError> {
    let method = req.method().to_string();
    let path = req.uri().path().trim_start_matches('/').to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| CoreError::bad_request(e.to_string()))?
        .to_bytes();
    Ok(RequestContext {
        method,
        path,
        headers,
        body: body.to_vec(),
        ..RequestContext::default()
    })
}

fn to_hyper(response: Response) -> HyperResponse<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HyperResponse::builder().status(status);
    if let Some(content_type) = &response.content_type {
        builder = builder.header("Content-Type", content_type.as_str());
    }
    match builder.body(Full::new(Bytes::from(response.body))) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "failed to build response");
            let mut fallback = HyperResponse::new(Full::new(Bytes::new()));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}

/// Reads host and port: first env HOST/PORT, then --host/--port arguments (they override env).
pub fn host_port_from_env_and_args(default_host: &str, default_port: u16) -> (String, u16) {
    host_port_from(
        std::env::var("HOST").ok(),
        std::env::var("PORT").ok(),
        std::env::args().skip(1),
        default_host,
        default_port,
    )
}

fn host_port_from(
    env_host: Option<String>,
    env_port: Option<String>,
    args: impl IntoIterator<Item = String>,
    default_host: &str,
    default_port: u16,
) -> (String, u16) {
    let mut host = env_host.unwrap_or_else(|| default_host.to_string());
    let mut port = env_port
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_port);
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" => {
                if let Some(value) = args.next() {
                    host = value;
                }
            }
            "--port" => {
                if let Some(p) = args.next().and_then(|value| value.parse().ok()) {
                    port = p;
                }
            }
            _ => {}
        }
    }
    (host, port)
}
