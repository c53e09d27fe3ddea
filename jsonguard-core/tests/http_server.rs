//! The hyper server driven over a real socket.

use jsonguard_core::http::serve;
use jsonguard_core::{sync_handler, App, ExpectsJson, GuardConfig, Response};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

fn orders_app() -> App {
    let guard = ExpectsJson::new(GuardConfig::new().schema(json!({
        "type": "object",
        "properties": {"qty": {"type": "integer"}},
        "required": ["qty"]
    })))
    .unwrap();
    let mut app = App::new();
    app.guarded_route(
        &["POST"],
        "orders",
        &guard,
        sync_handler(|ctx| Ok(Response::json(201, ctx.data().unwrap_or(&Value::Null)))),
    );
    app
}

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Value,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn post(addr: SocketAddr, path: &str, body: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");
    let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect();
    RawResponse {
        status,
        headers,
        body: serde_json::from_str(body).unwrap(),
    }
}

#[tokio::test]
async fn guarded_route_over_http() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(Arc::new(orders_app()), listener, async {
        let _ = stopped.await;
    }));

    let created = post(addr, "/orders", r#"{"qty": 2}"#).await;
    assert_eq!(created.status, 201);
    assert_eq!(created.header("content-type"), Some("application/json"));
    assert_eq!(created.body, json!({"qty": 2}));

    let rejected = post(addr, "/orders", r#"{"qty": "#).await;
    assert_eq!(rejected.status, 400);
    assert_eq!(rejected.header("content-type"), Some("application/json"));
    assert_eq!(rejected.body, json!({"error": "Failed to decode JSON object"}));

    let invalid = post(addr, "/orders", r#"{"qty": "two"}"#).await;
    assert_eq!(invalid.status, 400);
    assert_eq!(invalid.body, json!({"error": "'two' is not of type 'integer'"}));

    let missing = post(addr, "/nowhere", "{}").await;
    assert_eq!(missing.status, 404);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
