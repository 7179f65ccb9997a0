//! Canned-response API server used by the client tests.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Exchange {
    responses: VecDeque<(u16, String)>,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<Exchange>>;

pub(crate) struct StubServer {
    pub base_url: String,
    exchange: Shared,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Answers each request with the next canned `(status, body)` pair, in
    /// order, whatever the route.
    pub async fn start(responses: Vec<(u16, &str)>) -> Self {
        let exchange: Shared = Arc::new(Mutex::new(Exchange {
            responses: responses
                .into_iter()
                .map(|(status, body)| (status, body.to_string()))
                .collect(),
            requests: Vec::new(),
        }));

        let app = Router::new().fallback(answer).with_state(exchange.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            exchange,
            handle,
        }
    }

    /// Every request received, rendered as `METHOD /path?query HTTP/x`,
    /// lowercase `name: value` header lines, a blank line and the body.
    pub async fn finish(self) -> Vec<String> {
        self.handle.abort();
        std::mem::take(&mut self.exchange.lock().await.requests)
    }
}

async fn answer(State(exchange): State<Shared>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap();

    let mut text = format!("{} {} {:?}\r\n", parts.method, parts.uri, parts.version);
    for (name, value) in &parts.headers {
        text.push_str(&format!("{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes())));
    }
    text.push_str("\r\n");
    text.push_str(&String::from_utf8_lossy(&body));

    let mut exchange = exchange.lock().await;
    exchange.requests.push(text);
    let Some((status, body)) = exchange.responses.pop_front() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no canned response left").into_response();
    };

    let status = StatusCode::from_u16(status).unwrap();
    if body.is_empty() {
        return status.into_response();
    }
    (status, [(header::CONTENT_TYPE, "application/json")], Body::from(body)).into_response()
}
