//! Peers for integration tests: a hyper HTTP/1 server which records what it
//! receives and answers with a canned reply, and helpers for raw TCP peers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::io::AsyncReadExt as _;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What the server saw for one request.
#[derive(Debug)]
pub struct Observed {
    pub method: http::Method,
    pub uri: http::Uri,
    pub headers: http::HeaderMap,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: &'static str,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: 204,
            headers: Vec::new(),
            body: "",
        }
    }
}

/// An HTTP/1 server on a random local port.
///
/// Replies `204 No Content` until told otherwise with [`MockServer::respond`].
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    reply: Arc<Mutex<Reply>>,
    observed: mpsc::UnboundedReceiver<Observed>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Result<Self, BoxError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let reply = Arc::new(Mutex::new(Reply::default()));
        let (tx, observed) = mpsc::unbounded_channel();

        let task = tokio::spawn(serve(listener, reply.clone(), tx));

        Ok(Self {
            addr,
            reply,
            observed,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn respond(
        &self,
        status: u16,
        headers: &[(&'static str, &'static str)],
        body: &'static str,
    ) -> &Self {
        *self.reply.lock().unwrap() = Reply {
            status,
            headers: headers.to_vec(),
            body,
        };
        self
    }

    /// The next request the server received.
    pub async fn observed(&mut self) -> Observed {
        self.observed.recv().await.expect("server stopped")
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, reply: Arc<Mutex<Reply>>, tx: mpsc::UnboundedSender<Observed>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };

        let reply = reply.clone();
        let tx = tx.clone();
        let service = hyper::service::service_fn(move |req: http::Request<Incoming>| {
            let reply = reply.lock().unwrap().clone();
            let tx = tx.clone();
            async move {
                let (parts, body) = req.into_parts();
                let payload = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(err) => return Err::<http::Response<Full<Bytes>>, hyper::Error>(err),
                };
                let _ = tx.send(Observed {
                    method: parts.method,
                    uri: parts.uri,
                    headers: parts.headers,
                    payload,
                });

                let mut response = http::Response::builder().status(reply.status);
                for (name, value) in reply.headers {
                    response = response.header(name, value);
                }
                let response = response
                    .body(Full::new(Bytes::from_static(reply.body.as_bytes())))
                    .expect("canned reply is a valid response");
                Ok(response)
            }
        });

        tokio::spawn(async move {
            let conn =
                hyper::server::conn::http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            if let Err(err) = conn.await {
                tracing::debug!(%err, "mock server connection error");
            }
        });
    }
}

/// Read from a raw peer until the end of the request head.
pub async fn read_request_head(stream: &mut TcpStream) -> Result<String, BoxError> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];

    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err("peer closed before sending a request".into());
        }
        head.extend_from_slice(&buf[..n]);
    }

    Ok(String::from_utf8(head)?)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
