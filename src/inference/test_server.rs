//! In-process HTTP/1.1 server for client tests.
//!
//! Writes raw responses over a `TcpListener` so tests control exactly where
//! network chunk boundaries fall and how the connection ends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Delay between streamed body chunks so each arrives as its own read.
const CHUNK_GAP: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// How a chunked response ends after its last data chunk.
#[derive(Debug, Clone, Copy)]
pub enum StreamEnd {
    /// Send the terminating zero-length chunk.
    Complete,
    /// Drop the socket without terminating the body.
    Abort,
    /// Keep the connection open until the client closes it.
    HoldOpen,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Full { status: u16, body: String },
    Stream { chunks: Vec<Vec<u8>>, end: StreamEnd },
    /// Send error headers declaring a longer body than `partial_body`, then
    /// stall until the client hangs up.
    StalledError {
        status: u16,
        declared_len: usize,
        partial_body: String,
    },
    /// Read the request, never answer, wait for the client to hang up.
    Silent,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Full {
            status,
            body: body.to_string(),
        }
    }

    pub fn stream(chunks: Vec<Vec<u8>>, end: StreamEnd) -> Self {
        Reply::Stream { chunks, end }
    }
}

type Handler = dyn Fn(&CapturedRequest) -> Reply + Send + Sync;

pub struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    disconnects: mpsc::UnboundedReceiver<()>,
}

impl MockServer {
    /// Bind to an ephemeral port and answer every request with `handler`.
    pub async fn start<H>(handler: H) -> Self
    where
        H: Fn(&CapturedRequest) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (disconnect_tx, disconnects) = mpsc::unbounded_channel();

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let log = log.clone();
                let disconnect_tx = disconnect_tx.clone();
                tokio::spawn(async move {
                    serve(socket, handler, log, disconnect_tx).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            disconnects,
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("request log").len()
    }

    /// Resolves once a held-open connection sees the client close it.
    pub async fn wait_for_disconnect(&mut self) {
        self.disconnects.recv().await;
    }
}

async fn serve(
    mut socket: TcpStream,
    handler: Arc<Handler>,
    log: Arc<Mutex<Vec<CapturedRequest>>>,
    disconnect_tx: mpsc::UnboundedSender<()>,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let reply = handler(&request);
    log.lock().expect("request log").push(request);

    match reply {
        Reply::Full { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reason_phrase(status),
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::Stream { chunks, end } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(&chunk);
                frame.extend_from_slice(b"\r\n");
                if socket.write_all(&frame).await.is_err() || socket.flush().await.is_err() {
                    return;
                }
                tokio::time::sleep(CHUNK_GAP).await;
            }
            match end {
                StreamEnd::Complete => {
                    let _ = socket.write_all(b"0\r\n\r\n").await;
                    let _ = socket.shutdown().await;
                }
                StreamEnd::Abort => drop(socket),
                StreamEnd::HoldOpen => {
                    wait_for_eof(&mut socket).await;
                    let _ = disconnect_tx.send(());
                }
            }
        }
        Reply::StalledError {
            status,
            declared_len,
            partial_body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {declared_len}\r\n\r\n",
                reason_phrase(status),
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(partial_body.as_bytes()).await;
            let _ = socket.flush().await;
            wait_for_eof(&mut socket).await;
            let _ = disconnect_tx.send(());
        }
        Reply::Silent => {
            wait_for_eof(&mut socket).await;
            let _ = disconnect_tx.send(());
        }
    }
}

async fn wait_for_eof(socket: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

/// Read one request: headers, then `Content-Length` bytes of body.
async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    let body = String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();

    Some(CapturedRequest { method, path, body })
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
