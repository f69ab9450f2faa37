use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Minimal HTTP/1.1 server for exercising the blocking client in tests.
///
/// Serves connections one at a time on a named thread; the handler sees the
/// request path and headers and decides the reply.
pub(crate) struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub(crate) struct Request {
    pub path: String,
    headers: Vec<(String, String)>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) struct Reply {
    status: u16,
    body: Vec<u8>,
    length: LengthHeader,
    hold: bool,
}

enum LengthHeader {
    Exact,
    Omitted,
    Claimed(usize),
}

impl Reply {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            length: LengthHeader::Exact,
            hold: false,
        }
    }

    /// Success reply without a Content-Length header; the body is delimited
    /// by connection close.
    pub fn ok_unsized(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            length: LengthHeader::Omitted,
            hold: false,
        }
    }

    /// Claims `claimed` bytes but sends only `body` and closes, simulating
    /// a connection dropped mid-transfer.
    pub fn truncated(body: Vec<u8>, claimed: usize) -> Self {
        Self {
            status: 200,
            body,
            length: LengthHeader::Claimed(claimed),
            hold: false,
        }
    }

    /// Claims `claimed` bytes, sends only `body` and then keeps the
    /// connection open without sending more, simulating a stalled upstream.
    /// The connection is released when the server shuts down.
    pub fn stalled(body: Vec<u8>, claimed: usize) -> Self {
        Self {
            status: 200,
            body,
            length: LengthHeader::Claimed(claimed),
            hold: true,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            length: LengthHeader::Exact,
            hold: false,
        }
    }
}

impl TestServer {
    pub fn start<H>(handler: H) -> Self
    where
        H: Fn(&Request) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = shutdown.clone();

        let handle = std::thread::Builder::new()
            .name("test-http".to_string())
            .spawn(move || {
                for conn in listener.incoming() {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let Ok(stream) = conn else { continue };
                    if let Err(e) = serve(stream, &handler, &stop) {
                        eprintln!("test server: {e}");
                    }
                }
            })
            .expect("spawn test server");

        Self {
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        // Unblock the accept loop.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve<H>(stream: TcpStream, handler: &H, shutdown: &AtomicBool) -> std::io::Result<()>
where
    H: Fn(&Request) -> Reply,
{
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    if request_line.trim().is_empty() {
        return Ok(());
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let request = Request { path, headers };
    let reply = handler(&request);

    let mut stream = reader.into_inner();
    let reason = match reply.status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    write!(stream, "HTTP/1.1 {} {}\r\n", reply.status, reason)?;
    write!(stream, "Connection: close\r\n")?;
    match reply.length {
        LengthHeader::Exact => write!(stream, "Content-Length: {}\r\n", reply.body.len())?,
        LengthHeader::Claimed(n) => write!(stream, "Content-Length: {}\r\n", n)?,
        LengthHeader::Omitted => {}
    }
    write!(stream, "\r\n")?;
    stream.write_all(&reply.body)?;
    stream.flush()?;

    if reply.hold {
        while !shutdown.load(Ordering::Acquire) {
            std::thread::sleep(std::time::Duration::from_millis(25));
        }
    }
    Ok(())
}
