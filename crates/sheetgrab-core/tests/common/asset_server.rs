//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed routes matched by prefix of the request target (path plus
//! query); the first matching route wins, anything else is 404. Every request
//! target is recorded.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl Route {
    pub fn ok(prefix: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(prefix, 200, body)
    }

    pub fn with_status(prefix: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
            status,
            body: body.into(),
        }
    }
}

pub struct AssetServer {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:12345`.
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl AssetServer {
    /// Binds a port, builds the routes from the base URL and serves them in a
    /// background thread until the process exits.
    pub fn start(routes: impl FnOnce(&str) -> Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let base = format!("http://127.0.0.1:{}", port);
        let routes = Arc::new(routes(&base));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let seen = Arc::clone(&seen);
                thread::spawn(move || handle(stream, &routes, &seen));
            }
        });
        Self { base, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(mut stream: TcpStream, routes: &[Route], seen: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    seen.lock().unwrap().push(target.clone());

    let (status, body): (u16, &[u8]) = routes
        .iter()
        .find(|r| target.starts_with(&r.prefix))
        .map(|r| (r.status, r.body.as_slice()))
        .unwrap_or((404, b"not found"));
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}
