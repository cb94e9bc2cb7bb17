//! Mock of an HTTP tracker.
//!
//! Answers every request with the same status and body, and forwards the
//! request target (path and query) to the test.
use std::net::SocketAddr;

use pezzo::error::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

pub struct MockTracker {
    listener: TcpListener,
    status: &'static str,
    body: Vec<u8>,
    tx: mpsc::UnboundedSender<String>,
}

impl MockTracker {
    pub async fn new(
        status: &'static str,
        body: Vec<u8>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self { listener, status, body, tx }, rx))
    }

    /// A tracker that returns `peers` in a compact peer list.
    pub async fn with_peers(
        peers: &[SocketAddr],
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), Error> {
        Self::new("200 OK", compact_response(peers)).await
    }

    /// Replace the body of the responses, when the peers are only known
    /// after the announce URL.
    pub fn respond_with(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn announce_url(&self) -> Result<String, Error> {
        Ok(format!("http://{}/announce", self.listener.local_addr()?))
    }

    pub async fn run(self) -> Result<(), Error> {
        loop {
            let (socket, _) = self.listener.accept().await?;
            let _ = self.handle_request(socket).await;
        }
    }

    async fn handle_request(&self, mut socket: TcpStream) -> Result<(), Error> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::PeerClosedSocket);
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        // GET <target> HTTP/1.1
        let request = String::from_utf8_lossy(&buf);
        let target = request
            .lines()
            .next()
            .and_then(|line| line.split(' ').nth(1))
            .unwrap_or_default()
            .to_owned();
        let _ = self.tx.send(target);

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: \
             {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.body.len()
        );
        socket.write_all(head.as_bytes()).await?;
        socket.write_all(&self.body).await?;
        socket.shutdown().await?;

        Ok(())
    }
}

/// Bencoded announce response with a compact peer list.
pub fn compact_response(peers: &[SocketAddr]) -> Vec<u8> {
    let mut compact = Vec::with_capacity(peers.len() * 6);

    for peer in peers {
        let SocketAddr::V4(peer) = peer else {
            panic!("only ipv4 peers can be compact");
        };
        compact.extend_from_slice(&peer.ip().octets());
        compact.extend_from_slice(&peer.port().to_be_bytes());
    }

    let mut body =
        format!("d8:intervali60e5:peers{}:", compact.len()).into_bytes();
    body.extend_from_slice(&compact);
    body.push(b'e');
    body
}
