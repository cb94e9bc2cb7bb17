//! A remote peer in the network that we download data from.
mod download;
mod types;

// re-exports
pub use types::*;

use std::{future::Future, net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, time::timeout};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::Error,
    metainfo::InfoHash,
    tcp_wire::{Core, CoreCodec, Handshake, HandshakeCodec},
};

/// A connection to a remote peer, after a successful handshake.
///
/// Messages are read and written strictly in order, one at a time.
pub struct Peer {
    /// The ID that the peer sent in its handshake.
    pub id: PeerId,

    pub addr: SocketAddr,

    /// The peer is choking the client. Every connection starts choked.
    pub peer_choking: bool,

    /// Client is interested in downloading from peer.
    pub am_interested: bool,

    stream: Framed<TcpStream, CoreCodec>,

    /// How long to wait for each message, forever if `None`.
    timeout: Option<Duration>,
}

/// Await `fut`, failing with [`Error::Timeout`] if it takes longer than
/// `duration`.
async fn deadline<F: Future>(
    duration: Option<Duration>,
    fut: F,
) -> Result<F::Output, Error> {
    match duration {
        Some(duration) => {
            timeout(duration, fut).await.map_err(|_| Error::Timeout)
        }
        None => Ok(fut.await),
    }
}

impl Peer {
    /// Connect to the peer and exchange handshakes, the connection is then
    /// ready to send and receive core messages.
    pub async fn handshake(
        addr: SocketAddr,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let socket = deadline(timeout, TcpStream::connect(addr)).await??;
        let mut socket = Framed::new(socket, HandshakeCodec);

        debug!("{addr} sending outbound handshake");

        let ours = Handshake::new(info_hash.clone(), peer_id.clone());
        socket.send(ours.clone()).await?;

        let theirs = match deadline(timeout, socket.next()).await? {
            Some(Ok(handshake)) => handshake,
            Some(Err(e)) => {
                return Err(Error::HandshakeFailed(e.to_string()));
            }
            None => {
                return Err(Error::HandshakeFailed(
                    "peer closed the connection during the handshake".into(),
                ));
            }
        };

        if !ours.validate(&theirs) {
            return Err(Error::HandshakeFailed(
                "the handshake received is not valid".into(),
            ));
        }

        info!("{addr} handshake with peer {}", theirs.peer_id);

        // the read buffer is kept, the peer may have sent its first message
        // right after the handshake
        let stream = socket.map_codec(|_| CoreCodec);

        Ok(Self {
            id: theirs.peer_id,
            addr,
            peer_choking: true,
            am_interested: false,
            stream,
            timeout,
        })
    }

    /// Handshake with the peer and discard the first message that it sends,
    /// which is usually the bitfield. A choke or unchoke sent in its place
    /// is still taken into account.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let mut peer =
            Self::handshake(addr, info_hash, peer_id, timeout).await?;
        peer.recv().await?;
        Ok(peer)
    }

    /// Try to [`connect`](Self::connect) to each address in order, returning
    /// the first peer that accepts. Each address is tried once.
    pub async fn connect_any(
        addrs: &[SocketAddr],
        info_hash: &InfoHash,
        config: &Config,
    ) -> Result<Self, Error> {
        let peer_id = config.peer_id()?;
        let timeout = config.peer_timeout();
        let attempts = config.max_peer_attempts.unwrap_or(addrs.len());

        for addr in addrs.iter().take(attempts) {
            match Self::connect(*addr, info_hash, &peer_id, timeout).await {
                Ok(peer) => return Ok(peer),
                Err(e) => warn!("{addr} skipping peer: {e}"),
            }
        }

        Err(Error::NoPeers)
    }

    pub async fn send(&mut self, msg: Core) -> Result<(), Error> {
        match &msg {
            Core::Request(info) => debug!(
                "> request {} {} {}",
                info.index, info.begin, info.len
            ),
            msg => debug!("> {msg:?}"),
        }
        self.stream.send(msg).await
    }

    /// Wait for the next message of the peer, keeping track of the choke
    /// state.
    pub async fn recv(&mut self) -> Result<Core, Error> {
        let msg = match deadline(self.timeout, self.stream.next()).await? {
            Some(msg) => msg?,
            None => return Err(Error::PeerClosedSocket),
        };

        match &msg {
            Core::KeepAlive => debug!("< keepalive"),
            Core::Choke => {
                debug!("< choke");
                self.peer_choking = true;
            }
            Core::Unchoke => {
                debug!("< unchoke");
                self.peer_choking = false;
            }
            Core::Bitfield(bitfield) => {
                debug!("< bitfield len: {}", bitfield.len())
            }
            Core::Piece(block) => debug!(
                "< piece {} {} {}",
                block.index,
                block.begin,
                block.block.len()
            ),
            msg => debug!("< {msg:?}"),
        }

        Ok(msg)
    }
}
