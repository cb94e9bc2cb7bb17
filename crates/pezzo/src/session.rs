//! Download of one torrent: announce to the tracker once, then download
//! pieces one after the other, each one from a new connection.
use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::{
    config::Config, error::Error, metainfo::MetaInfo, peer::Peer,
    tracker::Tracker,
};

pub struct Session {
    pub meta: MetaInfo,
    pub config: Config,
    tracker: Tracker,
    /// Peers returned by the last announce.
    peers: Vec<SocketAddr>,
}

impl Session {
    pub fn new(meta: MetaInfo, config: Config) -> Result<Self, Error> {
        let tracker = Tracker::new(&config)?;
        Ok(Self { meta, config, tracker, peers: Vec::new() })
    }

    /// Ask the tracker for peers, replacing the ones known.
    pub async fn announce(&mut self) -> Result<&[SocketAddr], Error> {
        let res = self.tracker.announce(&self.meta).await?;
        self.peers = res.peers;
        Ok(&self.peers)
    }

    pub fn peers(&self) -> &[SocketAddr] {
        &self.peers
    }

    /// Connect to the first peer that accepts a handshake, announcing first
    /// if no peer is known yet.
    pub async fn connect(&mut self) -> Result<Peer, Error> {
        if self.peers.is_empty() {
            self.announce().await?;
        }
        Peer::connect_any(&self.peers, &self.meta.info_hash, &self.config)
            .await
    }

    /// Download the piece `index` from a new connection, the connection is
    /// closed afterwards.
    pub async fn download_piece(
        &mut self,
        index: usize,
    ) -> Result<Vec<u8>, Error> {
        // fail before touching the network
        self.meta.piece_len(index)?;

        let mut peer = self.connect().await?;

        if self.config.verify_pieces {
            peer.download_verified_piece(&self.meta, index).await
        } else {
            peer.download_piece(&self.meta, index).await
        }
    }

    /// Download every piece in order and write it to `out` as soon as it
    /// arrives. Returns the number of bytes written.
    pub async fn download_to<W>(&mut self, out: &mut W) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin,
    {
        let count = self.meta.pieces_count();
        let mut written = 0;

        for index in 0..count {
            let piece = self.download_piece(index).await?;
            out.write_all(&piece).await?;
            written += piece.len() as u64;
            info!("{}/{count} pieces downloaded", index + 1);
        }

        out.flush().await?;

        Ok(written)
    }

    /// Download every piece in order, returning the content of the file.
    pub async fn download(&mut self) -> Result<Vec<u8>, Error> {
        let mut file = Vec::new();
        self.download_to(&mut file).await?;
        Ok(file)
    }
}
