//! A tracker is a server that manages peers and stats of multiple torrents.
//!
//! Only HTTP(S) trackers are supported, with compact peer lists (BEP 23).
pub mod announce;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::{debug, info};

use crate::{config::Config, error::Error, metainfo::MetaInfo, peer::PeerId};

pub struct Tracker {
    client: reqwest::Client,
    pub local_peer_id: PeerId,
    pub port: u16,
}

impl Tracker {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut client = reqwest::Client::builder();

        if let Some(timeout) = config.peer_timeout() {
            client = client.timeout(timeout);
        }

        Ok(Self {
            client: client.build()?,
            local_peer_id: config.peer_id()?,
            port: config.port,
        })
    }

    /// Announce that we are starting to download the torrent, and get the
    /// peers that have it.
    #[tracing::instrument(
        name = "tracker",
        skip_all,
        fields(url = %meta.announce)
    )]
    pub async fn announce(
        &self,
        meta: &MetaInfo,
    ) -> Result<announce::Response, Error> {
        let req = announce::Request {
            info_hash: meta.info_hash.clone(),
            peer_id: self.local_peer_id.clone(),
            port: self.port,
            uploaded: 0,
            downloaded: 0,
            left: meta.length,
            compact: 1,
        };
        debug!("{req:?}");

        let body = self
            .client
            .get(req.url(&meta.announce))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let res = announce::Response::from_bytes(&body)?;

        info!("tracker returned {} peers", res.peers.len());

        Ok(res)
    }
}

/// Support for BEP23, the addresses come in packets of 6 bytes, first 4 for
/// ip and 2 for port.
pub fn parse_compact_peer_list(buf: &[u8]) -> Result<Vec<SocketAddr>, Error> {
    let chunks = buf.chunks_exact(6);
    if !chunks.remainder().is_empty() {
        return Err(Error::TrackerCompactPeerList);
    }

    let peers = chunks
        .map(|hostport| {
            let ip = IpAddr::from(Ipv4Addr::new(
                hostport[0],
                hostport[1],
                hostport[2],
                hostport[3],
            ));
            let port = u16::from_be_bytes([hostport[4], hostport[5]]);
            SocketAddr::new(ip, port)
        })
        .collect();

    Ok(peers)
}
