use crate::{
    bencode,
    error::Error,
    metainfo::InfoHash,
    peer::PeerId,
};

use super::parse_compact_peer_list;
use std::net::SocketAddr;

/// Query parameters of an HTTP announce.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub compact: u8,
}

impl Request {
    /// The full announce URL. The info hash and peer id are raw bytes, they
    /// are percent-encoded byte by byte.
    pub fn url(&self, announce: &str) -> String {
        let separator = if announce.contains('?') { '&' } else { '?' };

        format!(
            "{announce}{separator}info_hash={}&peer_id={}&port={}&uploaded={}\
             &downloaded={}&left={}&compact={}",
            urlencoding::encode_binary(&self.info_hash.0),
            urlencoding::encode_binary(&self.peer_id.0),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left,
            self.compact,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Seconds that the tracker wants us to wait between announces.
    pub interval: Option<i64>,
    pub peers: Vec<SocketAddr>,
}

impl Response {
    /// Decode the bencoded body of an announce response, with a compact
    /// peer list.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let value = bencode::decode(buf)?;
        let dict = value.as_dict().ok_or_else(|| {
            Error::MalformedEncoding(
                "tracker response is not a dictionary".into(),
            )
        })?;

        if let Some(reason) = dict.get(b"failure reason") {
            let reason = reason
                .as_bytes()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            return Err(Error::TrackerFailure(reason));
        }

        let peers = dict
            .get(b"peers")
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| {
                Error::MalformedEncoding(
                    "tracker response has no compact peer list".into(),
                )
            })?;

        Ok(Self {
            interval: dict.get(b"interval").and_then(|v| v.as_int()),
            peers: parse_compact_peer_list(peers)?,
        })
    }
}
