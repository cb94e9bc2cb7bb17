//! Module to share types for integration tests.
//!
//! Each integration test runs the client against a [`MockTracker`] and one
//! or more [`MockPeer`]s listening on localhost, so the whole path from the
//! metainfo to the bytes of the file is exercised over real sockets.
#![allow(dead_code)]

pub mod peer;
pub mod tracker;

pub use peer::*;
pub use tracker::*;

use bendy::encoding::{
    AsString, Error as EncodingError, SingleItemEncoder, ToBencode,
};
use pezzo::{config::Config, metainfo::MetaInfo};
use rand::RngCore;

pub struct Info {
    pub length: i64,
    pub name: String,
    pub piece_length: i64,
    pub pieces: Vec<u8>,
}

pub struct Torrent {
    pub announce: String,
    pub info: Info,
}

impl ToBencode for Info {
    const MAX_DEPTH: usize = 2;

    fn encode(
        &self,
        encoder: SingleItemEncoder,
    ) -> Result<(), EncodingError> {
        encoder.emit_dict(|mut e| {
            e.emit_pair(b"length", self.length)?;
            e.emit_pair(b"name", &self.name)?;
            e.emit_pair(b"piece length", self.piece_length)?;
            e.emit_pair(b"pieces", AsString(&self.pieces))
        })
    }
}

impl ToBencode for Torrent {
    const MAX_DEPTH: usize = 3;

    fn encode(
        &self,
        encoder: SingleItemEncoder,
    ) -> Result<(), EncodingError> {
        encoder.emit_dict(|mut e| {
            e.emit_pair(b"announce", &self.announce)?;
            e.emit_pair(b"info", &self.info)
        })
    }
}

/// A file and the metainfo that describes it.
pub struct Fixture {
    pub data: Vec<u8>,
    pub raw: Vec<u8>,
    pub meta: MetaInfo,
}

impl Fixture {
    /// Random file of `length` bytes, announced to `announce`.
    pub fn new(announce: &str, length: usize, piece_length: usize) -> Self {
        let mut data = vec![0u8; length];
        rand::thread_rng().fill_bytes(&mut data);

        let pieces = data
            .chunks(piece_length)
            .flat_map(|piece| sha1_smol::Sha1::from(piece).digest().bytes())
            .collect();

        let torrent = Torrent {
            announce: announce.to_owned(),
            info: Info {
                length: length as i64,
                name: "sample.txt".to_owned(),
                piece_length: piece_length as i64,
                pieces,
            },
        };

        let raw = torrent.to_bencode().expect("torrent encodes");
        let meta = MetaInfo::from_bytes(&raw).expect("torrent is valid");

        Self { data, raw, meta }
    }

    pub fn piece(&self, index: usize) -> &[u8] {
        let piece_length = self.meta.piece_length as usize;
        let start = index * piece_length;
        let end = (start + piece_length).min(self.data.len());
        &self.data[start..end]
    }
}

/// Configuration that never reads the user's config file and does not
/// wait forever on a broken peer.
pub fn test_config() -> Config {
    Config { peer_timeout: Some(5), ..Default::default() }
}
