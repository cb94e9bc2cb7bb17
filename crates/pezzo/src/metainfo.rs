//! Metainfo is a .torrent file with information about the Torrent.
//!
//! Only single-file torrents are supported, the fields that are not needed
//! to download the file are ignored.
use std::{fmt::Display, ops::Deref, ops::Range};

use speedy::{Readable, Writable};

use crate::{
    bencode::{self, Dictionary, Value},
    error::Error,
};

/// SHA-1 of the bencoded `info` dictionary, identifies a torrent in the
/// network.
#[derive(Clone, Default, PartialEq, Eq, Hash, Readable, Writable)]
pub struct InfoHash(pub [u8; 20]);

impl Display for InfoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InfoHash({self})")
    }
}

impl Deref for InfoHash {
    type Target = [u8; 20];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The fields of a metainfo file that are needed to find peers and to
/// download and verify every piece.
#[derive(Debug, PartialEq, Clone)]
pub struct MetaInfo {
    /// URL of the HTTP tracker.
    pub announce: String,

    /// Suggested name of the file.
    pub name: Option<String>,

    /// Total length of the file in bytes.
    pub length: u64,

    /// Length of every piece, except maybe the last one.
    pub piece_length: u64,

    /// SHA-1 of every piece, in order.
    pub pieces: Vec<[u8; 20]>,

    pub info_hash: InfoHash,
}

impl MetaInfo {
    /// Extract the metainfo out of the raw bytes of a .torrent file.
    ///
    /// The info hash is computed over the bytes of the `info` value exactly
    /// as they appear in `raw`, they are never re-encoded.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        let value = bencode::decode(raw)?;
        let root = value.as_dict().ok_or_else(|| {
            Error::MalformedEncoding("metainfo is not a dictionary".into())
        })?;

        let announce = root
            .get(b"announce")
            .ok_or(Error::MissingField("announce"))?
            .as_str()
            .ok_or(Error::InvalidField("announce"))?
            .to_owned();

        let info = root
            .get(b"info")
            .ok_or(Error::MissingField("info"))?
            .as_dict()
            .ok_or(Error::InvalidField("info"))?;

        let length = positive(info, "length")?;
        let piece_length = positive(info, "piece length")?;

        // blocks are requested with u32 offsets
        if piece_length > u32::MAX as u64 {
            return Err(Error::InvalidField("piece length"));
        }

        let pieces = info
            .get(b"pieces")
            .ok_or(Error::MissingField("pieces"))?
            .as_bytes()
            .ok_or(Error::InvalidField("pieces"))?;

        let chunks = pieces.chunks_exact(20);
        if !chunks.remainder().is_empty() {
            return Err(Error::InvalidField("pieces"));
        }

        let pieces: Vec<[u8; 20]> = chunks
            .map(|hash| {
                let mut buf = [0u8; 20];
                buf.copy_from_slice(hash);
                buf
            })
            .collect();

        if pieces.len() as u64 != length.div_ceil(piece_length) {
            return Err(Error::InvalidField("pieces"));
        }

        let name = info.get(b"name").and_then(Value::as_str).map(String::from);

        let info_hash = InfoHash(
            sha1_smol::Sha1::from(&raw[info_range(raw)?]).digest().bytes(),
        );

        Ok(Self { announce, name, length, piece_length, pieces, info_hash })
    }

    pub fn pieces_count(&self) -> usize {
        self.pieces.len()
    }

    /// Length in bytes of the piece `index`. Only the last piece may be
    /// shorter than `piece_length`, and it is a full piece when the file
    /// length is a multiple of `piece_length`.
    pub fn piece_len(&self, index: usize) -> Result<u32, Error> {
        let count = self.pieces_count();

        if index >= count {
            return Err(Error::PieceOutOfRange(index));
        }

        let len = if index == count - 1 {
            self.length - self.piece_length * (count as u64 - 1)
        } else {
            self.piece_length
        };

        Ok(len as u32)
    }

    pub fn piece_hash(&self, index: usize) -> Result<&[u8; 20], Error> {
        self.pieces.get(index).ok_or(Error::PieceOutOfRange(index))
    }
}

fn positive(dict: &Dictionary, field: &'static str) -> Result<u64, Error> {
    let v = dict
        .get(field.as_bytes())
        .ok_or(Error::MissingField(field))?
        .as_int()
        .ok_or(Error::InvalidField(field))?;

    if v <= 0 {
        return Err(Error::InvalidField(field));
    }

    Ok(v as u64)
}

/// Byte range of the value of the top-level `info` key.
///
/// `raw` must already be known to be a valid dictionary. The keys are walked
/// one by one, so a literal `info` inside another key or value is never
/// mistaken for the real key.
fn info_range(raw: &[u8]) -> Result<Range<usize>, Error> {
    // past the `d`
    let mut pos = 1;
    let mut range = None;

    while raw.get(pos).is_some_and(|b| *b != b'e') {
        let (key, read) = bencode::decode_prefix(&raw[pos..])?;
        pos += read;

        let (_, read) = bencode::decode_prefix(&raw[pos..])?;

        if key.as_bytes() == Some(b"info") {
            range = Some(pos..pos + read);
        }

        pos += read;
    }

    range.ok_or(Error::MissingField("info"))
}
