//! Codec for encoding and decoding handshakes.
//!
//! This has to be a separate codec as the handshake has a different
//! structure than the rest of the messages. Moreover, handshakes may only
//! be sent once at the beginning of a connection, preceding all other
//! messages. Thus, after receiving and sending a handshake the codec
//! should be switched to [`CoreCodec`](super::CoreCodec), but care should be
//! taken not to discard the underlying receive and send buffers.
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use speedy::{BigEndian, Readable, Writable};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use super::PSTR;
use crate::{error::Error, metainfo::InfoHash, peer::PeerId};

#[derive(Debug)]
pub struct HandshakeCodec;

impl Encoder<Handshake> for HandshakeCodec {
    type Error = io::Error;

    fn encode(
        &mut self,
        handshake: Handshake,
        buf: &mut BytesMut,
    ) -> io::Result<()> {
        let Handshake { pstr_len, pstr, reserved, info_hash, peer_id } =
            handshake;

        // protocol length prefix
        debug_assert_eq!(pstr_len, 19);
        buf.put_u8(pstr.len() as u8);

        // we should only be sending the bittorrent protocol string
        debug_assert_eq!(pstr, PSTR);

        // payload
        buf.extend_from_slice(&pstr);
        buf.extend_from_slice(&reserved);
        buf.extend_from_slice(&info_hash.0);
        buf.extend_from_slice(&peer_id.0);

        Ok(())
    }
}

impl Decoder for HandshakeCodec {
    type Item = Handshake;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Handshake>> {
        if buf.is_empty() {
            return Ok(None);
        }

        // peek at the first byte, it is only consumed when the whole
        // handshake is in the buffer. Some peers answer with zeroes.
        let prot_len = buf[0] as usize;
        if prot_len != PSTR.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("handshake starts with {prot_len} instead of 19"),
            ));
        }

        if buf.len() < Handshake::LEN {
            return Ok(None);
        }

        buf.advance(1);

        // protocol string
        let mut pstr = [0; 19];
        buf.copy_to_slice(&mut pstr);
        // reserved field
        let mut reserved = [0; 8];
        buf.copy_to_slice(&mut reserved);
        // info hash
        let mut info_hash = [0; 20];
        buf.copy_to_slice(&mut info_hash);
        // peer id
        let mut peer_id = [0; 20];
        buf.copy_to_slice(&mut peer_id);

        Ok(Some(Handshake {
            pstr_len: prot_len as u8,
            pstr,
            reserved,
            info_hash: InfoHash(info_hash),
            peer_id: PeerId(peer_id),
        }))
    }
}

/// pstrlen = 19
/// pstr = "BitTorrent protocol"
/// This is the very first message exchanged. If the peer's protocol string
/// (`BitTorrent protocol`) or the info hash differs from ours, the connection
/// is severed. The reserved field is 8 zero bytes, no extension is
/// supported. The peer id is usually the client name and version.
#[derive(Clone, Debug, PartialEq, Writable, Readable)]
pub struct Handshake {
    pub pstr_len: u8,
    pub pstr: [u8; 19],
    pub reserved: [u8; 8],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub const LEN: usize = 1 + 19 + 8 + 20 + 20;

    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            pstr_len: 19,
            pstr: PSTR,
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    pub fn serialize(&self) -> Result<[u8; Self::LEN], Error> {
        let mut buf = [0u8; Self::LEN];
        let temp = self
            .write_to_vec_with_ctx(BigEndian {})
            .map_err(Error::SpeedyError)?;

        buf.copy_from_slice(&temp[..]);

        Ok(buf)
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, Error> {
        Self::read_from_buffer_with_ctx(BigEndian {}, buf)
            .map_err(Error::SpeedyError)
    }

    /// If the handshake received from a peer, `target`, is valid for our
    /// handshake.
    pub fn validate(&self, target: &Self) -> bool {
        if target.pstr_len != 19 {
            warn!("! handshake with wrong pstr_len, dropping connection");
            return false;
        }
        if target.pstr != PSTR {
            warn!("! handshake with wrong pstr, dropping connection");
            return false;
        }
        if self.info_hash != target.info_hash {
            warn!("! info_hash from receiving handshake does not match ours");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> Handshake {
        Handshake::new(InfoHash([5u8; 20]), PeerId([7u8; 20]))
    }

    #[test]
    fn serialize() {
        let ours = handshake();

        assert_eq!(ours.pstr_len, 19);
        assert_eq!(ours.pstr, PSTR);
        assert_eq!(ours.reserved, [0u8; 8]);

        let buf = ours.serialize().unwrap();
        assert_eq!(buf[0], 19);
        assert_eq!(&buf[1..20], b"BitTorrent protocol");
        assert_eq!(&buf[20..28], &[0u8; 8]);
        assert_eq!(&buf[28..48], &[5u8; 20]);
        assert_eq!(&buf[48..68], &[7u8; 20]);

        assert_eq!(Handshake::deserialize(&buf).unwrap(), ours);

        // the codec writes the same bytes
        let mut dst = BytesMut::new();
        HandshakeCodec.encode(ours, &mut dst).unwrap();
        assert_eq!(&dst[..], &buf[..]);
    }

    #[test]
    fn decode_fragmented() {
        let theirs = Handshake::new(InfoHash([5u8; 20]), PeerId([9u8; 20]));
        let bytes = theirs.serialize().unwrap();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&bytes[..30]);
        assert!(HandshakeCodec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[30..]);
        // the first core message must stay in the buffer
        buf.extend_from_slice(&[0, 0, 0, 1, 1]);

        let decoded = HandshakeCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, theirs);
        assert_eq!(&buf[..], &[0, 0, 0, 1, 1]);
    }

    #[test]
    fn decode_zeroed_handshake() {
        let mut buf = BytesMut::from(&[0u8; 68][..]);
        assert!(HandshakeCodec.decode(&mut buf).is_err());
    }

    #[test]
    fn validate() {
        let ours = handshake();

        let mut theirs = Handshake::new(InfoHash([5u8; 20]), PeerId([1; 20]));
        theirs.reserved = [0xff; 8];
        assert!(ours.validate(&theirs));

        let theirs = Handshake::new(InfoHash([6u8; 20]), PeerId([1; 20]));
        assert!(!ours.validate(&theirs));

        let mut theirs = handshake();
        theirs.pstr[0] = b'b';
        assert!(!ours.validate(&theirs));
    }
}
