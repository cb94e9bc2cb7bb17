//! Documentation of the "TCP Wire" protocol between Peers in the network.
//! Peers will follow this protocol to exchange information about torrents.
mod codec;
mod handshake;

// re-exports
pub use codec::*;
pub use handshake::*;

use bytes::{Buf, BufMut, BytesMut};

/// The default block_len that most clients support, some clients drop
/// the connection on blocks larger than this value.
///
/// Tha last block of a piece might be smaller.
pub const BLOCK_LEN: u32 = 16384;

/// Protocol String (PSTR)
/// Bytes of the string "BitTorrent protocol". Used during handshake.
pub const PSTR: [u8; 19] = [
    66, 105, 116, 84, 111, 114, 114, 101, 110, 116, 32, 112, 114, 111, 116,
    111, 99, 111, 108,
];

/// A Block is a subset of a Piece,
/// pieces are subsets of the entire Torrent data.
///
/// When peers send data (seed) to us, they send us Blocks.
/// This happens on the "Piece" message of the peer wire protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The index of the piece this block belongs to.
    pub index: u32,

    /// The zero-based byte offset into the piece.
    pub begin: u32,

    /// The block's data. 16 KiB most of the times,
    /// but the last block of a piece *might* be smaller.
    pub block: Vec<u8>,
}

/// The representation of a [`Block`].
///
/// When we ask a peer to give us a [`Block`], we send this struct,
/// using the "Request" message of the tcp wire protocol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// The index of the piece of which this is a block.
    pub index: u32,

    /// The zero-based byte offset into the piece.
    pub begin: u32,

    /// The block's length in bytes. <= 16 KiB
    pub len: u32,
}

impl BlockInfo {
    /// Reads the 12 bytes written by [`BlockInfo::encode`], the caller
    /// checks that they are available.
    pub fn decode(buf: &mut BytesMut) -> Self {
        Self {
            index: buf.get_u32(),
            begin: buf.get_u32(),
            len: buf.get_u32(),
        }
    }

    /// Encodes the block info in the network binary protocol
    /// format into the given buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.index);
        buf.put_u32(self.begin);
        buf.put_u32(self.len);
    }
}

/// Split the piece `index`, which is `piece_len` bytes long, in the blocks
/// that will be requested from a peer, in order.
///
/// Offsets advance on a fixed [`BLOCK_LEN`] stride, the last block has the
/// remaining bytes.
pub fn block_infos(index: u32, piece_len: u32) -> Vec<BlockInfo> {
    let num_blocks = piece_len.div_ceil(BLOCK_LEN);
    let mut blocks = Vec::with_capacity(num_blocks as usize);

    for block_index in 0..num_blocks {
        let begin = block_index * BLOCK_LEN;
        let len = BLOCK_LEN.min(piece_len - begin);

        blocks.push(BlockInfo { index, begin, len });
    }

    blocks
}
