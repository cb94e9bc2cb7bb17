use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use super::{Block, BlockInfo};
use crate::error::Error;

/// Messages larger than this are refused, the biggest legitimate message is
/// a piece message with a 16 KiB block, or a bitfield of a huge torrent.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Core messages exchanged after a successful handshake.
/// These are from the vanilla protocol, with no extensions.
#[derive(Debug, Clone, PartialEq)]
pub enum Core {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(u32),
    Bitfield(Vec<u8>),
    Request(BlockInfo),
    Piece(Block),
    Cancel(BlockInfo),
}

/// The IDs of the [`Core`] messages.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CoreId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

impl TryFrom<u8> for CoreId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use CoreId::*;
        Ok(match value {
            0 => Choke,
            1 => Unchoke,
            2 => Interested,
            3 => NotInterested,
            4 => Have,
            5 => Bitfield,
            6 => Request,
            7 => Piece,
            8 => Cancel,
            _ => return Err(value),
        })
    }
}

impl Core {
    /// Length of the message on the wire, including the length prefix.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        use Core::*;
        match self {
            KeepAlive => 4,
            Choke | Unchoke | Interested | NotInterested => 4 + 1,
            Have(_) => 4 + 1 + 4,
            Bitfield(b) => 4 + 1 + b.len(),
            Cancel(_) | Request(_) => 4 + 1 + 4 + 4 + 4,
            Piece(b) => 4 + 1 + 4 + 4 + b.block.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreCodec;

impl From<Core> for BytesMut {
    fn from(val: Core) -> Self {
        let mut dst = BytesMut::with_capacity(val.len());
        let _ = CoreCodec.encode(val, &mut dst);
        dst
    }
}

impl Encoder<Core> for CoreCodec {
    type Error = Error;

    fn encode(
        &mut self,
        item: Core,
        buf: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        match item {
            Core::KeepAlive => {
                buf.put_u32(0);
            }
            Core::Choke => {
                buf.put_u32(1);
                buf.put_u8(CoreId::Choke as u8);
            }
            Core::Unchoke => {
                buf.put_u32(1);
                buf.put_u8(CoreId::Unchoke as u8);
            }
            Core::Interested => {
                buf.put_u32(1);
                buf.put_u8(CoreId::Interested as u8);
            }
            Core::NotInterested => {
                buf.put_u32(1);
                buf.put_u8(CoreId::NotInterested as u8);
            }
            Core::Have(piece_index) => {
                buf.put_u32(1 + 4);
                buf.put_u8(CoreId::Have as u8);
                buf.put_u32(piece_index);
            }
            Core::Bitfield(bitfield) => {
                buf.put_u32(1 + bitfield.len() as u32);
                buf.put_u8(CoreId::Bitfield as u8);
                buf.extend_from_slice(&bitfield);
            }
            // <len=0013><id=6><index><begin><length>
            Core::Request(block) => {
                buf.put_u32(1 + 4 + 4 + 4);
                buf.put_u8(CoreId::Request as u8);
                block.encode(buf);
            }
            // <len=0009+X><id=7><index><begin><block>
            Core::Piece(block) => {
                let Block { index, begin, block } = block;

                buf.put_u32(1 + 4 + 4 + block.len() as u32);
                buf.put_u8(CoreId::Piece as u8);
                buf.put_u32(index);
                buf.put_u32(begin);
                buf.extend_from_slice(&block);
            }
            // <len=0013><id=8><index><begin><length>
            Core::Cancel(block) => {
                buf.put_u32(1 + 4 + 4 + 4);
                buf.put_u8(CoreId::Cancel as u8);
                block.encode(buf);
            }
        }
        Ok(())
    }
}

impl Decoder for CoreCodec {
    type Item = Core;
    type Error = Error;

    fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // the message length header must be present at the minimum,
            // otherwise we can't determine the message type
            if buf.len() < 4 {
                return Ok(None);
            }

            // peek at length prefix without consuming
            let size =
                u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

            if size == 0 {
                buf.advance(4);
                return Ok(Some(Core::KeepAlive));
            }

            if size > MAX_MESSAGE_SIZE {
                warn!("message of {size} bytes is too large");
                return Err(Error::MessageResponse);
            }

            // incomplete message, a big message is split into many TCP
            // packets. The decoder will be called each time a packet arrive,
            // but if the buffer is not full yet, we don't advance the cursor
            // and just wait.
            if buf.len() < 4 + size {
                buf.reserve(4 + size - buf.len());
                return Ok(None);
            }

            // advance past the size, into the msg_id
            buf.advance(4);
            let msg_id = buf.get_u8();

            // cursor is past the msg_id, into the payload.
            let payload_len = size - 1;

            let Ok(msg_id) = CoreId::try_from(msg_id) else {
                // unknown message id, just skip the segment and try the
                // next message on the buffer
                warn!("unknown message_id {msg_id:?}");
                buf.advance(payload_len);
                continue;
            };

            let expected = match msg_id {
                CoreId::Choke
                | CoreId::Unchoke
                | CoreId::Interested
                | CoreId::NotInterested => Some(0),
                CoreId::Have => Some(4),
                CoreId::Request | CoreId::Cancel => Some(4 + 4 + 4),
                CoreId::Bitfield | CoreId::Piece => None,
            };

            if expected.is_some_and(|len| len != payload_len)
                || (msg_id == CoreId::Piece && payload_len < 4 + 4)
            {
                warn!("{msg_id:?} with a payload of {payload_len} bytes");
                return Err(Error::MessageResponse);
            }

            let msg = match msg_id {
                // <len=0001><id=0>
                CoreId::Choke => Core::Choke,

                // <len=0001><id=1>
                CoreId::Unchoke => Core::Unchoke,

                // <len=0001><id=2>
                CoreId::Interested => Core::Interested,

                // <len=0001><id=3>
                CoreId::NotInterested => Core::NotInterested,

                // <len=0005><id=4><piece index>
                CoreId::Have => Core::Have(buf.get_u32()),

                // <len=0001+X><id=5><bitfield>
                CoreId::Bitfield => {
                    Core::Bitfield(buf.split_to(payload_len).to_vec())
                }

                // <len=0013><id=6><index><begin><length>
                CoreId::Request => Core::Request(BlockInfo::decode(buf)),

                // <len=0009+X><id=7><index><begin><block>
                CoreId::Piece => {
                    let index = buf.get_u32();
                    let begin = buf.get_u32();
                    let block = buf.split_to(payload_len - 8).to_vec();

                    Core::Piece(Block { index, begin, block })
                }

                // <len=0013><id=8><index><begin><length>
                CoreId::Cancel => Core::Cancel(BlockInfo::decode(buf)),
            };

            return Ok(Some(msg));
        }
    }
}
