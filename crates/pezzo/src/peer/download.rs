//! Download of a single piece from a connected peer.
//!
//! c -interested-> p
//! c <-unchoke- p
//! c -request-> p
//! c <-piece- p
//! ... one request at a time, until the piece is complete.
use tracing::{debug, info, warn};

use super::Peer;
use crate::{
    error::Error,
    metainfo::MetaInfo,
    tcp_wire::{block_infos, Block, BlockInfo, Core},
};

/// Pieces can be as large as `u32::MAX` bytes, this is the most that is
/// reserved before any block arrives.
const MAX_PREALLOC: u32 = 4 * 1024 * 1024;

impl Peer {
    /// Tell the peer that we want to download from it, only once per
    /// connection.
    pub async fn interested(&mut self) -> Result<(), Error> {
        if !self.am_interested {
            self.send(Core::Interested).await?;
            self.am_interested = true;
        }
        Ok(())
    }

    /// Read messages until the peer unchokes us. Returns immediately if the
    /// peer is not choking us already.
    pub async fn wait_unchoke(&mut self) -> Result<(), Error> {
        while self.peer_choking {
            match self.recv().await? {
                Core::Unchoke | Core::Choke | Core::KeepAlive => {}
                msg => debug!("ignoring {msg:?} while choked"),
            }
        }
        Ok(())
    }

    /// Download the piece `index`, requesting one block at a time.
    ///
    /// The returned buffer has exactly the length of the piece. Its hash is
    /// not checked, see [`Peer::download_verified_piece`].
    #[tracing::instrument(
        name = "piece",
        skip(self, meta),
        fields(addr = %self.addr)
    )]
    pub async fn download_piece(
        &mut self,
        meta: &MetaInfo,
        index: usize,
    ) -> Result<Vec<u8>, Error> {
        let piece_len = meta.piece_len(index)?;

        self.interested().await?;
        self.wait_unchoke().await?;

        let mut piece =
            Vec::with_capacity(piece_len.min(MAX_PREALLOC) as usize);

        for info in block_infos(index as u32, piece_len) {
            let block = self.request_block(&info).await?;
            piece.extend_from_slice(&block.block);
        }

        info!("downloaded piece {index} with {} bytes", piece.len());

        Ok(piece)
    }

    /// Same as [`Peer::download_piece`], but fails if the SHA-1 of the piece
    /// is not the one of the metainfo.
    pub async fn download_verified_piece(
        &mut self,
        meta: &MetaInfo,
        index: usize,
    ) -> Result<Vec<u8>, Error> {
        let piece = self.download_piece(meta, index).await?;
        let hash = sha1_smol::Sha1::from(&piece).digest().bytes();

        if &hash != meta.piece_hash(index)? {
            warn!("piece {index} has an invalid hash");
            return Err(Error::PieceInvalid(index));
        }

        Ok(piece)
    }

    /// Request one block and wait for it. Blocks that were not requested
    /// are dropped, a choke in the middle pauses the download until the
    /// next unchoke and the request is sent again.
    async fn request_block(
        &mut self,
        info: &BlockInfo,
    ) -> Result<Block, Error> {
        self.send(Core::Request(info.clone())).await?;

        loop {
            match self.recv().await? {
                Core::Piece(block)
                    if block.index == info.index && block.begin == info.begin =>
                {
                    if block.block.len() != info.len as usize {
                        warn!(
                            "block {} {} has {} bytes, requested {}",
                            block.index,
                            block.begin,
                            block.block.len(),
                            info.len
                        );
                        return Err(Error::BlockInvalid);
                    }
                    return Ok(block);
                }
                Core::Piece(block) => {
                    warn!(
                        "ignoring block {} {} that was not requested",
                        block.index, block.begin
                    );
                }
                Core::Choke => {
                    self.wait_unchoke().await?;
                    self.send(Core::Request(info.clone())).await?;
                }
                _ => {}
            }
        }
    }
}
