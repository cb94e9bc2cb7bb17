//! Mock of a seeder.
//!
//! It speaks the wire protocol with raw bytes, independently of the codecs
//! of the client, and can be told to misbehave in a few ways.
use std::{net::SocketAddr, time::Duration};

use pezzo::{
    error::Error,
    metainfo::InfoHash,
    peer::PeerId,
    tcp_wire::Handshake,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::sleep,
};

pub static SEEDER_ID: PeerId = PeerId(*b"-MK0001-mockseeder01");

#[derive(Clone, Debug, Default)]
pub struct Behaviour {
    /// Answer the handshake with 68 zero bytes.
    pub zero_handshake: bool,

    /// Never send anything after the handshake.
    pub mute: bool,

    /// Send an unchoke instead of the bitfield, right after the handshake.
    pub unchoke_early: bool,

    /// Flip the bits of every block.
    pub corrupt: bool,

    /// Write messages in chunks of this many bytes.
    pub fragment: Option<usize>,

    /// Answer the first request of each connection with a choke and an
    /// unchoke, dropping the request.
    pub choke_first_request: bool,

    /// Send a `have` and a block that was not requested before each block.
    pub noise: bool,

    /// Close the connection after sending this many blocks.
    pub blocks: Option<usize>,
}

pub struct MockPeer {
    listener: TcpListener,
    info_hash: InfoHash,
    data: Vec<u8>,
    piece_length: usize,
    behaviour: Behaviour,
}

impl MockPeer {
    pub async fn new(
        info_hash: InfoHash,
        data: Vec<u8>,
        piece_length: usize,
        behaviour: Behaviour,
    ) -> Result<Self, Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener, info_hash, data, piece_length, behaviour })
    }

    pub fn addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections one after the other, forever.
    pub async fn run(self) -> Result<(), Error> {
        loop {
            let (socket, _) = self.listener.accept().await?;
            let _ = self.handle_conn(socket).await;
        }
    }

    async fn handle_conn(&self, mut socket: TcpStream) -> Result<(), Error> {
        let mut handshake = [0u8; Handshake::LEN];
        socket.read_exact(&mut handshake).await?;

        if self.behaviour.zero_handshake {
            socket.write_all(&[0u8; Handshake::LEN]).await?;
            return Ok(());
        }

        let theirs = Handshake::deserialize(&handshake)?;
        if theirs.info_hash != self.info_hash {
            return Ok(());
        }

        let ours = Handshake::new(self.info_hash.clone(), SEEDER_ID.clone());
        self.write(&mut socket, &ours.serialize()?).await?;

        if self.behaviour.mute {
            // keep the connection open until the client gives up
            let mut buf = [0u8; 64];
            while socket.read(&mut buf).await? > 0 {}
            return Ok(());
        }

        let mut unchoked = self.behaviour.unchoke_early;
        if unchoked {
            self.write(&mut socket, &[0, 0, 0, 1, 1]).await?;
        } else {
            self.write(&mut socket, &[0, 0, 0, 2, 5, 0xff]).await?;
        }

        let mut first_request = true;
        let mut sent = 0;

        loop {
            let mut len = [0u8; 4];
            if socket.read_exact(&mut len).await.is_err() {
                // client closed the connection
                return Ok(());
            }
            let len = u32::from_be_bytes(len) as usize;
            if len == 0 {
                continue;
            }

            let mut msg = vec![0u8; len];
            socket.read_exact(&mut msg).await?;

            match msg[0] {
                // interested
                2 if !unchoked => {
                    unchoked = true;
                    self.write(&mut socket, &[0, 0, 0, 1, 1]).await?;
                }
                // request
                6 => {
                    let field = |i: usize| {
                        u32::from_be_bytes(msg[i..i + 4].try_into().unwrap())
                    };
                    let (index, begin, len) = (field(1), field(5), field(9));

                    if self.behaviour.choke_first_request && first_request {
                        first_request = false;
                        self.write(&mut socket, &[0, 0, 0, 1, 0]).await?;
                        sleep(Duration::from_millis(10)).await;
                        self.write(&mut socket, &[0, 0, 0, 1, 1]).await?;
                        continue;
                    }

                    if self.behaviour.noise {
                        let have = [0, 0, 0, 5, 4, 0, 0, 0, 9];
                        self.write(&mut socket, &have).await?;
                        let stale = piece_msg(index, begin + 1, &[1, 2, 3]);
                        self.write(&mut socket, &stale).await?;
                        self.write(&mut socket, &[0, 0, 0, 0]).await?;
                    }

                    let start =
                        index as usize * self.piece_length + begin as usize;
                    let mut block =
                        self.data[start..start + len as usize].to_vec();

                    if self.behaviour.corrupt {
                        block.iter_mut().for_each(|b| *b = !*b);
                    }

                    self.write(&mut socket, &piece_msg(index, begin, &block))
                        .await?;

                    sent += 1;
                    if self.behaviour.blocks.is_some_and(|max| sent >= max) {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    async fn write(
        &self,
        socket: &mut TcpStream,
        buf: &[u8],
    ) -> Result<(), Error> {
        match self.behaviour.fragment {
            Some(size) => {
                for chunk in buf.chunks(size) {
                    socket.write_all(chunk).await?;
                    socket.flush().await?;
                    tokio::task::yield_now().await;
                }
            }
            None => socket.write_all(buf).await?,
        }
        Ok(())
    }
}

/// <len=0009+X><id=7><index><begin><block>
pub fn piece_msg(index: u32, begin: u32, block: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(13 + block.len());
    msg.extend_from_slice(&(9 + block.len() as u32).to_be_bytes());
    msg.push(7);
    msg.extend_from_slice(&index.to_be_bytes());
    msg.extend_from_slice(&begin.to_be_bytes());
    msg.extend_from_slice(block);
    msg
}
