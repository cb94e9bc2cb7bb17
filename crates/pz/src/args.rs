use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "pz")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Check the SHA-1 of every downloaded piece.
    #[clap(long, global = true)]
    pub verify: bool,

    /// Seconds to wait for a peer or the tracker before giving up on it.
    #[clap(long, global = true)]
    pub timeout: Option<u64>,

    /// Log every message exchanged with peers.
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Decode a bencoded value and print it as JSON.
    Decode { value: String },

    /// Print the metainfo of a torrent file.
    Info { torrent: PathBuf },

    /// Print the peers that the tracker knows for a torrent.
    Peers { torrent: PathBuf },

    /// Handshake with a peer and print its ID.
    Handshake { torrent: PathBuf, peer: SocketAddr },

    /// Download one piece to a file.
    #[command(name = "download_piece")]
    DownloadPiece {
        #[clap(short, long)]
        output: PathBuf,
        torrent: PathBuf,
        piece: usize,
    },

    /// Download the whole file.
    Download {
        #[clap(short, long)]
        output: PathBuf,
        torrent: PathBuf,
    },
}

impl Command {
    /// `decode` and `info` only read their input, they never touch the
    /// config file or the network.
    pub fn needs_config(&self) -> bool {
        !matches!(self, Command::Decode { .. } | Command::Info { .. })
    }
}
