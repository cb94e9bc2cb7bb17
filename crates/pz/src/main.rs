use std::path::Path;

use clap::Parser;
use pezzo::{
    bencode, config::Config, error::Error, metainfo::MetaInfo, peer::Peer,
    session::Session,
};
use tokio::{fs::File, io::BufWriter};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

mod args;

use args::{Args, Command};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    // stdout is only for the output of the commands
    let (config, _guard) = if args.command.needs_config() {
        let mut config = Config::load().await?;
        merge_args(&mut config, &args);

        let guard = setup_logger(args.verbose, config.log)?;
        debug!("config: {config:?}");

        (config, guard)
    } else {
        (Config::default(), setup_logger(args.verbose, false)?)
    };

    match args.command {
        Command::Decode { value } => {
            println!("{}", to_json(&value)?);
        }
        Command::Info { torrent } => {
            let meta = read_torrent(&torrent).await?;

            println!("Tracker URL: {}", meta.announce);
            println!("Length: {}", meta.length);
            println!("Info Hash: {}", meta.info_hash);
            println!("Piece Length: {}", meta.piece_length);
            println!("Piece Hashes:");
            for hash in &meta.pieces {
                println!("{}", hex::encode(hash));
            }
        }
        Command::Peers { torrent } => {
            let meta = read_torrent(&torrent).await?;
            let mut session = Session::new(meta, config)?;

            for peer in session.announce().await? {
                println!("{peer}");
            }
        }
        Command::Handshake { torrent, peer } => {
            let meta = read_torrent(&torrent).await?;
            let peer = Peer::handshake(
                peer,
                &meta.info_hash,
                &config.peer_id()?,
                config.peer_timeout(),
            )
            .await?;

            println!("Peer ID: {}", peer.id);
        }
        Command::DownloadPiece { output, torrent, piece } => {
            let meta = read_torrent(&torrent).await?;
            let mut session = Session::new(meta, config)?;

            let bytes = session.download_piece(piece).await?;
            tokio::fs::write(&output, bytes).await?;

            println!("Piece {piece} downloaded to {}.", output.display());
        }
        Command::Download { output, torrent } => {
            let meta = read_torrent(&torrent).await?;
            let mut session = Session::new(meta, config)?;

            let mut file = BufWriter::new(File::create(&output).await?);
            session.download_to(&mut file).await?;

            println!(
                "Downloaded {} to {}.",
                torrent.display(),
                output.display()
            );
        }
    }

    Ok(())
}

/// Decode a bencoded value and render it as JSON.
fn to_json(value: &str) -> Result<String, Error> {
    let value = bencode::decode(value.as_bytes())?;
    Ok(serde_json::to_string(&value)?)
}

/// CLI flags take precedence over the configuration file.
fn merge_args(config: &mut Config, args: &Args) {
    if args.verify {
        config.verify_pieces = true;
    }
    if args.timeout.is_some() {
        config.peer_timeout = args.timeout;
    }
}

async fn read_torrent(path: &Path) -> Result<MetaInfo, Error> {
    let raw = tokio::fs::read(path).await?;
    MetaInfo::from_bytes(&raw)
}

/// Log to stderr, and to a daily file in the data dir if `to_file` is set.
/// The returned guard flushes the file when dropped.
fn setup_logger(
    verbose: bool,
    to_file: bool,
) -> Result<Option<WorkerGuard>, Error> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    let stderr = fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = if to_file {
        let appender =
            tracing_appender::rolling::daily(Config::log_dir()?, "pz.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry().with(level).with(stderr).with(file).init();

    Ok(guard)
}
