//! A minimal BitTorrent client.
//!
//! Reads a .torrent file, finds peers with an HTTP tracker, and downloads
//! the file one piece at a time from a single peer.
//!
//! ```no_run
//! use pezzo::{config::Config, metainfo::MetaInfo, session::Session};
//!
//! # async fn run() -> Result<(), pezzo::error::Error> {
//! let raw = tokio::fs::read("sample.torrent").await?;
//! let meta = MetaInfo::from_bytes(&raw)?;
//! let mut session = Session::new(meta, Config::default())?;
//! let file = session.download().await?;
//! # Ok(())
//! # }
//! ```
pub mod bencode;
pub mod config;
pub mod error;
pub mod metainfo;
pub mod peer;
pub mod session;
pub mod tcp_wire;
pub mod tracker;
