//! Configuration of the client, loaded from a TOML file.
use std::{path::PathBuf, time::Duration};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{create_dir_all, File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::{error::Error, peer::PeerId};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The ID of the local peer, sent to the tracker and to peers. Must
    /// have exactly 20 bytes.
    pub peer_id: String,

    /// Port reported to the tracker.
    pub port: u16,

    /// Check the SHA-1 of every downloaded piece.
    pub verify_pieces: bool,

    /// Seconds to wait for a peer to send a message, forever if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_timeout: Option<u64>,

    /// How many peers to try before giving up, all of them if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_peer_attempts: Option<usize>,

    /// Also write logs to a file in the data dir.
    pub log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer_id: "00112233445566778899".to_owned(),
            port: 6881,
            verify_pieces: false,
            peer_timeout: None,
            max_peer_attempts: None,
            log: false,
        }
    }
}

impl Config {
    fn dirs() -> Result<ProjectDirs, Error> {
        ProjectDirs::from("", "", "Pezzo").ok_or(Error::HomeInvalid)
    }

    /// Returns the configuration fs File and it's path,
    ///
    /// If it doesn't exist, we try to create a default configuration file
    /// at the user's config folder, which we get from their environmental
    /// variables.
    ///
    /// # Errors
    ///
    /// This fn can fail if the program does not have access to the config
    /// folder, or to the file.
    pub async fn config_file() -> Result<(File, PathBuf), Error> {
        let mut config_path = Self::dirs()?.config_dir().to_path_buf();

        // If the user has a home folder, but for some reason we cant open it
        if !config_path.exists() {
            create_dir_all(&config_path).await.map_err(|_| {
                Error::FolderOpenError(config_path.display().to_string())
            })?;
        }

        config_path.push("config.toml");

        // try to open the config file, and create one
        // if it doesnt exist. This will only fail if we dont
        // have permission to read or write to this path.
        let mut config_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&config_path)
            .await?;

        // a file that was just created is empty, write the default
        // configuration to it.
        if config_file.metadata().await?.len() == 0 {
            let config_str = toml::to_string(&Config::default())?;
            config_file.write_all(config_str.as_bytes()).await?;
            config_file.flush().await?;

            config_file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&config_path)
                .await?;
        }

        Ok((config_file, config_path))
    }

    /// Load the configuration file and transform it into Self.
    /// If the file does not exist, it tries to create the file
    /// with the default configurations.
    pub async fn load() -> Result<Self, Error> {
        let (mut file, _p) = Self::config_file().await?;

        let mut config_str = String::new();
        file.read_to_string(&mut config_str).await?;

        Self::from_toml(&config_str)
    }

    /// Parse a configuration, missing fields have their default values.
    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let config = toml::from_str::<Config>(s)?;
        config.peer_id()?;
        Ok(config)
    }

    /// Directory where the log files are written.
    pub fn log_dir() -> Result<PathBuf, Error> {
        Ok(Self::dirs()?.data_dir().to_path_buf())
    }

    pub fn peer_id(&self) -> Result<PeerId, Error> {
        PeerId::try_from(self.peer_id.as_str())
            .map_err(|e| Error::ConfigError(e.to_owned()))
    }

    pub fn peer_timeout(&self) -> Option<Duration> {
        self.peer_timeout.map(Duration::from_secs)
    }
}
