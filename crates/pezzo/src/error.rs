use std::io;

use thiserror::Error;

impl From<toml::de::Error> for Error {
    fn from(_value: toml::de::Error) -> Self {
        Self::ConfigDeserializeError
    }
}

impl From<toml::ser::Error> for Error {
    fn from(value: toml::ser::Error) -> Self {
        Self::ConfigError(value.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed bencode: {0}")]
    MalformedEncoding(String),

    #[error("The metainfo is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("The metainfo field `{0}` has an invalid value")]
    InvalidField(&'static str),

    #[error("IO error: {0}")]
    Network(#[from] io::Error),

    #[error("The tracker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("The tracker refused the announce: {0}")]
    TrackerFailure(String),

    #[error("The peer list returned by the announce request is not valid")]
    TrackerCompactPeerList,

    #[error("Error when serializing/deserializing")]
    SpeedyError(#[from] speedy::Error),

    #[error("Could not render the value as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("The handshake with the peer failed: {0}")]
    HandshakeFailed(String),

    #[error("The response received from the peer is wrong")]
    MessageResponse,

    #[error("The peer closed the socket")]
    PeerClosedSocket,

    #[error("The peer took to long to respond")]
    Timeout,

    #[error("None of the peers accepted a handshake")]
    NoPeers,

    #[error("Piece {0} does not exist in this torrent")]
    PieceOutOfRange(usize),

    #[error("The piece {0} downloaded does not have a valid hash")]
    PieceInvalid(usize),

    #[error("The peer sent a block with a different length than requested")]
    BlockInvalid,

    #[error(
        "Tried to load $HOME but could not find it. Please make sure you have \
         a $HOME env and that this program has the permission to create dirs."
    )]
    HomeInvalid,

    #[error(
        "Could not open the folder `{0}`. Please make sure the program has \
         permission to open it and that the folder exist"
    )]
    FolderOpenError(String),

    #[error(
        "Error while trying to read the configuration file, please make sure \
         it has the correct format"
    )]
    ConfigDeserializeError,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// If the error was caused by the network, either the tracker's or a
    /// peer's.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Http(_)
                | Error::PeerClosedSocket
                | Error::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_is_not_a_decode_error() {
        let e: Error = serde_json::from_str::<u8>("{").unwrap_err().into();

        assert!(matches!(e, Error::Json(_)));
        assert!(!e.is_network());
    }
}
