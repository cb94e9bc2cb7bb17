use std::{fmt::Display, ops::Deref};

use speedy::{Readable, Writable};

/// The ID of a Peer.
#[derive(Clone, PartialEq, Eq, Hash, Default, Readable, Writable)]
pub struct PeerId(pub [u8; 20]);

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerId({})", String::from_utf8_lossy(&self.0))
    }
}

impl Deref for PeerId {
    type Target = [u8; 20];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<&str> for PeerId {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let buff: [u8; 20] = value
            .as_bytes()
            .try_into()
            .map_err(|_| "The PeerId must have exactly 20 bytes")?;
        Ok(PeerId(buff))
    }
}
