//! SHA-256 fingerprints for rendered frames and encoded files.
//!
//! Seeking to the same position must always yield the same pixels, so the
//! CLI prints these and the tests compare them.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::frame::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<Sha256> for ContentHash {
    fn from(hasher: Sha256) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fingerprint of a frame. The size is mixed in so equal byte runs of a
/// different shape never collide.
pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(frame.width.to_le_bytes());
    hasher.update(frame.height.to_le_bytes());
    hasher.update(&frame.data);
    hasher.into()
}

/// Fingerprint of an encoded output file.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    Sha256::new().chain_update(data).into()
}
