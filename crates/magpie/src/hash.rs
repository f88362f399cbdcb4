//! Content fingerprinting: sha2-256 framed as a hex-encoded multihash.
//!
//! Bodies are identified by their multihash (`<code><length><digest>`,
//! hex-encoded), so a hash value is self-describing. Blob-store keys use
//! the bare digest with the framing stripped.

use sha2::{Digest, Sha256};

/// Hex framing for sha2-256: multihash code 0x12, digest length 0x20.
const SHA2_256_PREFIX: &str = "1220";

/// Compute the hex-encoded sha2-256 multihash of a body.
pub fn multihash_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{}", SHA2_256_PREFIX, hex::encode(hasher.finalize()))
}

/// Strip the multihash framing, leaving the bare hex digest used in
/// blob-store keys. Unframed input is returned unchanged.
pub fn storage_digest(hash: &str) -> &str {
    hash.strip_prefix(SHA2_256_PREFIX).unwrap_or(hash)
}
