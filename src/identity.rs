/// Stable task identifiers derived from a page's title and URL
use sha2::{Digest, Sha256};

const ID_PREFIX: &str = "task-";

/// Number of hex characters kept from the digest (128 bits)
const DIGEST_HEX_LEN: usize = 32;

/// Resolve the task id for a page
///
/// Algorithm:
/// 1. Feed the title length (u64, little endian) into SHA-256
/// 2. Feed the title bytes, then the URL bytes
/// 3. Hex-encode the digest and keep the first 32 characters
/// 4. Prefix with "task-"
///
/// The length prefix keeps the title/URL boundary unambiguous, so
/// ("ab", "c") and ("a", "bc") hash different inputs.
///
/// Examples:
/// - ("Rust", "https://www.rust-lang.org/") → task-<32 hex chars>
/// - ids are always 37 ASCII characters from [a-z0-9-]
pub fn resolve_id(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((title.len() as u64).to_le_bytes());
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}{}", ID_PREFIX, &digest[..DIGEST_HEX_LEN])
}
