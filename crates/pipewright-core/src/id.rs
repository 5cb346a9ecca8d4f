//! Container and image identifiers.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::{Error, Result};

/// Number of random bytes in a generated identifier (256 bits).
pub const DOCKER_ID_BYTES: usize = 32;

/// Generate a random identifier suitable for naming containers and images.
///
/// The value is 256 bits from the operating system's randomness source,
/// rendered as 64 lowercase hex characters.
pub fn generate_docker_id() -> Result<String> {
    let mut buf = [0u8; DOCKER_ID_BYTES];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| Error::Randomness(e.to_string()))?;
    Ok(hex::encode(buf))
}
