//! Constants of the on-disk container format.

use crate::digest::{DigestAlgorithm, Md5Algorithm};

/// Length of the initialization vector stored at the start of every container.
pub const IV_LEN: usize = 16;

/// Length of the checksum appended to the plaintext before encryption.
pub const CHECKSUM_LEN: usize = Md5Algorithm::LEN;

/// Number of bytes read from the input per processing step.
pub const CHUNK_LEN: usize = 4096;

/// AES block length.
pub const BLOCK_LEN: usize = 16;

/// Smallest possible container: the IV followed by the encrypted checksum of an
/// empty file. PKCS#7 always adds at least one byte of padding.
pub const MIN_CONTAINER_LEN: usize = IV_LEN + (CHECKSUM_LEN / BLOCK_LEN + 1) * BLOCK_LEN;

pub type Iv = [u8; IV_LEN];

/// Returns the key derivation salt for a container with the given IV.
///
/// The format uses the IV itself as the salt. Changing this breaks
/// compatibility with every existing container.
#[must_use]
#[inline]
pub fn kdf_salt(iv: &Iv) -> &[u8; crate::kdf::SALT_LEN] {
    iv
}

/// Number of `chunk_len` steps needed to consume `stream_len` bytes.
#[must_use]
#[inline]
pub fn total_chunks(stream_len: u64, chunk_len: u64) -> u64 {
    stream_len.div_ceil(chunk_len)
}
