//! Password-based file encryption.
//!
//! A file is encrypted with AES-256-CBC (PKCS#7 padding). The key is derived
//! from the password with PBKDF2-HMAC-SHA256, using the random IV as salt.
//! An MD5 checksum of the plaintext is appended before encryption and verified
//! after decryption, so a wrong password or a modified container is detected.
//!
//! Container layout on disk:
//!
//! - IV (16 bytes)
//! - ciphertext of `plaintext || checksum (16 bytes)`
//!
//! All work is done in fixed-size chunks, so memory use does not depend on the
//! file size. Intermediate results are written to staging files that are removed
//! on failure; the requested output path is only ever touched by a final rename.

pub mod appended;
pub mod cipher;
pub mod container;
pub mod digest;
mod error;
pub mod kdf;
mod pipeline;
pub mod progress;
pub mod staging;

pub use crate::{
    error::{ErrorKind, FatalError},
    pipeline::{decrypt_file, encrypt_file},
    progress::{NoProgress, ProgressSink},
};
