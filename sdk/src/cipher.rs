//! Streaming AES-256-CBC over a pair of files.
//!
//! A [`ChunkCipher`] is bound to one input, one output and one [`Direction`].
//! Each call to [`encrypt_chunk`](ChunkCipher::encrypt_chunk) or
//! [`decrypt_chunk`](ChunkCipher::decrypt_chunk) processes at most one chunk of
//! the input. The first call sets up the cipher: when encrypting, a fresh IV
//! is generated and written to the output before any ciphertext; when
//! decrypting, the IV is read from the start of the input.

use {
    crate::{
        container::{self, BLOCK_LEN, CHUNK_LEN, IV_LEN, Iv},
        digest::fill_buf,
        kdf::derive_key,
    },
    aes::Aes256,
    anyhow::{Context, Result, anyhow, bail, ensure},
    cbc::cipher::{
        BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7,
        generic_array::GenericArray,
    },
    derive_more::{Display, Error},
    fs_err::File,
    rand::{TryRngCore, rngs::OsRng},
    std::{
        io::{Read, Write},
        path::Path,
    },
    tracing::trace,
    zeroize::Zeroizing,
};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    #[display("encrypt")]
    Encrypt,
    #[display("decrypt")]
    Decrypt,
}

/// Input that cannot be a valid container.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    #[display("input is too short to contain an initialization vector")]
    MissingIv,
    #[display("ciphertext length is not a multiple of the block length")]
    TruncatedBlock,
    #[display("ciphertext is empty")]
    EmptyCiphertext,
    #[display("invalid padding after decryption")]
    InvalidPadding,
}

enum Engine {
    Encrypt(Aes256CbcEnc),
    Decrypt(Aes256CbcDec),
}

struct Streams<R, W> {
    input: R,
    output: W,
    engine: Option<Engine>,
    buf: Vec<u8>,
    // Bytes read but not yet written. When decrypting, the last full block
    // is always kept here until the input is exhausted.
    pending: Vec<u8>,
}

pub struct ChunkCipher<R = File, W = File> {
    direction: Direction,
    password: Zeroizing<Vec<u8>>,
    input_len: u64,
    chunk_len: usize,
    streams: Option<Streams<R, W>>,
}

impl ChunkCipher {
    /// Opens `input` for reading and creates (or truncates) `output`.
    #[inline]
    pub fn open(
        direction: Direction,
        password: &[u8],
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<Self> {
        let input = File::open(input.as_ref())?;
        let input_len = input.metadata()?.len();
        let output = File::create(output.as_ref())?;
        Ok(Self::new(direction, password, input, input_len, output))
    }
}

impl<R: Read, W: Write> ChunkCipher<R, W> {
    /// `input_len` is the total length of `input`, used for chunk counting.
    #[inline]
    pub fn new(direction: Direction, password: &[u8], input: R, input_len: u64, output: W) -> Self {
        Self {
            direction,
            password: Zeroizing::new(password.to_vec()),
            input_len,
            chunk_len: CHUNK_LEN,
            streams: Some(Streams {
                input,
                output,
                engine: None,
                buf: Vec::new(),
                pending: Vec::new(),
            }),
        }
    }

    /// Overrides the chunk length. Must be a positive multiple of the block length.
    #[inline]
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Result<Self> {
        ensure!(
            chunk_len > 0 && chunk_len % BLOCK_LEN == 0,
            "chunk length must be a positive multiple of {BLOCK_LEN}, got {chunk_len}"
        );
        self.chunk_len = chunk_len;
        Ok(self)
    }

    #[must_use]
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of steps returning `true` for a complete run.
    ///
    /// When decrypting, the IV prefix is not counted.
    #[must_use]
    #[inline]
    #[expect(clippy::as_conversions, reason = "usize always fits into u64")]
    pub fn total_chunks(&self) -> u64 {
        let payload_len = match self.direction {
            Direction::Encrypt => self.input_len,
            Direction::Decrypt => self.input_len.saturating_sub(container::IV_LEN as u64),
        };
        container::total_chunks(payload_len, self.chunk_len as u64)
    }

    #[must_use]
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.streams.is_none()
    }

    /// Encrypts the next chunk. Returns `false` after the input is exhausted,
    /// the padded final block is written and both streams are released.
    #[inline]
    pub fn encrypt_chunk(&mut self) -> Result<bool> {
        self.step(Direction::Encrypt)
    }

    /// Decrypts the next chunk. Returns `false` after the input is exhausted,
    /// the padding is removed and both streams are released.
    #[inline]
    pub fn decrypt_chunk(&mut self) -> Result<bool> {
        self.step(Direction::Decrypt)
    }

    #[inline]
    pub fn encrypt_all(&mut self) -> Result<()> {
        while self.encrypt_chunk()? {}
        Ok(())
    }

    #[inline]
    pub fn decrypt_all(&mut self) -> Result<()> {
        while self.decrypt_chunk()? {}
        Ok(())
    }

    /// Flushes the output and releases both streams. Does nothing if already closed.
    #[inline]
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut streams) = self.streams.take() {
            streams.output.flush().context("failed to flush output")?;
        }
        Ok(())
    }

    fn step(&mut self, direction: Direction) -> Result<bool> {
        ensure!(
            direction == self.direction,
            "cannot {direction} with a cipher created to {}",
            self.direction
        );
        let chunk_len = self.chunk_len;
        let Some(streams) = &mut self.streams else {
            return Ok(false);
        };
        if streams.engine.is_none() {
            streams.engine = Some(match direction {
                Direction::Encrypt => start_encryption(&self.password, &mut streams.output)?,
                Direction::Decrypt => start_decryption(&self.password, &mut streams.input)?,
            });
            streams.buf = vec![0; chunk_len];
        }

        let len = fill_buf(&mut streams.input, &mut streams.buf).context("failed to read input")?;
        if len == 0 {
            streams.finish()?;
            self.close()?;
            return Ok(false);
        }
        streams.pending.extend_from_slice(&streams.buf[..len]);
        streams.process_pending()?;
        Ok(true)
    }
}

fn start_encryption(password: &[u8], output: &mut impl Write) -> Result<Engine> {
    let mut iv: Iv = [0; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .context("failed to generate initialization vector")?;
    let key = derive_key(password, container::kdf_salt(&iv));
    let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|err| anyhow!("failed to initialize cipher: {err}"))?;
    output
        .write_all(&iv)
        .context("failed to write initialization vector")?;
    trace!("encryption started");
    Ok(Engine::Encrypt(encryptor))
}

fn start_decryption(password: &[u8], input: &mut impl Read) -> Result<Engine> {
    let mut iv: Iv = [0; IV_LEN];
    let len = fill_buf(input, &mut iv).context("failed to read initialization vector")?;
    if len < IV_LEN {
        bail!(CipherError::MissingIv);
    }
    let key = derive_key(password, container::kdf_salt(&iv));
    let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), &iv)
        .map_err(|err| anyhow!("failed to initialize cipher: {err}"))?;
    trace!("decryption started");
    Ok(Engine::Decrypt(decryptor))
}

impl<R, W: Write> Streams<R, W> {
    fn process_pending(&mut self) -> Result<()> {
        let Some(engine) = &mut self.engine else {
            bail!("cipher is not initialized");
        };
        let ready_len = match engine {
            Engine::Encrypt(_) => self.pending.len() / BLOCK_LEN * BLOCK_LEN,
            Engine::Decrypt(_) => self.pending.len().saturating_sub(1) / BLOCK_LEN * BLOCK_LEN,
        };
        let ready = &mut self.pending[..ready_len];
        match engine {
            Engine::Encrypt(encryptor) => {
                for block in ready.chunks_exact_mut(BLOCK_LEN) {
                    encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
            Engine::Decrypt(decryptor) => {
                for block in ready.chunks_exact_mut(BLOCK_LEN) {
                    decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
        }
        self.output
            .write_all(ready)
            .context("failed to write output")?;
        self.pending.drain(..ready_len);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(Engine::Encrypt(encryptor)) => {
                let last = encryptor.encrypt_padded_vec_mut::<Pkcs7>(&self.pending);
                self.output
                    .write_all(&last)
                    .context("failed to write output")?;
            }
            Some(Engine::Decrypt(decryptor)) => {
                if self.pending.is_empty() {
                    bail!(CipherError::EmptyCiphertext);
                }
                if self.pending.len() != BLOCK_LEN {
                    bail!(CipherError::TruncatedBlock);
                }
                let Ok(last) = decryptor.decrypt_padded_mut::<Pkcs7>(&mut self.pending) else {
                    bail!(CipherError::InvalidPadding);
                };
                self.output
                    .write_all(last)
                    .context("failed to write output")?;
            }
            None => bail!("cipher is not initialized"),
        }
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
#[expect(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::unwrap_used,
    reason = "test"
)]
mod tests {
    use {super::*, std::io::Cursor};

    fn encrypt(password: &[u8], plaintext: &[u8], chunk_len: usize) -> Vec<u8> {
        let mut output = Vec::new();
        let mut cipher = ChunkCipher::new(
            Direction::Encrypt,
            password,
            plaintext,
            plaintext.len() as u64,
            &mut output,
        )
        .with_chunk_len(chunk_len)
        .unwrap();
        let total = cipher.total_chunks();
        let mut steps = 0;
        while cipher.encrypt_chunk().unwrap() {
            steps += 1;
        }
        assert_eq!(steps, total);
        assert!(cipher.is_closed());
        drop(cipher);
        output
    }

    fn decrypt(password: &[u8], container: &[u8], chunk_len: usize) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut cipher = ChunkCipher::new(
            Direction::Decrypt,
            password,
            container,
            container.len() as u64,
            &mut output,
        )
        .with_chunk_len(chunk_len)?;
        let total = cipher.total_chunks();
        let mut steps = 0;
        while cipher.decrypt_chunk()? {
            steps += 1;
        }
        assert_eq!(steps, total);
        drop(cipher);
        Ok(output)
    }

    #[test]
    fn roundtrip_various_lengths() {
        for len in [0, 1, 15, 16, 17, 31, 32, 33, 64, 100, 4096, 5000] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            for chunk_len in [16, 32, CHUNK_LEN] {
                let container = encrypt(b"pw", &plaintext, chunk_len);
                assert_eq!(container.len(), IV_LEN + (len / BLOCK_LEN + 1) * BLOCK_LEN);
                let decrypted = decrypt(b"pw", &container, chunk_len).unwrap();
                assert_eq!(decrypted, plaintext, "len = {len}, chunk_len = {chunk_len}");
            }
        }
    }

    #[test]
    fn chunk_len_does_not_change_output_format() {
        let plaintext = vec![42u8; 1000];
        let container = encrypt(b"pw", &plaintext, 16);
        assert_eq!(decrypt(b"pw", &container, CHUNK_LEN).unwrap(), plaintext);
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let first = encrypt(b"pw", b"same input", CHUNK_LEN);
        let second = encrypt(b"pw", b"same input", CHUNK_LEN);
        assert_ne!(first[..IV_LEN], second[..IV_LEN]);
        assert_ne!(first[IV_LEN..], second[IV_LEN..]);
    }

    #[test]
    fn matches_reference_cbc() {
        let plaintext = b"a message that spans more than two blocks";
        let container = encrypt(b"secret", plaintext, 16);
        let iv: Iv = container[..IV_LEN].try_into().unwrap();
        let key = derive_key(b"secret", &iv);
        let expected = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        assert_eq!(container[IV_LEN..], expected[..]);
    }

    #[test]
    fn missing_iv() {
        let err = decrypt(b"pw", &[0u8; 10], CHUNK_LEN).unwrap_err();
        assert_eq!(err.downcast_ref(), Some(&CipherError::MissingIv));
    }

    #[test]
    fn empty_ciphertext() {
        let err = decrypt(b"pw", &[0u8; IV_LEN], CHUNK_LEN).unwrap_err();
        assert_eq!(err.downcast_ref(), Some(&CipherError::EmptyCiphertext));
    }

    #[test]
    fn truncated_block() {
        let container = encrypt(b"pw", b"some plaintext bytes", CHUNK_LEN);
        let err = decrypt(b"pw", &container[..container.len() - 1], CHUNK_LEN).unwrap_err();
        assert_eq!(err.downcast_ref(), Some(&CipherError::TruncatedBlock));
    }

    #[test]
    fn decrypt_with_wrong_password_does_not_round_trip() {
        let plaintext = vec![7u8; 100];
        let container = encrypt(b"right", &plaintext, CHUNK_LEN);
        match decrypt(b"wrong", &container, CHUNK_LEN) {
            Ok(output) => assert_ne!(output, plaintext),
            Err(err) => assert_eq!(err.downcast_ref(), Some(&CipherError::InvalidPadding)),
        }
    }

    #[test]
    fn close_is_idempotent() {
        let mut output = Vec::new();
        let mut cipher =
            ChunkCipher::new(Direction::Encrypt, b"pw", &b"abc"[..], 3, &mut output);
        assert!(cipher.encrypt_chunk().unwrap());
        cipher.close().unwrap();
        cipher.close().unwrap();
        assert!(cipher.is_closed());
        assert!(!cipher.encrypt_chunk().unwrap());
    }

    #[test]
    fn wrong_direction() {
        let mut output = Vec::new();
        let mut cipher =
            ChunkCipher::new(Direction::Encrypt, b"pw", &b"abc"[..], 3, &mut output);
        assert!(cipher.decrypt_chunk().is_err());
        assert!(cipher.encrypt_chunk().unwrap());
    }

    #[test]
    fn total_chunks_for_both_directions() {
        let encryptor = ChunkCipher::new(
            Direction::Encrypt,
            b"pw",
            Cursor::new(Vec::new()),
            8193,
            Vec::new(),
        );
        assert_eq!(encryptor.total_chunks(), 3);
        let decryptor = ChunkCipher::new(
            Direction::Decrypt,
            b"pw",
            Cursor::new(Vec::new()),
            (IV_LEN + 8192) as u64,
            Vec::new(),
        );
        assert_eq!(decryptor.total_chunks(), 2);
    }

    #[test]
    fn rejects_unaligned_chunk_len() {
        let cipher = ChunkCipher::new(Direction::Encrypt, b"pw", &b""[..], 0, Vec::new());
        assert!(cipher.with_chunk_len(10).is_err());
    }

    #[test]
    fn files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        let sealed = dir.path().join("sealed");
        let opened = dir.path().join("opened");
        fs_err::write(&plain, b"file contents").unwrap();

        let mut cipher =
            ChunkCipher::open(Direction::Encrypt, b"pw", &plain, &sealed).unwrap();
        assert_eq!(cipher.total_chunks(), 1);
        cipher.encrypt_all().unwrap();

        let mut cipher =
            ChunkCipher::open(Direction::Decrypt, b"pw", &sealed, &opened).unwrap();
        cipher.decrypt_all().unwrap();
        assert_eq!(fs_err::read(&opened).unwrap(), b"file contents");

        let missing_input = dir.path().join("none");
        assert!(ChunkCipher::open(Direction::Encrypt, b"pw", missing_input, &sealed).is_err());
        let missing_dir = dir.path().join("a/b");
        assert!(ChunkCipher::open(Direction::Encrypt, b"pw", &plain, missing_dir).is_err());
    }
}
