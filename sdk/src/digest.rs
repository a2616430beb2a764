//! Streaming content checksum computed in fixed-size chunks.

use {
    crate::container::{self, CHUNK_LEN},
    anyhow::{Context, Result, ensure},
    fs_err::File,
    md5::{Digest, Md5},
    std::{
        fmt::{self, Display},
        io::{self, Read},
        marker::PhantomData,
        path::Path,
    },
    subtle::ConstantTimeEq,
};

/// A digest algorithm usable by [`ChunkDigest`].
pub trait DigestAlgorithm {
    /// Length of the produced checksum in bytes.
    const LEN: usize;

    type Hasher: Digest;
}

/// 128-bit MD5. Used for corruption detection only.
#[derive(Debug, Clone, Copy)]
pub struct Md5Algorithm;

impl DigestAlgorithm for Md5Algorithm {
    const LEN: usize = 16;

    type Hasher = Md5;
}

/// Finalized checksum bytes.
#[derive(Debug, Clone)]
pub struct Checksum(Vec<u8>);

impl Checksum {
    #[must_use]
    #[inline]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Compares two checksums without short-circuiting on the first
    /// differing byte.
    #[must_use]
    #[inline]
    pub fn matches(&self, other: &Checksum) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Display for Checksum {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

/// Feeds a stream into a running digest, one chunk per [`digest_chunk`](Self::digest_chunk) call.
pub struct ChunkDigest<A: DigestAlgorithm, R = File> {
    reader: R,
    hasher: A::Hasher,
    buf: Vec<u8>,
    total_chunks: u64,
    eof: bool,
    _algorithm: PhantomData<A>,
}

impl<A: DigestAlgorithm> ChunkDigest<A> {
    /// Opens `path` for digesting with the default chunk length.
    #[inline]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_chunk_len(path, CHUNK_LEN)
    }

    #[inline]
    pub fn open_with_chunk_len(path: impl AsRef<Path>, chunk_len: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Self::new(file, len, chunk_len)
    }
}

impl<A: DigestAlgorithm, R: Read> ChunkDigest<A, R> {
    /// Wraps a reader of `stream_len` bytes.
    ///
    /// `stream_len` is only used for [`total_chunks`](Self::total_chunks);
    /// digesting always continues until the reader reports EOF.
    #[inline]
    pub fn new(reader: R, stream_len: u64, chunk_len: usize) -> Result<Self> {
        ensure!(chunk_len > 0, "chunk length must be positive");
        Ok(Self {
            reader,
            hasher: A::Hasher::new(),
            buf: vec![0; chunk_len],
            total_chunks: container::total_chunks(stream_len, chunk_len.try_into()?),
            eof: false,
            _algorithm: PhantomData,
        })
    }

    #[must_use]
    #[inline]
    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Digests the next chunk. Returns `false` once the stream is exhausted;
    /// no data was consumed by that call.
    #[inline]
    pub fn digest_chunk(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let len = fill_buf(&mut self.reader, &mut self.buf).context("failed to read input")?;
        if len < self.buf.len() {
            self.eof = true;
        }
        if len == 0 {
            return Ok(false);
        }
        self.hasher.update(&self.buf[..len]);
        Ok(true)
    }

    /// Runs [`digest_chunk`](Self::digest_chunk) until the stream is exhausted.
    #[inline]
    pub fn digest_all(&mut self) -> Result<()> {
        while self.digest_chunk()? {}
        Ok(())
    }

    #[must_use]
    #[inline]
    pub fn finalize(self) -> Checksum {
        Checksum(self.hasher.finalize().to_vec())
    }
}

/// Reads until `buf` is full or the reader is exhausted.
pub(crate) fn fill_buf(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, std::io::Write};

    type Md5Digest<R> = ChunkDigest<Md5Algorithm, R>;

    fn digest_bytes(data: &[u8], chunk_len: usize) -> (Checksum, u64) {
        let mut digest = Md5Digest::new(data, data.len().try_into().unwrap(), chunk_len).unwrap();
        let mut steps = 0;
        while digest.digest_chunk().unwrap() {
            steps += 1;
        }
        (digest.finalize(), steps)
    }

    #[test]
    fn digest_of_text() {
        let (checksum, _) = digest_bytes(b"Testing digest all", CHUNK_LEN);
        assert_eq!(checksum.to_string(), "18DE5DB0D3A2DAB3FDAC3934EC50F49F");
        assert_eq!(checksum.as_bytes().len(), Md5Algorithm::LEN);
    }

    #[test]
    fn digest_of_empty_input() {
        let mut digest = Md5Digest::new(&b""[..], 0, CHUNK_LEN).unwrap();
        assert_eq!(digest.total_chunks(), 0);
        assert!(!digest.digest_chunk().unwrap());
        assert_eq!(
            digest.finalize().to_string(),
            "D41D8CD98F00B204E9800998ECF8427E"
        );
    }

    #[test]
    fn small_chunks_give_same_digest() {
        let data = b"AAAAAAAAAA";
        let (whole, whole_steps) = digest_bytes(data, CHUNK_LEN);
        let (chunked, chunked_steps) = digest_bytes(data, 3);
        assert_eq!(whole.to_string(), "16C52C6E8326C071DA771E66DC6E9E57");
        assert_eq!(chunked.to_string(), whole.to_string());
        assert_eq!(whole_steps, 1);
        assert_eq!(chunked_steps, 4);
    }

    #[test]
    fn steps_match_total_chunks() {
        for len in [0_usize, 1, 3, 4, 6, 7, 100] {
            let data = vec![0x5a; len];
            let digest = Md5Digest::new(data.as_slice(), len.try_into().unwrap(), 3).unwrap();
            let total = digest.total_chunks();
            let (_, steps) = digest_bytes(&data, 3);
            assert_eq!(steps, total, "len = {len}");
        }
    }

    #[test]
    fn no_reads_after_exhausted() {
        let mut digest = Md5Digest::new(&b"abc"[..], 3, 3).unwrap();
        assert!(digest.digest_chunk().unwrap());
        assert!(!digest.digest_chunk().unwrap());
        assert!(!digest.digest_chunk().unwrap());
    }

    #[test]
    fn rejects_zero_chunk_len() {
        assert!(Md5Digest::new(&b"abc"[..], 3, 0).is_err());
    }

    #[test]
    fn file_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Testing digest all").unwrap();
        file.flush().unwrap();

        let mut digest = ChunkDigest::<Md5Algorithm>::open_with_chunk_len(file.path(), 3).unwrap();
        assert_eq!(digest.total_chunks(), 6);
        digest.digest_all().unwrap();
        assert_eq!(
            digest.finalize().to_string(),
            "18DE5DB0D3A2DAB3FDAC3934EC50F49F"
        );
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        let err = ChunkDigest::<Md5Algorithm>::open(&path).err().unwrap();
        assert!(format!("{err:#}").contains("missing"));
    }

    #[test]
    fn checksum_comparison() {
        let a = Checksum::from_bytes([1u8; 16]);
        let b = Checksum::from_bytes([1u8; 16]);
        let mut c = [1u8; 16];
        c[15] = 2;
        assert!(a.matches(&b));
        assert!(!a.matches(&Checksum::from_bytes(c)));
        assert!(!a.matches(&Checksum::from_bytes([1u8; 15])));
    }
}
