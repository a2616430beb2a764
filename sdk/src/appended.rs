use std::io::{self, Read};

/// Reads all of `inner`, then the bytes of a fixed suffix.
pub struct AppendedReader<R> {
    inner: R,
    inner_done: bool,
    suffix: Vec<u8>,
    suffix_pos: usize,
}

impl<R: Read> AppendedReader<R> {
    #[inline]
    pub fn new(inner: R, suffix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            inner_done: false,
            suffix: suffix.into(),
            suffix_pos: 0,
        }
    }

    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for AppendedReader<R> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.inner_done {
            let len = self.inner.read(buf)?;
            if len > 0 {
                return Ok(len);
            }
            self.inner_done = true;
        }
        let rest = &self.suffix[self.suffix_pos..];
        let len = rest.len().min(buf.len());
        buf[..len].copy_from_slice(&rest[..len]);
        self.suffix_pos += len;
        Ok(len)
    }
}
