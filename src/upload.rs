//! Known-length request bodies.
//!
//! The raw upload declares `Content-Length` before the first byte leaves, so
//! the body reader must produce exactly that many bytes. A file that shrinks
//! or grows between the stat and the read fails the upload with an I/O error
//! rather than sending a truncated or overlong body.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::DetectError;

/// Reader that yields exactly `expected` bytes from `inner` or fails.
pub(crate) struct KnownLengthReader<R> {
    inner: R,
    expected: u64,
    sent: u64,
}

impl<R: Read> KnownLengthReader<R> {
    pub(crate) fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            expected,
            sent: 0,
        }
    }

    fn ensure_exhausted(&mut self) -> io::Result<usize> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(0),
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "image grew past its declared length of {} bytes during upload",
                            self.expected
                        ),
                    ))
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: Read> Read for KnownLengthReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let remaining = self.expected - self.sent;
        if remaining == 0 {
            return self.ensure_exhausted();
        }
        let limit = remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..limit])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "image shrank during upload: {} of {} declared bytes available",
                    self.sent, self.expected
                ),
            ));
        }
        self.sent += n as u64;
        Ok(n)
    }
}

/// Stats `path`, then opens it for a known-length upload.
pub(crate) fn open_known_length(
    path: &Path,
) -> Result<(KnownLengthReader<BufReader<File>>, u64), DetectError> {
    let input_error = |source| DetectError::Input {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(input_error)?;
    if !metadata.is_file() {
        return Err(input_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let len = metadata.len();
    let file = File::open(path).map_err(input_error)?;
    Ok((KnownLengthReader::new(BufReader::new(file), len), len))
}
