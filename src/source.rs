//! Line oriented access to the input stream.

use std::io::{BufRead, Read};

use crate::error::Result;

/// What the decoder needs from its input: the header is read line by line,
/// the grid section in one go.
pub trait LineSource {
    /// Next line without its terminator, `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>>;

    /// Everything left in the stream.
    fn read_rest(&mut self) -> Result<Vec<u8>>;

    /// 1-based number of the last line returned by `next_line`.
    fn line_number(&self) -> usize;
}

/// [`LineSource`] over any buffered reader.
///
/// Lines are decoded lossily so Latin-1 titles do not abort a decode.
pub struct GxfSource<R> {
    inner: R,
    line_number: usize,
}

impl<R: BufRead> GxfSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_number: 0,
        }
    }
}

impl<R: BufRead> LineSource for GxfSource<R> {
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        if self.inner.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        self.line_number += 1;
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn read_rest(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn line_number(&self) -> usize {
        self.line_number
    }
}
