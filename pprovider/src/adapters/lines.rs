//! Reassembles newline-delimited protocol lines from raw HTTP chunks.
//!
//! Backends flush chunks at arbitrary byte offsets, so a multi-byte UTF-8
//! character can arrive split across two chunks. Decoding happens per
//! complete line, never per chunk; bytes after the last newline stay
//! buffered until the rest of the line arrives.

use crate::ProviderError;

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Pops the next complete line, trimmed, or `None` when no full line
    /// is buffered yet. A complete line that still is not valid UTF-8 is
    /// a transport error.
    pub fn next_line(&mut self) -> Result<Option<String>, ProviderError> {
        let Some(newline_index) = self.bytes.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };

        let line: Vec<u8> = self.bytes.drain(..=newline_index).collect();
        let line = std::str::from_utf8(&line)
            .map_err(|err| ProviderError::transport(err.to_string()))?;
        Ok(Some(line.trim().to_string()))
    }
}
