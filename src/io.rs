// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{self, ErrorKind, Read};

/// Wraps a reader and fails with `InvalidData` as soon as more than
/// `max_size` bytes have been produced. Used for metadata fetches, where
/// anything over the cap is a protocol violation rather than data the
/// caller wants to inspect.
pub(crate) struct MaxSizeAdapter<R> {
    inner: R,
    specifier: &'static str,
    max_size: u64,
    counter: u64,
}

impl<R> MaxSizeAdapter<R> {
    pub(crate) fn new(inner: R, specifier: &'static str, max_size: u64) -> Self {
        Self {
            inner,
            specifier,
            max_size,
            counter: 0,
        }
    }
}

impl<R: Read> Read for MaxSizeAdapter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let size = self.inner.read(buf)?;
        self.counter = self.counter.saturating_add(size as u64);
        if self.counter > self.max_size {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "{} exceeded the maximum of {} bytes",
                    self.specifier, self.max_size
                ),
            ));
        }
        Ok(size)
    }
}
