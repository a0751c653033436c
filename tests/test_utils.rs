// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utilities for tests. Not every test module uses every item, so we
//! suppress unused warnings.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uptane_verify::{FilesystemTransport, Transport, TransportError};
use url::Url;

/// Returns the path to our test data directory.
#[allow(unused)]
pub fn test_data() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
}

/// Converts a directory path into a `file://` URL.
#[allow(unused)]
pub fn dir_url<P: AsRef<Path>>(path: P) -> Url {
    Url::from_directory_path(path).unwrap()
}

/// A filesystem transport that records every URL it is asked to fetch, so
/// tests can assert which files the verifier touched.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    inner: FilesystemTransport,
    log: Arc<Mutex<Vec<String>>>,
}

#[allow(unused)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            inner: FilesystemTransport,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every URL fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Forgets the fetches recorded so far.
    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

impl Transport for RecordingTransport {
    fn fetch(&self, url: Url) -> Result<Box<dyn std::io::Read + Send>, TransportError> {
        self.log.lock().unwrap().push(url.to_string());
        self.inner.fetch(url)
    }
}
