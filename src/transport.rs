// SPDX-License-Identifier: MIT OR Apache-2.0

//! The seam between the verifier and whatever moves bytes for it. The
//! verifier only ever asks for "a reader over the file at this URL"; HTTP,
//! mutual TLS, proxies, and retry policy all live behind [`Transport`]
//! implementations owned by the caller.

use dyn_clone::DynClone;
use snafu::Snafu;
use std::fmt::Debug;
use std::io::{ErrorKind, Read};
use url::Url;

/// A method of obtaining a file given its URL.
///
/// The returned reader is consumed synchronously; the verifier applies its
/// own byte caps on top, so implementations do not need to bound reads.
pub trait Transport: Debug + DynClone {
    /// Opens a `Read` object for the file at `url`.
    fn fetch(&self, url: Url) -> Result<Box<dyn Read + Send>, TransportError>;
}

// Implement `Clone` for `Transport` trait objects.
dyn_clone::clone_trait_object!(Transport);

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The kind of failure a [`Transport`] experienced during `fetch`, for
/// callers that handle a missing file differently from a broken pipe.
#[derive(Debug, Copy, Clone)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// The transport does not handle the URL's scheme.
    UnsupportedUrlScheme,
    /// The file does not exist.
    FileNotFound,
    /// Any other failure, e.g. an I/O or protocol error.
    Other,
}

/// The error type that [`Transport::fetch`] returns.
#[derive(Debug, Snafu)]
#[snafu(display("transport error fetching '{url}': {source}"))]
pub struct TransportError {
    /// The kind of failure that occurred.
    pub kind: TransportErrorKind,
    /// The URL that was being fetched.
    pub url: String,
    /// The underlying failure.
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    /// Creates a new [`TransportError`].
    pub fn new<S, E>(kind: TransportErrorKind, url: S, source: E) -> Self
    where
        S: AsRef<str>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            url: url.as_ref().into(),
            source: source.into(),
        }
    }

    /// Creates a [`TransportError`] reporting an unhandled URL scheme.
    pub fn unsupported_scheme<S: AsRef<str>>(url: S) -> Self {
        TransportError::new(
            TransportErrorKind::UnsupportedUrlScheme,
            url,
            "transport cannot handle the given URL scheme".to_string(),
        )
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// A [`Transport`] over `file://` URLs, serving repositories straight from
/// the local filesystem.
#[derive(Debug, Clone, Copy)]
pub struct FilesystemTransport;

impl Transport for FilesystemTransport {
    fn fetch(&self, url: Url) -> Result<Box<dyn Read + Send>, TransportError> {
        if url.scheme() != "file" {
            return Err(TransportError::unsupported_scheme(url));
        }

        let f = std::fs::File::open(url.path()).map_err(|e| {
            let kind = match e.kind() {
                ErrorKind::NotFound => TransportErrorKind::FileNotFound,
                _ => TransportErrorKind::Other,
            };
            TransportError::new(kind, url, e)
        })?;
        Ok(Box::new(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn filesystem_transport_rejects_other_schemes() {
        let url = Url::from_str("ftp://example.com/root.json").unwrap();
        let error = FilesystemTransport.fetch(url).err().unwrap();
        assert!(matches!(
            error.kind,
            TransportErrorKind::UnsupportedUrlScheme
        ));
    }

    #[test]
    fn filesystem_transport_distinguishes_missing_files() {
        let dir = TempDir::new().unwrap();
        let url = Url::from_file_path(dir.path().join("no-such-file")).unwrap();
        let error = FilesystemTransport.fetch(url).err().unwrap();
        assert!(matches!(error.kind, TransportErrorKind::FileNotFound));
    }

    #[test]
    fn filesystem_transport_reads_files() {
        let dir = TempDir::new().unwrap();
        let filepath = dir.path().join("file.txt");
        std::fs::write(&filepath, "123123987").unwrap();
        let mut read = FilesystemTransport
            .fetch(Url::from_file_path(filepath).unwrap())
            .unwrap();
        let mut contents = String::new();
        read.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "123123987");
    }
}
