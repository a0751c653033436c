// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::{self, Result};
use crate::io::MaxSizeAdapter;
use crate::schema::Document;
use crate::transport::Transport;
use snafu::ResultExt;
use std::io::Read;
use url::Url;

/// Fetches a metadata document, failing if the response is larger than
/// `max_size` or is not valid JSON.
pub(crate) fn fetch_json(
    transport: &dyn Transport,
    url: Url,
    max_size: u64,
    specifier: &'static str,
) -> Result<Document> {
    let reader = transport
        .fetch(url.clone())
        .context(error::TransportSnafu { url: url.clone() })?;
    let mut reader = MaxSizeAdapter::new(reader, specifier, max_size);
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .context(error::FetchSnafu { url: url.clone() })?;
    serde_json::from_slice(&buf).context(error::JsonParseSnafu { url })
}

/// Fetches a raw file, reading at most `byte_cap + 1` bytes so the caller
/// can distinguish "exactly at the cap" from "over it" without an
/// unbounded read.
pub(crate) fn fetch_bytes(transport: &dyn Transport, url: Url, byte_cap: u64) -> Result<Vec<u8>> {
    let reader = transport
        .fetch(url.clone())
        .context(error::TransportSnafu { url: url.clone() })?;
    let mut buf = Vec::new();
    reader
        .take(byte_cap.saturating_add(1))
        .read_to_end(&mut buf)
        .context(error::FetchSnafu { url })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::{fetch_bytes, fetch_json};
    use crate::transport::FilesystemTransport;
    use tempfile::TempDir;
    use url::Url;

    #[test]
    fn fetch_json_applies_the_size_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"signed":{},"signatures":[]}"#).unwrap();
        let url = Url::from_file_path(&path).unwrap();

        assert!(fetch_json(&FilesystemTransport, url.clone(), 1024, "metadata").is_ok());
        assert!(fetch_json(&FilesystemTransport, url, 8, "metadata").is_err());
    }

    #[test]
    fn fetch_bytes_reads_one_byte_past_the_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"0123456789").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let buf = fetch_bytes(&FilesystemTransport, url.clone(), 4).unwrap();
        assert_eq!(buf, b"01234");
        let buf = fetch_bytes(&FilesystemTransport, url, 10).unwrap();
        assert_eq!(buf, b"0123456789");
    }
}
