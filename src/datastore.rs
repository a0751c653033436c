// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::{self, Result};
use crate::schema::{Document, RoleType};
use log::debug;
use snafu::ResultExt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// `Datastore` persists validated role metadata and downloaded targets for
/// one repository. Every write is a temp-file-plus-rename within the
/// datastore directory, so a partially written file is never observable
/// under its final name.
#[derive(Debug)]
pub(crate) struct Datastore {
    path: DatastorePath,
}

impl Datastore {
    /// Opens (creating if needed) the datastore at `path`, or an ephemeral
    /// temporary directory when `path` is `None`.
    pub(crate) fn new(path: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            path: match path {
                None => DatastorePath::TempDir(TempDir::new().context(error::DatastoreInitSnafu)?),
                Some(p) => {
                    fs::create_dir_all(&p).context(error::DatastoreInitSnafu)?;
                    DatastorePath::Path(p)
                }
            },
        })
    }

    /// Loads the stored document for `role`, or `None` if there isn't one.
    pub(crate) fn load(&self, role: RoleType) -> Result<Option<Document>> {
        let path = self.path().join(role.filename());
        match File::open(&path) {
            Ok(file) => Ok(Some(
                serde_json::from_reader(file).context(error::DatastoreParseSnafu { path })?,
            )),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(None),
                _ => Err(err).context(error::DatastoreOpenSnafu { path }),
            },
        }
    }

    /// Atomically replaces the stored document for `role`.
    pub(crate) fn save(&self, role: RoleType, document: &Document) -> Result<()> {
        let path = self.path().join(role.filename());
        let temp = NamedTempFile::new_in(self.path())
            .context(error::DatastoreCreateSnafu { path: &path })?;
        serde_json::to_writer_pretty(&temp, document)
            .context(error::DatastoreSerializeSnafu { path: &path })?;
        temp.persist(&path)
            .context(error::DatastorePersistSnafu { path: &path })?;
        debug!("wrote '{}'", path.display());
        Ok(())
    }

    /// Atomically writes a downloaded target under the `targets/`
    /// subdirectory. `name` may contain subdirectories; the caller is
    /// responsible for rejecting names that escape the datastore.
    pub(crate) fn save_target(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path().join("targets").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(error::DatastoreCreateSnafu { path: parent })?;
        }
        let mut temp = NamedTempFile::new_in(self.path())
            .context(error::DatastoreCreateSnafu { path: &path })?;
        temp.write_all(data)
            .context(error::DatastoreWriteSnafu { path: &path })?;
        temp.persist(&path)
            .context(error::DatastorePersistSnafu { path: &path })?;
        debug!("wrote target '{}' ({} bytes)", path.display(), data.len());
        Ok(())
    }

    fn path(&self) -> &Path {
        match &self.path {
            DatastorePath::Path(p) => p,
            DatastorePath::TempDir(t) => t.path(),
        }
    }
}

/// Because `TempDir` is an RAII object, we need to hold on to it. This
/// private enum holds either a caller-managed directory or a `TempDir`
/// cleaned up on drop.
#[derive(Debug)]
enum DatastorePath {
    /// Path to a caller-managed directory.
    Path(PathBuf),
    /// A `TempDir` created on the caller's behalf.
    TempDir(TempDir),
}

#[cfg(test)]
mod tests {
    use super::Datastore;
    use crate::schema::{Document, RoleType};
    use serde_json::json;

    fn document() -> Document {
        serde_json::from_value(json!({
            "signed": {"_type": "timestamp", "version": 4, "expires": "2038-01-19T03:14:08Z"},
            "signatures": [{"keyid": "aa", "method": "ed25519", "sig": "bb"}],
        }))
        .unwrap()
    }

    #[test]
    fn load_returns_none_for_missing_documents() {
        let datastore = Datastore::new(None).unwrap();
        assert!(datastore.load(RoleType::Root).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let datastore = Datastore::new(None).unwrap();
        let original = document();
        datastore.save(RoleType::Timestamp, &original).unwrap();
        let loaded = datastore.load(RoleType::Timestamp).unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let datastore = Datastore::new(None).unwrap();
        datastore.save(RoleType::Timestamp, &document()).unwrap();

        let mut newer = document();
        newer.signed["version"] = json!(5);
        datastore.save(RoleType::Timestamp, &newer).unwrap();

        let loaded = datastore.load(RoleType::Timestamp).unwrap().unwrap();
        assert_eq!(loaded.version().unwrap().get(), 5);
    }

    #[test]
    fn targets_are_written_under_the_targets_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let datastore = Datastore::new(Some(dir.path().join("image"))).unwrap();
        datastore.save_target("ecu1/firmware.bin", b"payload").unwrap();
        let written = std::fs::read(dir.path().join("image/targets/ecu1/firmware.bin")).unwrap();
        assert_eq!(written, b"payload");
    }
}
