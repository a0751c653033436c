// SPDX-License-Identifier: MIT OR Apache-2.0

//! uptane-verify is a client-side verifier for Uptane/TUF repositories: it
//! fetches the signed `root`/`timestamp`/`snapshot`/`targets` metadata
//! chain, verifies signature thresholds against the key set the current
//! root declares, persists validated documents atomically, and downloads
//! length- and hash-checked target files.
//!
//! One [`Repository`] is instantiated per repository (an Uptane client
//! typically runs one for the Director and one for the Image repository).
//! The caller drives it with [`Repository::update_root`] to (re)anchor
//! trust and [`Repository::refresh`] to pick up new metadata and targets;
//! [`Repository::targets`] lists what the last successful refresh
//! described.
//!
//! Network access goes through the [`Transport`] trait; a
//! [`FilesystemTransport`] is provided, and HTTP(S) transports with
//! whatever authentication the repository needs are the caller's to
//! supply. Validated metadata lives in a per-repository directory owned
//! exclusively by the verifier.

#![deny(rust_2018_idioms, missing_docs)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

mod datastore;
pub mod error;
mod fetch;
mod io;
pub mod schema;
mod transport;
mod trust;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::transport::{FilesystemTransport, Transport, TransportError, TransportErrorKind};

use crate::datastore::Datastore;
use crate::fetch::{fetch_bytes, fetch_json};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::SignatureMethod;
use crate::schema::{Document, RoleBody, RoleType, Target, TargetHash};
use crate::trust::TrustState;
use log::debug;
use serde_json::Value;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// The default lower bound on role signature thresholds.
pub const MIN_SIGNATURES: u64 = 1;

/// The default upper bound on role signature thresholds.
pub const MAX_SIGNATURES: u64 = 1000;

/// Caps applied while fetching and validating metadata.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// The largest metadata document the verifier will read, in bytes.
    pub max_metadata_size: u64,
    /// The smallest signature threshold a root may declare for any role.
    pub min_signatures: u64,
    /// The largest signature threshold a root may declare for any role.
    pub max_signatures: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_metadata_size: 1024 * 1024,
            min_signatures: MIN_SIGNATURES,
            max_signatures: MAX_SIGNATURES,
        }
    }
}

/// Configuration for a [`Repository`].
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// The directory under which this repository's metadata and targets
    /// are persisted (a subdirectory named after the repository is
    /// created inside it). `None` uses a temporary directory that is
    /// removed when the verifier is dropped.
    pub metadata_root: Option<PathBuf>,
    /// Fetch and validation caps.
    pub limits: Limits,
}

/// A validated description of one target file, in the form consumers of
/// the verifier act on.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescriptor {
    /// The target's name: its path relative to the repository base URL.
    pub name: String,
    /// The exact byte length the metadata declares.
    pub length: u64,
    /// The content hash the downloaded file matched (SHA-512 preferred
    /// over SHA-256 when the metadata offers both).
    pub hash: TargetHash,
    /// Opaque application metadata, verbatim from the targets document.
    pub custom: Value,
}

/// A verifier for one Uptane/TUF repository.
///
/// Construction seeds trust from any previously persisted root document
/// and the freshness counter from any previously persisted timestamp, so
/// a verifier picks up where the last process left off without touching
/// the network.
#[derive(Debug)]
pub struct Repository {
    name: String,
    base_url: Url,
    limits: Limits,
    transport: Box<dyn Transport>,
    datastore: Datastore,
    trust: TrustState,
    timestamp_version: u64,
    targets: Vec<TargetDescriptor>,
}

impl Repository {
    /// Creates a verifier for the repository at `base_url`, persisting
    /// under `name` per `settings`.
    pub fn new(
        transport: Box<dyn Transport>,
        name: &str,
        base_url: Url,
        settings: Settings,
    ) -> Result<Self> {
        let datastore = Datastore::new(settings.metadata_root.map(|root| root.join(name)))?;

        let trust = match datastore.load(RoleType::Root)? {
            Some(document) => {
                let root = match document.body()? {
                    RoleBody::Root(root) => root,
                    body => {
                        return error::WrongRoleSnafu {
                            repo: name,
                            expected: RoleType::Root,
                            found: body_role(&body),
                        }
                        .fail()
                    }
                };
                debug!("{name}: seeding trust from stored root version {}", root.version);
                TrustState::from_root(name, &root, &settings.limits)?
            }
            None => {
                debug!("{name}: no stored root, trust is empty until update_root");
                TrustState::empty()
            }
        };

        let timestamp_version = match datastore.load(RoleType::Timestamp)? {
            Some(document) => document.version()?.get(),
            None => 0,
        };

        Ok(Self {
            name: name.to_owned(),
            base_url: ensure_trailing_slash(base_url),
            limits: settings.limits,
            transport,
            datastore,
            trust,
            timestamp_version,
            targets: Vec::new(),
        })
    }

    /// Fetches `root.json`, ingests its key and role tables into a
    /// candidate trust state, verifies the document's signatures under
    /// that candidate (a valid root is self-signed by the keys it
    /// declares), then persists it and replaces the live trust.
    ///
    /// On any failure the previous trust state remains in effect.
    pub fn update_root(&mut self) -> Result<()> {
        let document = self.fetch_metadata(RoleType::Root.filename())?;
        let root = match document.body()? {
            RoleBody::Root(root) => root,
            body => {
                return error::WrongRoleSnafu {
                    repo: &self.name,
                    expected: RoleType::Root,
                    found: body_role(&body),
                }
                .fail()
            }
        };

        let candidate = TrustState::from_root(&self.name, &root, &self.limits)?;
        verify_document(&self.name, &candidate, &document)?;
        self.datastore.save(RoleType::Root, &document)?;
        self.trust = candidate;
        debug!("{}: trust re-anchored to root version {}", self.name, root.version);
        Ok(())
    }

    /// Runs one update cycle: checks the timestamp for freshness and, if a
    /// new snapshot is available, validates every role document the
    /// snapshot names (re-anchoring root first if the snapshot lists it)
    /// and downloads the targets the targets role describes.
    ///
    /// Returns without fetching anything further when the timestamp's
    /// version is not strictly greater than the last seen version. On
    /// success [`Repository::targets`] reflects the new targets list; on
    /// error it keeps reporting the last successful refresh.
    pub fn refresh(&mut self) -> Result<()> {
        let timestamp = self.fetch_metadata(RoleType::Timestamp.filename())?;
        let role = verify_document(&self.name, &self.trust, &timestamp)?;
        ensure!(
            role == RoleType::Timestamp,
            error::WrongRoleSnafu {
                repo: &self.name,
                expected: RoleType::Timestamp,
                found: role,
            }
        );
        let version = timestamp.version()?.get();
        if version <= self.timestamp_version {
            debug!(
                "{}: timestamp version {} is not newer than {}, nothing to do",
                self.name, version, self.timestamp_version
            );
            return Ok(());
        }
        self.datastore.save(RoleType::Timestamp, &timestamp)?;
        self.timestamp_version = version;

        let snapshot_document = self.update_role(RoleType::Snapshot.filename())?;
        let snapshot = match snapshot_document.body()? {
            RoleBody::Snapshot(snapshot) => snapshot,
            body => {
                return error::WrongRoleSnafu {
                    repo: &self.name,
                    expected: RoleType::Snapshot,
                    found: body_role(&body),
                }
                .fail()
            }
        };

        let mut meta = snapshot.meta;
        // Root must be re-anchored before any other role the snapshot
        // names is validated.
        if meta.remove(RoleType::Root.filename()).is_some() {
            self.update_root()?;
        }

        let mut staged = Vec::new();
        for (path, entry) in meta {
            debug!("{}: snapshot lists {} at version {}", self.name, path, entry.version);
            let document = self.update_role(&path)?;
            if let RoleBody::Targets(targets) = document.body()? {
                for (name, target) in targets.targets {
                    let descriptor = self.describe_target(name, &target)?;
                    self.save_target(descriptor, &mut staged)?;
                }
            }
        }

        self.targets = staged;
        Ok(())
    }

    /// The target descriptors from the last successful refresh, in the
    /// order they were processed.
    pub fn targets(&self) -> &[TargetDescriptor] {
        &self.targets
    }

    /// Fetches, verifies, and persists the role document at `path`,
    /// storing it under the role its `_type` declares.
    fn update_role(&mut self, path: &str) -> Result<Document> {
        let document = self.fetch_metadata(path)?;
        let role = verify_document(&self.name, &self.trust, &document)?;
        self.datastore.save(role, &document)?;
        Ok(document)
    }

    /// Downloads and checks one target, then appends it to `staged`.
    /// Zero-length targets are metadata-only: they are staged without any
    /// network traffic.
    fn save_target(
        &self,
        target: TargetDescriptor,
        staged: &mut Vec<TargetDescriptor>,
    ) -> Result<()> {
        if target.length > 0 {
            ensure!(
                safe_target_name(&target.name),
                error::UnsafeTargetNameSnafu {
                    repo: &self.name,
                    name: &target.name,
                }
            );
            let url = self.url_for(&target.name)?;
            let data = fetch_bytes(self.transport.as_ref(), url, target.length)?;
            ensure!(
                data.len() as u64 <= target.length,
                error::OversizedTargetSnafu {
                    repo: &self.name,
                    name: &target.name,
                    length: target.length,
                }
            );
            if !target.hash.matches(&data) {
                return error::TargetHashMismatchSnafu {
                    repo: &self.name,
                    name: &target.name,
                    calculated: target.hash.calculate_hex(&data),
                    expected: target.hash.expected_hex(),
                }
                .fail();
            }
            self.datastore.save_target(&target.name, &data)?;
        }
        staged.push(target);
        Ok(())
    }

    /// Builds the consumer-facing descriptor for one targets-map entry.
    fn describe_target(&self, name: String, target: &Target) -> Result<TargetDescriptor> {
        let hash = target
            .hashes
            .preferred()
            .context(error::MissingHashSnafu {
                repo: &self.name,
                name: &name,
            })?;
        Ok(TargetDescriptor {
            name,
            length: target.length,
            hash,
            custom: target.custom.clone(),
        })
    }

    fn fetch_metadata(&self, path: &str) -> Result<Document> {
        fetch_json(
            self.transport.as_ref(),
            self.url_for(path)?,
            self.limits.max_metadata_size,
            "role metadata",
        )
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .context(error::UrlJoinSnafu { path })
    }
}

/// Verifies a role document against a trust state, returning the role the
/// document declares.
///
/// A document passes when its signatures are non-empty, every signature
/// uses a supported method, references a trusted key, and verifies over
/// the canonical form of `signed`, and the number of *distinct* key ids
/// among them meets the role's threshold. A single bad signature rejects
/// the whole document, and duplicate signatures from one key count once.
fn verify_document(repo: &str, trust: &TrustState, document: &Document) -> Result<RoleType> {
    let role = document.role_type()?;
    let threshold = trust
        .threshold(role.name())
        .context(error::MissingRoleSnafu { repo, role })?;

    ensure!(
        !document.signatures.is_empty(),
        error::MissingSignaturesSnafu { repo }
    );
    ensure!(
        document.signatures.len() as u64 >= threshold,
        error::SignatureThresholdSnafu {
            repo,
            role,
            count: document.signatures.len() as u64,
            threshold,
        }
    );

    let canonical = document.canonical_signed()?;
    let mut verified: HashSet<&Decoded<Hex>> = HashSet::new();
    for signature in &document.signatures {
        let method = SignatureMethod::parse(&signature.method).context(
            error::UnsupportedMethodSnafu {
                repo,
                method: &signature.method,
            },
        )?;
        let key = trust
            .key(&signature.keyid)
            .context(error::UnknownKeyIdSnafu {
                repo,
                keyid: signature.keyid.original(),
            })?;
        ensure!(
            key.verify(repo, method, &canonical, &signature.sig)?,
            error::InvalidSignatureSnafu {
                repo,
                keyid: signature.keyid.original(),
            }
        );
        verified.insert(&signature.keyid);
    }
    ensure!(
        verified.len() as u64 >= threshold,
        error::SignatureThresholdSnafu {
            repo,
            role,
            count: verified.len() as u64,
            threshold,
        }
    );
    Ok(role)
}

/// Whether a target name stays inside the repository's targets directory.
fn safe_target_name(name: &str) -> bool {
    let path = Path::new(name);
    let mut components = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => components += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    components > 0
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn body_role(body: &RoleBody) -> RoleType {
    match body {
        RoleBody::Root(_) => RoleType::Root,
        RoleBody::Timestamp(_) => RoleType::Timestamp,
        RoleBody::Snapshot(_) => RoleType::Snapshot,
        RoleBody::Targets(_) => RoleType::Targets,
    }
}
