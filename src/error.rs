// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for [`uptane-verify`](crate).

// Not really worried about the memory penalty of large enum variants here
#![allow(clippy::large_enum_variant)]

use crate::schema::RoleType;
use crate::transport::TransportError;
use snafu::Snafu;
use std::path::PathBuf;
use url::Url;

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for this crate. Use [`Error::kind`] to classify an error
/// without matching on individual variants.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// A role document carried no signatures at all.
    #[snafu(display("{repo}: Missing signatures, verification failed"))]
    MissingSignatures {
        /// The repository that served the document.
        repo: String,
    },

    /// Fewer valid signatures from distinct keys than the role's threshold.
    #[snafu(display(
        "{repo}: role '{role}' has {count} valid signatures from distinct keys, threshold is {threshold}"
    ))]
    SignatureThreshold {
        /// The repository that served the document.
        repo: String,
        /// The role being verified.
        role: RoleType,
        /// How many signatures counted toward the threshold.
        count: u64,
        /// The threshold the current root demands.
        threshold: u64,
    },

    /// A signature referenced a key id absent from the trusted key set.
    #[snafu(display("{repo}: signature from unknown key id '{keyid}'"))]
    UnknownKeyId {
        /// The repository that served the document.
        repo: String,
        /// The unrecognized key id.
        keyid: String,
    },

    /// A signature declared a method this crate does not implement.
    #[snafu(display("{repo}: unsupported signature method '{method}'"))]
    UnsupportedMethod {
        /// The repository that served the document.
        repo: String,
        /// The method string as it appeared on the wire.
        method: String,
    },

    /// A root key table entry declared a key type this crate does not implement.
    #[snafu(display("{repo}: unsupported key type '{keytype}' for key '{keyid}'"))]
    UnsupportedKeyType {
        /// The repository that served the document.
        repo: String,
        /// The key type string as it appeared on the wire.
        keytype: String,
        /// The offending key id.
        keyid: String,
    },

    /// A signature's method does not apply to the referenced key's type.
    #[snafu(display("{repo}: method '{method}' cannot be verified with a {keytype} key"))]
    MethodMismatch {
        /// The repository that served the document.
        repo: String,
        /// The normalized signature method.
        method: &'static str,
        /// The type of the key the signature referenced.
        keytype: &'static str,
    },

    /// A signature failed cryptographic verification.
    #[snafu(display("{repo}: invalid signature from key '{keyid}', verification failed"))]
    InvalidSignature {
        /// The repository that served the document.
        repo: String,
        /// The key id whose signature did not verify.
        keyid: String,
    },

    /// A public key value could not be decoded for its declared type.
    #[snafu(display("{repo}: could not decode the public key value of key '{keyid}'"))]
    InvalidKeyValue {
        /// The repository that served the document.
        repo: String,
        /// The offending key id.
        keyid: String,
    },

    /// One root document listed the same key id twice.
    #[snafu(display("{repo}: duplicate key id '{keyid}' in root"))]
    DuplicateKeyId {
        /// The repository that served the document.
        repo: String,
        /// The duplicated key id.
        keyid: String,
    },

    /// A key id was not a hex string.
    #[snafu(display("{repo}: key id '{keyid}' is not hex-encoded: {source}"))]
    InvalidKeyId {
        /// The repository that served the document.
        repo: String,
        /// The offending key id.
        keyid: String,
        /// The underlying decode failure.
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// The current root declares no signature threshold for a role.
    #[snafu(display("{repo}: no signature threshold known for role '{role}'"))]
    MissingRole {
        /// The repository that served the document.
        repo: String,
        /// The role that has no threshold.
        role: RoleType,
    },

    /// A document's `_type` did not name the role the pipeline expected.
    #[snafu(display("{repo}: expected a {expected} document, found {found}"))]
    WrongRole {
        /// The repository that served the document.
        repo: String,
        /// The role the pipeline was processing.
        expected: RoleType,
        /// The role the document declared.
        found: RoleType,
    },

    /// A target entry listed none of the supported hash algorithms.
    #[snafu(display("{repo}: target '{name}' lists no supported hash"))]
    MissingHash {
        /// The repository that served the document.
        repo: String,
        /// The target name.
        name: String,
    },

    /// A target name would escape the repository's targets directory.
    #[snafu(display("{repo}: target name '{name}' escapes the targets directory"))]
    UnsafeTargetName {
        /// The repository that served the document.
        repo: String,
        /// The offending target name.
        name: String,
    },

    /// A document's `_type` is not one of the four top-level roles.
    #[snafu(display("unknown role '{name}'"))]
    UnknownRole {
        /// The `_type` value, already lowercased.
        name: String,
    },

    /// A required field of the signed subtree is absent or has the wrong shape.
    #[snafu(display("metadata document has no usable '{field}' field"))]
    MissingField {
        /// The field that could not be read.
        field: &'static str,
    },

    /// A hex-encoded field failed to decode.
    #[snafu(display("invalid hex string: {source}"))]
    HexDecode {
        /// The underlying decode failure.
        source: hex::FromHexError,
    },

    /// A PEM-encoded public key failed to decode.
    #[snafu(display("invalid PEM block: {source}"))]
    PemDecode {
        /// The underlying decode failure.
        source: pem::PemError,
    },

    /// A DER-encoded public key was not a well-formed SubjectPublicKeyInfo.
    #[snafu(display("invalid SubjectPublicKeyInfo: {reason}"))]
    SpkiFormat {
        /// What was wrong with the structure.
        reason: &'static str,
    },

    /// A role's signature threshold is outside the configured bounds.
    #[snafu(display("{repo}: role '{role}' declares illegal signature threshold {threshold}"))]
    IllegalThreshold {
        /// The repository that served the root.
        repo: String,
        /// The role with the out-of-bounds threshold.
        role: String,
        /// The declared threshold.
        threshold: i64,
    },

    /// A downloaded target exceeded its declared length.
    #[snafu(display("{repo}: target '{name}' exceeds its declared length of {length} bytes"))]
    OversizedTarget {
        /// The repository that served the target.
        repo: String,
        /// The target name.
        name: String,
        /// The length the targets metadata declared.
        length: u64,
    },

    /// A downloaded target's content hash did not match its metadata.
    #[snafu(display(
        "{repo}: target '{name}' hash mismatch: calculated {calculated}, expected {expected}"
    ))]
    TargetHashMismatch {
        /// The repository that served the target.
        repo: String,
        /// The target name.
        name: String,
        /// The hex digest of the bytes actually received.
        calculated: String,
        /// The hex digest the targets metadata declared.
        expected: String,
    },

    /// The transport failed to open a fetch.
    #[snafu(display("failed to fetch {url}: {source}"))]
    Transport {
        /// The URL being fetched.
        url: Url,
        /// The transport's error.
        source: TransportError,
    },

    /// Reading a fetched stream failed (including exceeding a size cap).
    #[snafu(display("failed to read {url}: {source}"))]
    Fetch {
        /// The URL being read.
        url: Url,
        /// The underlying read failure.
        source: std::io::Error,
    },

    /// A fetched document was not valid JSON.
    #[snafu(display("failed to parse {url}: {source}"))]
    JsonParse {
        /// The URL the document came from.
        url: Url,
        /// The underlying parse failure.
        source: serde_json::Error,
    },

    /// A validated document's signed subtree did not match its role's schema.
    #[snafu(display("failed to interpret metadata as a {role} document: {source}"))]
    RoleParse {
        /// The role being parsed.
        role: RoleType,
        /// The underlying parse failure.
        source: serde_json::Error,
    },

    /// Serializing JSON failed.
    #[snafu(display("failed to serialize {what}: {source}"))]
    JsonSerialization {
        /// What was being serialized.
        what: &'static str,
        /// The underlying serialization failure.
        source: serde_json::Error,
    },

    /// A relative path could not be joined to the repository base URL.
    #[snafu(display("could not join '{path}' to the repository base URL: {source}"))]
    UrlJoin {
        /// The relative path.
        path: String,
        /// The underlying parse failure.
        source: url::ParseError,
    },

    /// The datastore directory could not be created.
    #[snafu(display("failed to initialize datastore: {source}"))]
    DatastoreInit {
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// A datastore file could not be opened.
    #[snafu(display("failed to open {}: {source}", path.display()))]
    DatastoreOpen {
        /// The file being opened.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// A datastore file or directory could not be created.
    #[snafu(display("failed to create {}: {source}", path.display()))]
    DatastoreCreate {
        /// The file or directory being created.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// Writing a datastore file failed.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    DatastoreWrite {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// Serializing a document into the datastore failed.
    #[snafu(display("failed to serialize {}: {source}", path.display()))]
    DatastoreSerialize {
        /// The file being written.
        path: PathBuf,
        /// The underlying serialization failure.
        source: serde_json::Error,
    },

    /// Atomically replacing a datastore file failed.
    #[snafu(display("failed to replace {}: {source}", path.display()))]
    DatastorePersist {
        /// The file being replaced.
        path: PathBuf,
        /// The underlying rename failure.
        source: tempfile::PersistError,
    },

    /// A stored document could not be parsed.
    #[snafu(display("failed to parse stored document {}: {source}", path.display()))]
    DatastoreParse {
        /// The stored file.
        path: PathBuf,
        /// The underlying parse failure.
        source: serde_json::Error,
    },
}

/// The closed set of failure kinds; every [`Error`] maps onto exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, insufficient, or invalid signatures; unknown key ids;
    /// unsupported algorithms; malformed trust material.
    Security,
    /// A role's threshold is outside the configured bounds.
    IllegalThreshold,
    /// A target's downloaded length exceeds its declared length.
    OversizedTarget,
    /// A target's content hash does not match its declared hash.
    TargetHashMismatch,
    /// Network or parse failure.
    Transport,
    /// Local persistence failure.
    Storage,
}

impl Error {
    /// Classifies this error within the taxonomy of [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingSignatures { .. }
            | Error::SignatureThreshold { .. }
            | Error::UnknownKeyId { .. }
            | Error::UnsupportedMethod { .. }
            | Error::UnsupportedKeyType { .. }
            | Error::MethodMismatch { .. }
            | Error::InvalidSignature { .. }
            | Error::InvalidKeyValue { .. }
            | Error::DuplicateKeyId { .. }
            | Error::InvalidKeyId { .. }
            | Error::MissingRole { .. }
            | Error::WrongRole { .. }
            | Error::MissingHash { .. }
            | Error::UnsafeTargetName { .. }
            | Error::UnknownRole { .. }
            | Error::MissingField { .. }
            | Error::HexDecode { .. }
            | Error::PemDecode { .. }
            | Error::SpkiFormat { .. } => ErrorKind::Security,
            Error::IllegalThreshold { .. } => ErrorKind::IllegalThreshold,
            Error::OversizedTarget { .. } => ErrorKind::OversizedTarget,
            Error::TargetHashMismatch { .. } => ErrorKind::TargetHashMismatch,
            Error::Transport { .. }
            | Error::Fetch { .. }
            | Error::JsonParse { .. }
            | Error::RoleParse { .. }
            | Error::JsonSerialization { .. }
            | Error::UrlJoin { .. } => ErrorKind::Transport,
            Error::DatastoreInit { .. }
            | Error::DatastoreOpen { .. }
            | Error::DatastoreCreate { .. }
            | Error::DatastoreWrite { .. }
            | Error::DatastoreSerialize { .. }
            | Error::DatastorePersist { .. }
            | Error::DatastoreParse { .. } => ErrorKind::Storage,
        }
    }
}
