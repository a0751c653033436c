// SPDX-License-Identifier: MIT OR Apache-2.0

//! The wire model for signed role metadata.
//!
//! A fetched document is kept in two forms. The raw `signed` subtree stays
//! a [`serde_json::Value`] exactly as parsed, because signatures cover the
//! canonical serialization of those bytes and unknown fields (including
//! `expires`) must survive verbatim. Typed views ([`Root`], [`Timestamp`],
//! [`Snapshot`], [`Targets`]) are projected out of the raw value on demand,
//! dispatched on the case-normalized `_type` field.

pub mod decoded;
pub mod key;
mod spki;

use crate::error::{self, Result};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use olpc_cjson::CanonicalFormatter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_plain::{forward_display_to_serde, forward_from_str_to_serde};
use snafu::{OptionExt, ResultExt};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;

/// The type of a metadata role.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// `root` delegates trust: it lists the public keys and per-role
    /// signature thresholds every other document is verified against.
    Root,
    /// `timestamp` is the freshness beacon; a bumped version announces
    /// that a new snapshot exists.
    Timestamp,
    /// `snapshot` enumerates the role documents that together form one
    /// consistent view of the repository.
    Snapshot,
    /// `targets` describes the artifacts a client may install.
    Targets,
}

forward_display_to_serde!(RoleType);
forward_from_str_to_serde!(RoleType);

impl RoleType {
    /// The role's lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            RoleType::Root => "root",
            RoleType::Timestamp => "timestamp",
            RoleType::Snapshot => "snapshot",
            RoleType::Targets => "targets",
        }
    }

    /// The file this role is stored under, e.g. `root.json`.
    pub fn filename(self) -> &'static str {
        match self {
            RoleType::Root => "root.json",
            RoleType::Timestamp => "timestamp.json",
            RoleType::Snapshot => "snapshot.json",
            RoleType::Targets => "targets.json",
        }
    }
}

/// A signature over the canonical form of a document's `signed` subtree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Signature {
    /// The id of the key (from root's key table) that made this signature.
    pub keyid: Decoded<Hex>,
    /// The signature method, e.g. `rsassa-pss` or `ed25519`
    /// (case-insensitive; unknown methods fail verification).
    pub method: String,
    /// The hex-encoded signature.
    pub sig: Decoded<Hex>,
    /// Extra fields found during deserialization, preserved so a stored
    /// document round-trips.
    #[serde(flatten)]
    pub _extra: BTreeMap<String, Value>,
}

/// A signed metadata document as it appears on the wire: the raw signed
/// subtree plus the signatures over its canonical form.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Document {
    /// The role's payload, verbatim as parsed.
    pub signed: Value,
    /// The signatures over the canonical form of `signed`.
    pub signatures: Vec<Signature>,
    /// Extra fields found during deserialization, preserved so a stored
    /// document round-trips.
    #[serde(flatten)]
    pub _extra: BTreeMap<String, Value>,
}

impl Document {
    /// The document's role, read case-insensitively from `_type`.
    pub fn role_type(&self) -> Result<RoleType> {
        let name = self
            .signed
            .get("_type")
            .and_then(Value::as_str)
            .context(error::MissingFieldSnafu { field: "_type" })?
            .to_lowercase();
        name.parse()
            .ok()
            .context(error::UnknownRoleSnafu { name })
    }

    /// The document's version counter.
    pub fn version(&self) -> Result<NonZeroU64> {
        self.signed
            .get("version")
            .and_then(Value::as_u64)
            .and_then(NonZeroU64::new)
            .context(error::MissingFieldSnafu { field: "version" })
    }

    /// The canonical serialization of the `signed` subtree: the byte
    /// string signatures are verified against.
    ///
    /// This is Canonical JSON as produced by `olpc-cjson`: object keys
    /// sorted lexicographically, no insignificant whitespace, and only
    /// `"` and `\` escaped in strings (control bytes pass through raw).
    /// The result is the same for a given JSON value no matter what order
    /// the network parser saw its fields in.
    pub fn canonical_signed(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut data, CanonicalFormatter::new());
        self.signed
            .serialize(&mut ser)
            .context(error::JsonSerializationSnafu {
                what: "signed metadata",
            })?;
        Ok(data)
    }

    /// Projects the typed view of this document's role out of the raw
    /// `signed` value.
    pub fn body(&self) -> Result<RoleBody> {
        let role = self.role_type()?;
        Ok(match role {
            RoleType::Root => RoleBody::Root(self.parse_body(role)?),
            RoleType::Timestamp => RoleBody::Timestamp(self.parse_body(role)?),
            RoleType::Snapshot => RoleBody::Snapshot(self.parse_body(role)?),
            RoleType::Targets => RoleBody::Targets(self.parse_body(role)?),
        })
    }

    fn parse_body<T: serde::de::DeserializeOwned>(&self, role: RoleType) -> Result<T> {
        serde_json::from_value(self.signed.clone()).context(error::RoleParseSnafu { role })
    }
}

/// The typed view of a document, one variant per role.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleBody {
    /// A `root` document.
    Root(Root),
    /// A `timestamp` document.
    Timestamp(Timestamp),
    /// A `snapshot` document.
    Snapshot(Snapshot),
    /// A `targets` document.
    Targets(Targets),
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The payload of a `root` document: the key table and per-role signature
/// thresholds that define the repository's trust.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Root {
    /// The root document's own version.
    pub version: NonZeroU64,
    /// Expiration timestamp, kept opaque; expiry enforcement is not this
    /// crate's concern.
    pub expires: String,
    /// The public keys trusted for this repository, by key id.
    pub keys: HashMap<String, Key>,
    /// Signature requirements per role name.
    pub roles: HashMap<String, RoleKeys>,
}

/// The signature requirements for one role.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RoleKeys {
    /// The key ids the repository intends this role to be signed with.
    #[serde(default)]
    pub keyids: Vec<String>,
    /// How many distinct-key signatures the role needs. Parsed as a raw
    /// integer so that zero or negative values can be rejected as illegal
    /// thresholds rather than parse failures.
    pub threshold: i64,
}

/// The payload of a `timestamp` document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Timestamp {
    /// The freshness counter compared against the last seen version.
    pub version: NonZeroU64,
    /// Expiration timestamp, kept opaque.
    pub expires: String,
}

/// The payload of a `snapshot` document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Snapshot {
    /// The snapshot's version.
    pub version: NonZeroU64,
    /// Expiration timestamp, kept opaque.
    pub expires: String,
    /// The role documents this snapshot attests to, keyed by filename
    /// (e.g. `targets.json`). Ordered so processing is deterministic.
    pub meta: BTreeMap<String, SnapshotMeta>,
}

/// A role document entry in `snapshot.meta`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SnapshotMeta {
    /// The version of the referenced document.
    pub version: NonZeroU64,
}

/// The payload of a `targets` document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Targets {
    /// The targets document's version.
    pub version: NonZeroU64,
    /// Expiration timestamp, kept opaque.
    pub expires: String,
    /// The artifacts this repository offers, keyed by target name.
    /// Ordered so downloads happen in a deterministic order.
    pub targets: BTreeMap<String, Target>,
}

/// One entry of a targets document's `targets` map.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Target {
    /// The exact byte length of the target file.
    pub length: u64,
    /// The target's content hashes.
    pub hashes: Hashes,
    /// Opaque application data, passed through to consumers untouched.
    #[serde(default)]
    pub custom: Value,
}

/// The hash dictionary of a target entry. Either digest may be absent;
/// SHA-512 is preferred when both are present.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Hashes {
    /// The SHA-512 digest of the target file.
    #[serde(default)]
    pub sha512: Option<Decoded<Hex>>,
    /// The SHA-256 digest of the target file.
    #[serde(default)]
    pub sha256: Option<Decoded<Hex>>,
}

impl Hashes {
    /// Picks the strongest available digest, or `None` if the entry lists
    /// no supported hash at all.
    pub fn preferred(&self) -> Option<TargetHash> {
        self.sha512
            .clone()
            .map(TargetHash::Sha512)
            .or_else(|| self.sha256.clone().map(TargetHash::Sha256))
    }
}

/// A single expected digest for a target file.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetHash {
    /// A SHA-512 digest.
    Sha512(Decoded<Hex>),
    /// A SHA-256 digest.
    Sha256(Decoded<Hex>),
}

impl TargetHash {
    /// Whether `data` hashes to the expected digest. The comparison is
    /// constant-time.
    pub fn matches(&self, data: &[u8]) -> bool {
        let (algorithm, expected) = self.parts();
        let calculated = ring::digest::digest(algorithm, data);
        ring::constant_time::verify_slices_are_equal(calculated.as_ref(), expected.as_ref())
            .is_ok()
    }

    /// The name of this digest's algorithm.
    pub fn algorithm(&self) -> &'static str {
        match self {
            TargetHash::Sha512(_) => "sha512",
            TargetHash::Sha256(_) => "sha256",
        }
    }

    /// The expected digest as lowercase hex.
    pub fn expected_hex(&self) -> String {
        hex::encode(self.parts().1.as_ref())
    }

    /// The digest of `data` under this hash's algorithm, as lowercase hex.
    pub(crate) fn calculate_hex(&self, data: &[u8]) -> String {
        hex::encode(ring::digest::digest(self.parts().0, data).as_ref())
    }

    fn parts(&self) -> (&'static ring::digest::Algorithm, &Decoded<Hex>) {
        match self {
            TargetHash::Sha512(digest) => (&ring::digest::SHA512, digest),
            TargetHash::Sha256(digest) => (&ring::digest::SHA256, digest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, RoleBody, RoleType, TargetHash};
    use serde_json::json;

    fn document(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn canonical_form_is_sorted_and_compact() {
        let doc = document(json!({
            "signed": {"version": 3, "_type": "timestamp", "expires": "2038-01-19T03:14:08Z"},
            "signatures": []
        }));
        assert_eq!(
            doc.canonical_signed().unwrap(),
            br#"{"_type":"timestamp","expires":"2038-01-19T03:14:08Z","version":3}"#
        );
    }

    #[test]
    fn canonical_form_escapes_only_quote_and_backslash() {
        let doc = document(json!({
            "signed": {"pem": "a\"b\\c\nd"},
            "signatures": []
        }));
        assert_eq!(
            doc.canonical_signed().unwrap(),
            b"{\"pem\":\"a\\\"b\\\\c\nd\"}"
        );
    }

    #[test]
    fn role_type_is_case_insensitive() {
        let doc = document(json!({
            "signed": {"_type": "TimeStamp", "version": 1, "expires": "2038-01-19T03:14:08Z"},
            "signatures": []
        }));
        assert_eq!(doc.role_type().unwrap(), RoleType::Timestamp);
        assert!(matches!(doc.body().unwrap(), RoleBody::Timestamp(_)));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let doc = document(json!({
            "signed": {"_type": "mirrors"},
            "signatures": []
        }));
        assert!(doc.role_type().is_err());
    }

    #[test]
    fn version_must_be_a_positive_integer() {
        let doc = document(json!({
            "signed": {"_type": "timestamp", "version": 0},
            "signatures": []
        }));
        assert!(doc.version().is_err());
    }

    #[test]
    fn sha512_is_preferred_over_sha256() {
        let hashes: super::Hashes = serde_json::from_value(json!({
            "sha256": "aa".repeat(32),
            "sha512": "bb".repeat(64),
        }))
        .unwrap();
        assert!(matches!(
            hashes.preferred().unwrap(),
            TargetHash::Sha512(_)
        ));

        let sha256_only: super::Hashes =
            serde_json::from_value(json!({"sha256": "aa".repeat(32)})).unwrap();
        assert!(matches!(
            sha256_only.preferred().unwrap(),
            TargetHash::Sha256(_)
        ));
    }

    #[test]
    fn target_hash_matching() {
        let hash = TargetHash::Sha256(
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
                .parse()
                .unwrap(),
        );
        assert!(hash.matches(b"hello"));
        assert!(!hash.matches(b"hello!"));
    }

    #[test]
    fn documents_round_trip_through_serde() {
        let original = json!({
            "signed": {"_type": "snapshot", "version": 1, "expires": "e", "meta": {}},
            "signatures": [{"keyid": "ab", "method": "ed25519", "sig": "cd", "note": "extra"}],
            "trailer": true
        });
        let doc = document(original.clone());
        assert_eq!(serde_json::to_value(&doc).unwrap(), original);
    }
}
