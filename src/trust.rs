// SPDX-License-Identifier: MIT OR Apache-2.0

//! The set of keys and thresholds the verifier currently trusts.
//!
//! A [`TrustState`] is a value: it is built whole from a root document and
//! swapped into place only after every key and threshold has been
//! validated. Nothing ever mutates a live trust state, so a failed root
//! rotation cannot leave half-ingested keys behind.

use crate::error::{self, Result};
use crate::Limits;
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::PublicKey;
use crate::schema::Root;
use log::debug;
use snafu::{ensure, ResultExt};
use std::collections::HashMap;

/// The keys and per-role signature thresholds established by the most
/// recently validated root document.
#[derive(Debug, Clone, Default)]
pub(crate) struct TrustState {
    keys: HashMap<Decoded<Hex>, PublicKey>,
    thresholds: HashMap<String, u64>,
}

impl TrustState {
    /// A trust state that trusts nothing; every verification against it
    /// fails until a root has been ingested.
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Builds a trust state from a root document's key and role tables.
    ///
    /// Returns an error (leaving any live trust untouched) if a key type
    /// is unknown, a key value does not decode, a key id is duplicated, or
    /// any role's threshold falls outside the configured bounds.
    pub(crate) fn from_root(repo: &str, root: &Root, limits: &Limits) -> Result<Self> {
        let mut keys = HashMap::new();
        for (keyid, key) in &root.keys {
            let public_key = PublicKey::from_key(repo, keyid, key)?;
            let keyid_decoded = keyid
                .parse::<Decoded<Hex>>()
                .context(error::InvalidKeyIdSnafu { repo, keyid })?;
            ensure!(
                keys.insert(keyid_decoded, public_key).is_none(),
                error::DuplicateKeyIdSnafu { repo, keyid }
            );
        }

        let mut thresholds = HashMap::new();
        for (role, role_keys) in &root.roles {
            let role = role.to_lowercase();
            let threshold = role_keys.threshold;
            ensure!(
                threshold >= limits.min_signatures as i64
                    && threshold <= limits.max_signatures as i64,
                error::IllegalThresholdSnafu {
                    repo,
                    role,
                    threshold,
                }
            );
            debug!("{repo}: role '{role}' requires {threshold} signatures");
            thresholds.insert(role, threshold as u64);
        }

        Ok(Self { keys, thresholds })
    }

    /// The signature threshold for a role, if the current root declares one.
    pub(crate) fn threshold(&self, role: &str) -> Option<u64> {
        self.thresholds.get(role).copied()
    }

    /// Looks up a trusted key by id.
    pub(crate) fn key(&self, keyid: &Decoded<Hex>) -> Option<&PublicKey> {
        self.keys.get(keyid)
    }
}

#[cfg(test)]
mod tests {
    use super::TrustState;
    use crate::error::ErrorKind;
    use crate::Limits;
    use crate::schema::Root;
    use serde_json::json;

    fn root(value: serde_json::Value) -> Root {
        serde_json::from_value(value).unwrap()
    }

    fn ed_key(hex: &str) -> serde_json::Value {
        json!({"keytype": "ed25519", "keyval": {"public": hex}})
    }

    #[test]
    fn ingests_keys_and_thresholds() {
        let root = root(json!({
            "_type": "root",
            "version": 1,
            "expires": "2038-01-19T03:14:08Z",
            "keys": {
                "aa11": ed_key(&"ab".repeat(32)),
                "bb22": ed_key(&"cd".repeat(32)),
            },
            "roles": {
                "root": {"keyids": ["aa11"], "threshold": 1},
                "Timestamp": {"keyids": ["bb22"], "threshold": 2},
            },
        }));
        let trust = TrustState::from_root("director", &root, &Limits::default()).unwrap();
        assert_eq!(trust.threshold("root"), Some(1));
        assert_eq!(trust.threshold("timestamp"), Some(2));
        assert_eq!(trust.threshold("snapshot"), None);
        assert!(trust.key(&"aa11".parse().unwrap()).is_some());
        assert!(trust.key(&"dead".parse().unwrap()).is_none());
    }

    #[test]
    fn rejects_duplicate_key_ids_after_hex_normalization() {
        let root = root(json!({
            "_type": "root",
            "version": 1,
            "expires": "2038-01-19T03:14:08Z",
            "keys": {
                "aa11": ed_key(&"ab".repeat(32)),
                "AA11": ed_key(&"cd".repeat(32)),
            },
            "roles": {"root": {"keyids": ["aa11"], "threshold": 1}},
        }));
        let error = TrustState::from_root("director", &root, &Limits::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Security);
        assert!(error.to_string().contains("duplicate key id"));
    }

    #[test]
    fn rejects_unknown_key_types() {
        let root = root(json!({
            "_type": "root",
            "version": 1,
            "expires": "2038-01-19T03:14:08Z",
            "keys": {"aa11": {"keytype": "dsa", "keyval": {"public": "x"}}},
            "roles": {"root": {"keyids": ["aa11"], "threshold": 1}},
        }));
        let error = TrustState::from_root("director", &root, &Limits::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Security);
    }

    #[test]
    fn rejects_thresholds_outside_the_configured_bounds() {
        for threshold in [0, -1, 1001] {
            let root = root(json!({
                "_type": "root",
                "version": 1,
                "expires": "2038-01-19T03:14:08Z",
                "keys": {"aa11": ed_key(&"ab".repeat(32))},
                "roles": {"snapshot": {"keyids": ["aa11"], "threshold": threshold}},
            }));
            let error = TrustState::from_root("director", &root, &Limits::default()).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::IllegalThreshold);
        }
    }

    #[test]
    fn boundary_thresholds_are_accepted() {
        for threshold in [1, 1000] {
            let root = root(json!({
                "_type": "root",
                "version": 1,
                "expires": "2038-01-19T03:14:08Z",
                "keys": {"aa11": ed_key(&"ab".repeat(32))},
                "roles": {"targets": {"keyids": ["aa11"], "threshold": threshold}},
            }));
            let trust = TrustState::from_root("director", &root, &Limits::default()).unwrap();
            assert_eq!(trust.threshold("targets"), Some(threshold as u64));
        }
    }
}
