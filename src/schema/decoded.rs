// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text fields that are really byte strings. [`Decoded`] keeps both the
//! bytes and the original text, compares and hashes by bytes (so two hex
//! spellings of the same key id are the same key id), and serializes back
//! to the text it was parsed from.

use crate::error::{self, Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::ResultExt;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::str::FromStr;

/// A textual encoding of bytes.
pub trait Encode {
    /// Encodes bytes as text.
    fn encode(bytes: &[u8]) -> String;
}

/// A textual decoding of bytes.
pub trait Decode {
    /// Decodes text into bytes.
    fn decode(text: &str) -> Result<Vec<u8>>;
}

/// Lowercase hexadecimal, the encoding used for key ids, signatures, and
/// digests in role metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex;

impl Encode for Hex {
    fn encode(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }
}

impl Decode for Hex {
    fn decode(text: &str) -> Result<Vec<u8>> {
        hex::decode(text).context(error::HexDecodeSnafu)
    }
}

/// A byte string that arrived as text in encoding `T`.
#[derive(Clone)]
pub struct Decoded<T> {
    bytes: Vec<u8>,
    original: String,
    spooky: PhantomData<T>,
}

impl<T> Decoded<T> {
    /// The text this value was parsed from (or encoded to).
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl<T: Encode> From<Vec<u8>> for Decoded<T> {
    fn from(bytes: Vec<u8>) -> Self {
        let original = T::encode(&bytes);
        Self {
            bytes,
            original,
            spooky: PhantomData,
        }
    }
}

impl<T: Decode> FromStr for Decoded<T> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self {
            bytes: T::decode(s)?,
            original: s.to_owned(),
            spooky: PhantomData,
        })
    }
}

impl<T> Deref for Decoded<T> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T> AsRef<[u8]> for Decoded<T> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T> fmt::Debug for Decoded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.original, f)
    }
}

impl<T> fmt::Display for Decoded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.original, f)
    }
}

impl<T> PartialEq for Decoded<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<T> Eq for Decoded<T> {}

impl<T> Hash for Decoded<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl<'de, T: Decode> Deserialize<'de> for Decoded<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let original = String::deserialize(deserializer)?;
        Ok(Self {
            bytes: T::decode(&original).map_err(serde::de::Error::custom)?,
            original,
            spooky: PhantomData,
        })
    }
}

impl<T> Serialize for Decoded<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoded, Hex};
    use std::collections::HashSet;

    #[test]
    fn hex_round_trip() {
        let decoded: Decoded<Hex> = "cafef00d".parse().unwrap();
        assert_eq!(&*decoded, &[0xca, 0xfe, 0xf0, 0x0d]);
        assert_eq!(decoded.original(), "cafef00d");
    }

    #[test]
    fn hex_rejects_bad_input() {
        assert!("not hex".parse::<Decoded<Hex>>().is_err());
        assert!("abc".parse::<Decoded<Hex>>().is_err());
    }

    #[test]
    fn equality_ignores_hex_case() {
        let lower: Decoded<Hex> = "cafef00d".parse().unwrap();
        let upper: Decoded<Hex> = "CAFEF00D".parse().unwrap();
        assert_eq!(lower, upper);

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(!set.insert(upper));
    }

    #[test]
    fn serde_round_trip_preserves_original_text() {
        let decoded: Decoded<Hex> = serde_json::from_str("\"CAFEF00D\"").unwrap();
        assert_eq!(serde_json::to_string(&decoded).unwrap(), "\"CAFEF00D\"");
    }
}
