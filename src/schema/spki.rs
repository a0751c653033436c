// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unwraps PEM-encoded RSA public keys into the PKCS#1 DER that ring's
//! RSA-PSS verifier expects. Metadata carries RSA keys as standard
//! `PUBLIC KEY` blocks (SubjectPublicKeyInfo); ring wants only the
//! `RSAPublicKey` structure inside the SPKI bit string.

use crate::error::{self, Result};
use snafu::{ensure, OptionExt, ResultExt};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_BIT_STRING: u8 = 0x03;

/// Decodes a PEM public key into PKCS#1 `RSAPublicKey` DER bytes.
///
/// Accepts either a `PUBLIC KEY` block (SubjectPublicKeyInfo, the form
/// produced by `openssl pkey -pubout`) or a bare `RSA PUBLIC KEY` block
/// that already is PKCS#1.
pub(crate) fn rsa_public_der(pem_text: &str) -> Result<Vec<u8>> {
    let block = pem::parse(pem_text).context(error::PemDecodeSnafu)?;
    match block.tag() {
        "RSA PUBLIC KEY" => Ok(block.into_contents()),
        "PUBLIC KEY" => unwrap_spki(&block.into_contents()),
        _ => error::SpkiFormatSnafu {
            reason: "unexpected PEM tag",
        }
        .fail(),
    }
}

/// Extracts the subjectPublicKey bit string from a DER
/// SubjectPublicKeyInfo: `SEQUENCE { AlgorithmIdentifier, BIT STRING }`.
fn unwrap_spki(der: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;

    let outer_len = read_tlv(der, &mut pos, TAG_SEQUENCE)?;
    ensure!(
        pos + outer_len == der.len(),
        error::SpkiFormatSnafu {
            reason: "trailing bytes after SubjectPublicKeyInfo",
        }
    );

    // AlgorithmIdentifier; its contents are not interesting here.
    let algorithm_len = read_tlv(der, &mut pos, TAG_SEQUENCE)?;
    pos += algorithm_len;

    let key_len = read_tlv(der, &mut pos, TAG_BIT_STRING)?;
    let key = der
        .get(pos..pos + key_len)
        .context(error::SpkiFormatSnafu {
            reason: "truncated bit string",
        })?;

    // The first bit string byte counts unused trailing bits; key material
    // is always byte-aligned.
    match key.split_first() {
        Some((0, contents)) => Ok(contents.to_vec()),
        _ => error::SpkiFormatSnafu {
            reason: "bit string with unused bits",
        }
        .fail(),
    }
}

/// Reads a tag-length header at `*pos`, checks the tag, advances past the
/// header, and returns the content length.
fn read_tlv(der: &[u8], pos: &mut usize, expected_tag: u8) -> Result<usize> {
    let tag = *der.get(*pos).context(error::SpkiFormatSnafu {
        reason: "truncated DER",
    })?;
    ensure!(
        tag == expected_tag,
        error::SpkiFormatSnafu {
            reason: "unexpected DER tag",
        }
    );
    *pos += 1;

    let first = *der.get(*pos).context(error::SpkiFormatSnafu {
        reason: "truncated DER length",
    })?;
    *pos += 1;
    let length = match first {
        short @ 0x00..=0x7f => usize::from(short),
        0x81 => {
            let b = *der.get(*pos).context(error::SpkiFormatSnafu {
                reason: "truncated DER length",
            })?;
            *pos += 1;
            usize::from(b)
        }
        0x82 => {
            let bytes = der.get(*pos..*pos + 2).context(error::SpkiFormatSnafu {
                reason: "truncated DER length",
            })?;
            *pos += 2;
            usize::from(bytes[0]) << 8 | usize::from(bytes[1])
        }
        _ => {
            return error::SpkiFormatSnafu {
                reason: "unsupported DER length form",
            }
            .fail()
        }
    };

    ensure!(
        *pos + length <= der.len(),
        error::SpkiFormatSnafu {
            reason: "DER length exceeds input",
        }
    );
    Ok(length)
}
