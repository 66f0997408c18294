//! Finding and replacing inline encrypted tags.

use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::{Result, SecretError};
use crate::keystore::{Keystore, NONCE_SIZE};

/// Opening of every inline tag.
pub const TAG_PREFIX: &[u8] = b"[gosecret|";

/// Number of fields in an encrypted tag, including the `gosecret` marker.
const ENCRYPTED_FIELDS: usize = 5;

/// Replace every encrypted tag in `content` with its plaintext.
///
/// Content without tags comes back unchanged. Tags that do not have exactly
/// five fields are copied through as-is. Any failure to decrypt a tag fails
/// the whole call.
pub fn decrypt_tags(content: &[u8], keystore: &Keystore) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(content.len());
    let mut rest = content;
    let mut replaced = 0usize;

    while let Some(start) = find(rest, TAG_PREFIX) {
        let Some(len) = rest[start..].iter().position(|b| *b == b']') else {
            break;
        };

        output.extend_from_slice(&rest[..start]);

        let tag = &rest[start..start + len + 1];
        let inner = &tag[1..tag.len() - 1];
        let fields: Vec<&[u8]> = inner.split(|b| *b == b'|').collect();

        if fields.len() == ENCRYPTED_FIELDS {
            output.extend(open_tag(&fields, keystore)?);
            replaced += 1;
        } else {
            output.extend_from_slice(tag);
        }

        rest = &rest[start + len + 1..];
    }

    output.extend_from_slice(rest);

    if replaced > 0 {
        debug!("Decrypted {replaced} inline tags");
    }

    Ok(output)
}

/// Encrypt `plaintext` into a tag that [`decrypt_tags`] can open.
pub fn seal(keystore: &Keystore, key_name: &str, auth_data: &str, plaintext: &[u8]) -> Result<String> {
    if auth_data.contains(['|', ']']) {
        return Err(SecretError::Encrypt(format!(
            "{key_name}: auth data may not contain '|' or ']'"
        )));
    }

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = keystore.seal(key_name, &nonce, plaintext, auth_data.as_bytes())?;

    Ok(format!(
        "[gosecret|{auth_data}|{}|{}|{key_name}]",
        STANDARD.encode(ciphertext),
        STANDARD.encode(nonce)
    ))
}

fn open_tag(fields: &[&[u8]], keystore: &Keystore) -> Result<Vec<u8>> {
    let auth_data = fields[1];
    let ciphertext = decode("ciphertext", fields[2])?;
    let nonce = decode("nonce", fields[3])?;
    let key_name = String::from_utf8_lossy(fields[4]);

    keystore.open(&key_name, &nonce, &ciphertext, auth_data)
}

fn decode(field: &'static str, value: &[u8]) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|source| SecretError::Base64 { field, source })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
