//! Identifier decoding and 8.3 name translation.
//!
//! ISO 9660 identifiers are upper-case 8.3 names with a `;1` version suffix. This module
//! translates them into the form users expect, decodes the UCS-2 identifiers of Joliet
//! volumes, and decodes the padded character fields of volume descriptors.

use widestring::U16Str;

/// Decode a padded a-character or d-character field to an owned string.
///
/// Bytes map one to one; trailing interpretation is left to the caller since descriptor
/// fields are space-padded by definition.
pub(crate) fn decode_strd(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode a UCS-2 big-endian identifier, dropping trailing NUL padding.
pub(crate) fn decode_ucs2be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    let end = units
        .iter()
        .rposition(|&u| u != 0)
        .map_or(0, |pos| pos + 1);

    U16Str::from_slice(&units[..end]).to_string_lossy()
}

/// Translate a raw directory identifier into the conventional user-facing form.
///
/// Drops the `;1` version suffix (and a then-trailing dot), maps any remaining `;` to
/// `.`, and lowercases the result unless the identifier came from a Joliet hierarchy.
/// The translation is idempotent.
///
/// # Arguments
/// * `identifier` - The raw identifier bytes from the directory record
/// * `joliet` - `true` to preserve case for Joliet names
#[must_use]
pub fn translate(identifier: &[u8], joliet: bool) -> String {
    let mut bytes: Vec<u8> = identifier.to_vec();

    if let Some(pos) = bytes.iter().rposition(|&b| b == b';') {
        if bytes[pos + 1..].iter().all(|b| b.is_ascii_digit()) && pos + 1 < bytes.len() {
            bytes.truncate(pos);
            if bytes.last() == Some(&b'.') {
                bytes.pop();
            }
        }
    }

    bytes
        .into_iter()
        .map(|b| {
            let c = if b == b';' { b'.' } else { b };
            if joliet {
                char::from(c)
            } else {
                char::from(c.to_ascii_lowercase())
            }
        })
        .collect()
}
