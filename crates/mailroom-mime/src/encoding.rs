//! Transfer and header decoding.
//!
//! Base64, Quoted-Printable, RFC 2047 encoded words and charset conversion
//! through `encoding_rs`. Decoding is lenient: real mail contains
//! unpadded Base64, stray `=` signs and mislabelled charsets, and a reader
//! that rejects them shows the user nothing.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{Error, Result};

/// Accepts input with or without padding and with non-zero trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes a Base64 body, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input contains bytes outside the alphabet.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045 §6.7).
///
/// Soft line breaks are removed; an `=` that does not start a valid escape is
/// kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    decode_qp(data, false)
}

fn decode_qp(data: &[u8], underscore_is_space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'=' => match (data.get(i + 1), data.get(i + 2)) {
                (Some(b'\r'), Some(b'\n')) => i += 3,
                (Some(b'\n'), _) => i += 2,
                (Some(&hi), Some(&lo)) => {
                    if let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo)) {
                        out.push((hi << 4) | lo);
                        i += 3;
                    } else {
                        out.push(b'=');
                        i += 1;
                    }
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            b'_' if underscore_is_space => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Converts bytes in `charset` to a string.
///
/// Labels resolve through the WHATWG encoding registry, so aliases such as
/// `latin1`, `cp1252` or `sjis` are recognised. Missing and unknown
/// charsets decode as UTF-8. Malformed sequences become U+FFFD.
#[must_use]
pub fn decode_charset(data: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .map(|label| label.trim().trim_matches('"'))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _had_errors) = encoding.decode_without_bom_handling(data);
    text.into_owned()
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped, as the RFC
/// requires. Words that fail to decode are left as they are.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = "";
    let mut previous_was_word = false;

    while !rest.is_empty() {
        let Some(start) = rest.find("=?") else {
            out.push_str(pending_space);
            out.push_str(rest);
            return out;
        };

        let (before, candidate) = rest.split_at(start);
        let between_words = previous_was_word && before.trim().is_empty();

        match split_encoded_word(candidate).and_then(|(word, tail)| {
            decode_encoded_word(word).ok().map(|decoded| (decoded, tail))
        }) {
            Some((decoded, tail)) => {
                if !between_words {
                    out.push_str(pending_space);
                    out.push_str(before);
                }
                out.push_str(&decoded);
                previous_was_word = true;

                let trimmed = tail.trim_start();
                pending_space = &tail[..tail.len() - trimmed.len()];
                rest = trimmed;
            }
            None => {
                out.push_str(pending_space);
                out.push_str(before);
                out.push_str("=?");
                pending_space = "";
                previous_was_word = false;
                rest = &candidate[2..];
            }
        }
    }

    out.push_str(pending_space);
    out
}

/// Splits `=?charset?enc?text?=rest` into the word and the remainder.
fn split_encoded_word(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix("=?")?;
    let charset_end = inner.find('?')?;
    let after_charset = &inner[charset_end + 1..];
    let encoding_end = after_charset.find('?')?;
    let payload = &after_charset[encoding_end + 1..];
    let payload_end = payload.find("?=")?;

    let word_len = 2 + charset_end + 1 + encoding_end + 1 + payload_end + 2;
    Some(text.split_at(word_len))
}

fn decode_encoded_word(word: &str) -> Result<String> {
    let inner = &word[2..word.len() - 2];
    let mut fields = inner.splitn(3, '?');
    let (Some(charset), Some(encoding), Some(payload)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::InvalidEncoding(format!("malformed encoded word {word:?}")));
    };
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes())?,
        "Q" | "q" => decode_qp(payload.as_bytes(), true),
        other => {
            return Err(Error::InvalidEncoding(format!("unknown encoded-word encoding {other:?}")));
        }
    };
    Ok(decode_charset(&bytes, Some(charset)))
}

/// Decodes an RFC 2231 extended parameter value (`charset'lang'%XX...`).
#[must_use]
pub fn decode_rfc2231(value: &str) -> String {
    let mut parts = value.splitn(3, '\'');
    let (charset, encoded) = match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_lang), Some(encoded)) => (Some(charset), encoded),
        _ => (None, value),
    };

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).copied().and_then(hex_value),
                bytes.get(i + 2).copied().and_then(hex_value),
            )
        {
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    decode_charset(&out, charset.filter(|c| !c.is_empty()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_base64_wrapped_and_unpadded() {
        assert_eq!(decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64(b"SGk").unwrap(), b"Hi");
        assert!(decode_base64(b"not*base64").is_err());
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_quoted_printable() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"soft=\nbreak"), b"softbreak");
        assert_eq!(decode_quoted_printable(b"a = b =ZZ"), b"a = b =ZZ");
        assert_eq!(decode_quoted_printable(b"trailing="), b"trailing=");
    }

    #[test]
    fn test_charsets() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("utf-8")), "café");
        assert_eq!(decode_charset(b"plain", None), "plain");
        assert_eq!(decode_charset(&[0xFF], Some("x-unknown")), "\u{FFFD}");
    }

    #[test]
    fn test_windows_1252_punctuation() {
        assert_eq!(decode_charset(b"\x93hi\x94 \x80", Some("windows-1252")), "\u{201C}hi\u{201D} \u{20AC}");
        assert_eq!(decode_charset(b"\x93hi\x94", Some("\"cp1252\"")), "\u{201C}hi\u{201D}");
    }

    #[test]
    fn test_multibyte_charsets() {
        assert_eq!(decode_charset(&[0x93, 0xFA, 0x96, 0x7B], Some("Shift_JIS")), "日本");
        assert_eq!(decode_charset(&[0xD0, 0xD2, 0xC9, 0xD7, 0xC5, 0xD4], Some("koi8-r")), "привет");
    }

    #[test]
    fn test_rfc2047_words() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_rfc2047("=?UTF-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_rfc2047("=?iso-8859-1?q?caf=E9?= au lait"), "café au lait");
        assert_eq!(decode_rfc2047("=?windows-1252?Q?=93hi=94?="), "\u{201C}hi\u{201D}");
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?Quarterly_?= \r\n =?utf-8?Q?report?="),
            "Quarterly report"
        );
        assert_eq!(decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= again"), "Re: Héllo again");
    }

    #[test]
    fn test_rfc2047_invalid_word_kept() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?= tail"), "=?utf-8?X?abc?= tail");
        assert_eq!(decode_rfc2047("a =? b"), "a =? b");
    }

    #[test]
    fn test_rfc2231_value() {
        assert_eq!(decode_rfc2231("utf-8''r%C3%A9sum%C3%A9.pdf"), "résumé.pdf");
        assert_eq!(decode_rfc2231("plain%20name"), "plain name");
    }

    proptest! {
        #[test]
        fn decoders_never_panic(input in proptest::collection::vec(any::<u8>(), 0..200)) {
            let _ = decode_base64(&input);
            let _ = decode_quoted_printable(&input);
            let text = String::from_utf8_lossy(&input);
            let _ = decode_rfc2047(&text);
            let _ = decode_rfc2231(&text);
        }
    }
}
