//! Wire encoding for command arguments.

use super::types::{FetchAttribute, FetchItems, SearchCriteria};
use crate::{Error, Result};

/// Appends an astring: a bare atom when possible, a quoted string otherwise.
///
/// Quoted strings cannot carry CR, LF, NUL or 8-bit bytes, and literals are
/// not sent, so such values are refused. `what` names the argument in the
/// error; the value itself is never echoed.
pub fn write_astring(buf: &mut Vec<u8>, what: &'static str, value: &str) -> Result<()> {
    if value.bytes().any(|b| !is_quotable(b)) {
        return Err(Error::InvalidArgument(what));
    }
    if !value.is_empty() && !value.bytes().any(needs_quoting) {
        buf.extend_from_slice(value.as_bytes());
        return Ok(());
    }
    buf.push(b'"');
    for byte in value.bytes() {
        if matches!(byte, b'"' | b'\\') {
            buf.push(b'\\');
        }
        buf.push(byte);
    }
    buf.push(b'"');
    Ok(())
}

/// Bytes a quoted string may carry, escaped or not.
const fn is_quotable(byte: u8) -> bool {
    byte.is_ascii() && !matches!(byte, b'\0' | b'\r' | b'\n')
}

const fn needs_quoting(byte: u8) -> bool {
    matches!(
        byte,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || byte < 0x20
        || byte == 0x7F
}

pub fn write_fetch_items(buf: &mut Vec<u8>, items: &FetchItems) {
    buf.push(b'(');
    for (i, attr) in items.0.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_fetch_attribute(buf, attr);
    }
    buf.push(b')');
}

fn write_fetch_attribute(buf: &mut Vec<u8>, attr: &FetchAttribute) {
    let keyword: &[u8] = match attr {
        FetchAttribute::Uid => b"UID",
        FetchAttribute::Flags => b"FLAGS",
        FetchAttribute::InternalDate => b"INTERNALDATE",
        FetchAttribute::Rfc822Size => b"RFC822.SIZE",
        FetchAttribute::Envelope => b"ENVELOPE",
        FetchAttribute::BodyStructure => b"BODYSTRUCTURE",
        FetchAttribute::Body { section, peek } => {
            let open: &[u8] = if *peek { b"BODY.PEEK[" } else { b"BODY[" };
            buf.extend_from_slice(open);
            if let Some(section) = section {
                buf.extend_from_slice(section.as_bytes());
            }
            buf.push(b']');
            return;
        }
    };
    buf.extend_from_slice(keyword);
}

pub fn write_search_criteria(buf: &mut Vec<u8>, criteria: &SearchCriteria) -> Result<()> {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Sequence(set) => buf.extend_from_slice(set.to_string().as_bytes()),
        SearchCriteria::Uid(set) => {
            buf.extend_from_slice(b"UID ");
            buf.extend_from_slice(set.to_string().as_bytes());
        }
        SearchCriteria::From(value) => {
            buf.extend_from_slice(b"FROM ");
            write_astring(buf, "FROM value", value)?;
        }
        SearchCriteria::To(value) => {
            buf.extend_from_slice(b"TO ");
            write_astring(buf, "TO value", value)?;
        }
        SearchCriteria::Header(field, value) => {
            buf.extend_from_slice(b"HEADER ");
            write_astring(buf, "HEADER field", field)?;
            buf.push(b' ');
            write_astring(buf, "HEADER value", value)?;
        }
        SearchCriteria::And(keys) => {
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_search_criteria(buf, key)?;
            }
        }
        SearchCriteria::Or(a, b) => {
            buf.extend_from_slice(b"OR ");
            write_grouped(buf, a)?;
            buf.push(b' ');
            write_grouped(buf, b)?;
        }
        SearchCriteria::Not(key) => {
            buf.extend_from_slice(b"NOT ");
            write_grouped(buf, key)?;
        }
    }
    Ok(())
}

/// Operands of OR/NOT are single keys; a conjunction must be parenthesized.
fn write_grouped(buf: &mut Vec<u8>, criteria: &SearchCriteria) -> Result<()> {
    if let SearchCriteria::And(keys) = criteria
        && keys.len() > 1
    {
        buf.push(b'(');
        write_search_criteria(buf, criteria)?;
        buf.push(b')');
        Ok(())
    } else {
        write_search_criteria(buf, criteria)
    }
}
