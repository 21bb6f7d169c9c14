//! `; name=value` parameter lists shared by Content-Type and
//! Content-Disposition (RFC 2045 §5.1, RFC 2231).

use std::collections::BTreeMap;

use crate::encoding::decode_rfc2231;

/// Splits a header value into its leading token and parameter list.
///
/// Parameter names are lowercased. RFC 2231 continuations (`name*0`,
/// `name*1`) are joined and extended values (`name*=utf-8''...`) decoded.
pub(crate) fn split_parameters(value: &str) -> (&str, Vec<(String, String)>) {
    let mut segments = split_unquoted(value, ';').into_iter();
    let head = segments.next().unwrap_or_default().trim();

    let mut plain: Vec<(String, String)> = Vec::new();
    let mut sections: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for segment in segments {
        let Some((raw_name, raw_value)) = segment.split_once('=') else {
            continue;
        };
        let name = raw_name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = unquote(raw_value.trim());

        let (base, extended) = match name.strip_suffix('*') {
            Some(base) => (base, true),
            None => (name.as_str(), false),
        };
        match base.rsplit_once('*') {
            Some((stem, index)) if !stem.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
                let index = index.parse().unwrap_or(0);
                sections
                    .entry(stem.to_string())
                    .or_default()
                    .push((index, extended, value));
            }
            _ if extended => sections
                .entry(base.to_string())
                .or_default()
                .push((0, true, value)),
            _ => plain.push((name.clone(), value)),
        }
    }

    for (name, mut parts) in sections {
        parts.sort_by_key(|(index, _, _)| *index);
        let extended = parts.iter().any(|(_, ext, _)| *ext);
        let joined: String = parts.into_iter().map(|(_, _, v)| v).collect();
        let value = if extended {
            decode_rfc2231(&joined)
        } else {
            joined
        };
        // an extended value supersedes the plain fallback of the same name
        plain.retain(|(n, _)| *n != name);
        plain.push((name, value));
    }

    (head, plain)
}

/// Case-insensitive parameter lookup.
pub(crate) fn lookup<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Splits on `sep` outside double-quoted strings.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                out.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&value[start..]);
    out
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_separator_is_not_split() {
        let (head, params) = split_parameters(r#"attachment; filename="a;b \"c\".pdf"; size=10"#);
        assert_eq!(head, "attachment");
        assert_eq!(lookup(&params, "filename"), Some(r#"a;b "c".pdf"#));
        assert_eq!(lookup(&params, "SIZE"), Some("10"));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let (_, params) = split_parameters(
            "attachment; filename*0*=utf-8''r%C3%A9; filename*1*=sum%C3%A9.pdf; filename=resume.pdf",
        );
        assert_eq!(lookup(&params, "filename"), Some("résumé.pdf"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_extended_single_value() {
        let (_, params) = split_parameters("inline; filename*=iso-8859-1'en'caf%E9.png");
        assert_eq!(lookup(&params, "filename"), Some("café.png"));
    }

    #[test]
    fn test_junk_segments_are_ignored() {
        let (head, params) = split_parameters("text/plain; ; charset=us-ascii; flowed");
        assert_eq!(head, "text/plain");
        assert_eq!(params, vec![("charset".to_string(), "us-ascii".to_string())]);
    }
}
