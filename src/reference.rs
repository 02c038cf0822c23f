//! Reply-linkage header parsing
//!
//! Extracts message identifiers from `In-Reply-To` and `References` header
//! values, plus the raw-header helpers the archiver needs to capture those
//! values from inbound bytes. Everything here is pure: no I/O, no side
//! effects, deterministic output for a given input.

use std::sync::OnceLock;

use regex::Regex;

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Angle-bracket token, non-greedy: <token>
    RE.get_or_init(|| Regex::new(r"<(.*?)>").expect("hardcoded regex"))
}

/// Extract message identifiers from an `In-Reply-To` header value.
///
/// Returns the angle-bracket-delimited tokens in the order they appear,
/// with no normalization beyond bracket stripping. Empty or malformed
/// input yields an empty vector, not an error.
#[must_use]
pub fn parse_message_ids(value: &str) -> Vec<String> {
    reference_re()
        .captures_iter(value)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Extract message identifiers from a `References` header value.
///
/// All whitespace is collapsed first so identifiers split across folded
/// lines are rejoined, then bracket tokens are extracted and de-duplicated
/// preserving first occurrence.
#[must_use]
pub fn parse_references(value: &str) -> Vec<String> {
    let collapsed: String = value.split_whitespace().collect();
    let mut results: Vec<String> = Vec::new();
    for cap in reference_re().captures_iter(&collapsed) {
        let id = cap[1].to_string();
        if !results.contains(&id) {
            results.push(id);
        }
    }
    results
}

/// Return the raw, unfolded value of the named header from a raw message.
///
/// Continuation lines are joined with a single space. The scan stops at the
/// blank line ending the header block. The first matching header wins.
#[must_use]
pub fn raw_header(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut value: Option<String> = None;
    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if let Some(v) = &mut value {
            // Continuation line (starts with whitespace) extends the match
            if line.starts_with(' ') || line.starts_with('\t') {
                v.push(' ');
                v.push_str(line.trim());
                continue;
            }
            break;
        }
        if let Some(colon) = line.find(':') {
            if line[..colon].eq_ignore_ascii_case(name) {
                value = Some(line[colon + 1..].trim().to_string());
            }
        }
    }
    value
}

/// Split a captured mbox envelope line off the front of a raw message.
///
/// When the message starts with `From ` the rest of that line is returned
/// (to be stored verbatim) together with the remaining bytes; otherwise the
/// input is returned unchanged.
#[must_use]
pub fn split_envelope(raw: &[u8]) -> (Option<String>, &[u8]) {
    if raw.starts_with(b"From ") {
        if let Some(pos) = raw.iter().position(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(&raw[5..pos]).trim_end().to_string();
            return (Some(line), &raw[pos + 1..]);
        }
    }
    (None, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_ids_in_order() {
        assert_eq!(
            parse_message_ids("<a@x> <b@y>"),
            vec!["a@x".to_string(), "b@y".to_string()]
        );
    }

    #[test]
    fn test_parse_message_ids_empty_input() {
        assert!(parse_message_ids("").is_empty());
        assert!(parse_message_ids("no brackets here").is_empty());
    }

    #[test]
    fn test_references_whitespace_idempotent() {
        let folded = parse_references("<a@x>\n <b@y>");
        let flat = parse_references("<a@x> <b@y>");
        assert_eq!(folded, flat);
        assert_eq!(folded, vec!["a@x".to_string(), "b@y".to_string()]);
    }

    #[test]
    fn test_references_rejoins_split_identifier() {
        // An identifier broken across a folded line is rejoined by the
        // whitespace collapse before bracket extraction
        assert_eq!(
            parse_references("<long-identifier\n @example.com>"),
            vec!["long-identifier@example.com".to_string()]
        );
    }

    #[test]
    fn test_references_dedupe_preserves_order() {
        assert_eq!(
            parse_references("<a@x> <a@x> <b@y>"),
            vec!["a@x".to_string(), "b@y".to_string()]
        );
    }

    #[test]
    fn test_raw_header_unfolds_continuations() {
        let raw = b"Subject: hello\nReferences: <a@x>\n <b@y>\nTo: z@w\n\nbody";
        assert_eq!(
            raw_header(raw, "references").as_deref(),
            Some("<a@x> <b@y>")
        );
        assert_eq!(raw_header(raw, "Subject").as_deref(), Some("hello"));
        assert_eq!(raw_header(raw, "missing"), None);
    }

    #[test]
    fn test_raw_header_ignores_body() {
        let raw = b"To: z@w\n\nSubject: not a header\n";
        assert_eq!(raw_header(raw, "subject"), None);
    }

    #[test]
    fn test_split_envelope() {
        let raw = b"From sender@example.com Thu Jan 01 00:00:00 2015\nTo: z@w\n\nbody";
        let (line, rest) = split_envelope(raw);
        assert_eq!(
            line.as_deref(),
            Some("sender@example.com Thu Jan 01 00:00:00 2015")
        );
        assert!(rest.starts_with(b"To: z@w"));

        let plain = b"To: z@w\n\nbody";
        let (line, rest) = split_envelope(plain);
        assert_eq!(line, None);
        assert_eq!(rest, plain);
    }
}
