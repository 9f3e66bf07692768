//! Line framing and parsing
//!
//! Turns one raw, delimiter-terminated byte line into a typed [`Event`].
//! Pure functions of their input; no port required.

use crate::event::{Event, EventKind};

/// Printable ASCII range accepted in line bodies
const PRINTABLE_MIN: u8 = 0x20;
const PRINTABLE_MAX: u8 = 0x7E;

/// Render bytes as a `-`-separated lowercase hex dump
pub(crate) fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join("-")
}

fn invalid(raw: &[u8], reason: &str) -> Event {
    Event::now(EventKind::InvalidLine {
        raw: hex_dump(raw),
        reason: reason.to_string(),
    })
}

fn empty_line() -> Event {
    Event::now(EventKind::EmptyLine {
        reason: "Empty line".to_string(),
    })
}

/// Strip at most one trailing delimiter run: a LF, then a CR, then one more
/// CR (covers LF, CRLF, CR and CRCR endings). If stripping would empty the
/// line, the error event names the delimiter that caused it.
fn strip_line_end(mut line: &[u8]) -> Result<&[u8], Event> {
    if line.last() == Some(&0x0a) {
        if line.len() == 1 {
            return Err(invalid(line, "Msg only 0x0a"));
        }
        line = &line[..line.len() - 1];
    }
    if line.last() == Some(&0x0d) {
        if line.len() == 1 {
            return Err(invalid(line, "Msg only 0x0d"));
        }
        line = &line[..line.len() - 1];
        if line.last() == Some(&0x0d) {
            if line.len() == 1 {
                return Err(invalid(line, "Msg only 0x0d"));
            }
            line = &line[..line.len() - 1];
        }
    }
    Ok(line)
}

/// Parse one raw line into an event.
///
/// `None` and zero-length input are empty lines. Delimiters are stripped per
/// [`strip_line_end`], every remaining byte must be printable ASCII, and
/// trailing whitespace is trimmed from the decoded text.
///
/// The device CLI prefixes every line with a one-character prompt/echo
/// marker, so the first character of the decoded text is dropped and lines of
/// a single character carry no content.
pub fn parse_line(raw: Option<&[u8]>) -> Event {
    let line = match raw {
        None => return empty_line(),
        Some(l) if l.is_empty() => return empty_line(),
        Some(l) => l,
    };

    let line = match strip_line_end(line) {
        Ok(l) => l,
        Err(event) => return event,
    };

    if line.iter().any(|b| *b < PRINTABLE_MIN || *b > PRINTABLE_MAX) {
        return invalid(line, "Illegal character(s)");
    }

    let text = match std::str::from_utf8(line) {
        Ok(t) => t,
        Err(e) => return invalid(line, &format!("Not ASCII: {e}")),
    };

    let text = text.trim_end();
    if text.is_empty() {
        return empty_line();
    }

    let content = if text.len() > 1 {
        text[1..].to_string()
    } else {
        String::new()
    };

    Event::now(EventKind::TextResponse { content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind(raw: &[u8]) -> EventKind {
        parse_line(Some(raw)).kind
    }

    fn text(raw: &[u8]) -> String {
        match kind(raw) {
            EventKind::TextResponse { content } => content,
            other => panic!("expected TextResponse, got {other:?}"),
        }
    }

    #[test]
    fn none_and_zero_length_are_empty_lines() {
        assert_eq!(
            parse_line(None).kind,
            EventKind::EmptyLine {
                reason: "Empty line".to_string()
            }
        );
        assert_eq!(parse_line(Some(b"")).kind, parse_line(None).kind);
    }

    #[test]
    fn lone_lf_is_invalid() {
        assert_eq!(
            kind(b"\n"),
            EventKind::InvalidLine {
                raw: "0a".to_string(),
                reason: "Msg only 0x0a".to_string()
            }
        );
    }

    #[test]
    fn lone_cr_is_invalid() {
        assert_eq!(
            kind(b"\r"),
            EventKind::InvalidLine {
                raw: "0d".to_string(),
                reason: "Msg only 0x0d".to_string()
            }
        );
    }

    #[test]
    fn crlf_reduces_to_the_cr_only_case() {
        // The LF is stripped first, leaving a lone CR.
        assert_eq!(
            kind(b"\r\n"),
            EventKind::InvalidLine {
                raw: "0d".to_string(),
                reason: "Msg only 0x0d".to_string()
            }
        );
    }

    #[test]
    fn double_cr_reduces_to_the_cr_only_case() {
        assert_eq!(
            kind(b"\r\r"),
            EventKind::InvalidLine {
                raw: "0d".to_string(),
                reason: "Msg only 0x0d".to_string()
            }
        );
    }

    #[test]
    fn delimiter_runs_are_stripped_and_never_returned_as_content() {
        for raw in [
            b">STATUS READY\n".as_slice(),
            b">STATUS READY\r",
            b">STATUS READY\r\n",
            b">STATUS READY\r\r\n",
        ] {
            let content = text(raw);
            assert_eq!(content, "STATUS READY");
            assert!(!content.contains('\r') && !content.contains('\n'));
        }
    }

    #[test]
    fn illegal_byte_anywhere_invalidates_the_whole_line() {
        assert_eq!(
            kind(b"OK\x00\r\n"),
            EventKind::InvalidLine {
                raw: "4f-4b-00".to_string(),
                reason: "Illegal character(s)".to_string()
            }
        );
        // Also when the line is otherwise well-formed text.
        assert!(matches!(
            kind(b"\x07ALERT\r"),
            EventKind::InvalidLine { reason, .. } if reason == "Illegal character(s)"
        ));
        // High bytes are rejected before any decode is attempted.
        assert!(matches!(
            kind(b"OK\xff\r"),
            EventKind::InvalidLine { reason, .. } if reason == "Illegal character(s)"
        ));
    }

    #[test]
    fn whitespace_only_lines_are_empty() {
        assert_eq!(
            kind(b"   \r\n"),
            EventKind::EmptyLine {
                reason: "Empty line".to_string()
            }
        );
        assert_eq!(
            kind(b" \r\n"),
            EventKind::EmptyLine {
                reason: "Empty line".to_string()
            }
        );
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        assert_eq!(text(b">OK  \r\n"), "OK");
    }

    #[test]
    fn prompt_prefix_character_is_dropped() {
        // The device echoes a one-character prompt prefix at the start of
        // every line; parsing removes it before reporting content.
        assert_eq!(text(b">OK THIS IS GOOD\r\n"), "OK THIS IS GOOD");
        assert_eq!(text(b"#boot complete\r"), "boot complete");
    }

    #[test]
    fn prefix_drop_applies_to_every_line() {
        // Deliberate protocol convention, not a bug: even a line without a
        // visible prompt character loses its first character, and a
        // single-character line parses to empty content.
        assert_eq!(text(b"OK\r"), "K");
        assert_eq!(text(b"A\r"), "");
    }

    #[test]
    fn hex_dump_is_dash_separated_lowercase() {
        assert_eq!(hex_dump(b"\x0a"), "0a");
        assert_eq!(hex_dump(b"OK\x00"), "4f-4b-00");
        assert_eq!(hex_dump(b""), "");
    }
}
