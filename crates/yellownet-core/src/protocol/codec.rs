//! Text codec for YellowNet packets.
//!
//! Wire format:
//! ```text
//! packet       := id "." method ";" resource "|" body
//! escaped-char := "\" any-character
//! ```
//!
//! # Escaping asymmetry
//!
//! [`decode`] honours `\` escapes in every field, but [`encode`] writes fields
//! verbatim.  The relay path depends on this: a packet is re-emitted exactly
//! as `Display` renders it.  A `.`, `;` or `|` inside `id`, `method` or
//! `resource` therefore does not survive an `encode` → `decode` trip; use
//! [`encode_escaped`] when building such packets.  The body is always safe
//! because nothing after the first unescaped `|` can end it.

use crate::protocol::messages::{
    Method, Packet, ESCAPE, ID_DELIMITER, METHOD_DELIMITER, RESOURCE_DELIMITER,
};

/// Decoder cursor: which field the next character belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Method,
    Resource,
    Body,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a packet in its canonical form without escaping.
///
/// # Examples
///
/// ```rust
/// use yellownet_core::protocol::{encode, Method, Packet};
///
/// let packet = Packet::new("1", Method::Msg, "chat", "hello|world");
/// assert_eq!(encode(&packet), "1.MSG;chat|hello|world");
/// ```
pub fn encode(packet: &Packet) -> String {
    let mut out = String::with_capacity(
        packet.id.len()
            + packet.method.as_str().len()
            + packet.resource.len()
            + packet.body.len()
            + 3,
    );
    out.push_str(&packet.id);
    out.push(ID_DELIMITER);
    out.push_str(packet.method.as_str());
    out.push(METHOD_DELIMITER);
    out.push_str(&packet.resource);
    out.push(RESOURCE_DELIMITER);
    out.push_str(&packet.body);
    out
}

/// Encodes a packet, escaping reserved characters in the header fields.
///
/// `\`, `.`, `;` and `|` inside `id`, `method` and `resource` get a leading
/// backslash.  The body is written raw.  The result always decodes back to
/// `packet`, except that a body containing `\` loses its backslashes.
///
/// ```rust
/// use yellownet_core::protocol::{decode, encode_escaped, Method, Packet};
///
/// let packet = Packet::new("a.b", Method::Msg, "x|y", "body");
/// let wire = encode_escaped(&packet);
/// assert_eq!(wire, "a\\.b.MSG;x\\|y|body");
/// assert_eq!(decode(&wire), Some(packet));
/// ```
pub fn encode_escaped(packet: &Packet) -> String {
    let mut out = String::with_capacity(encoded_len_hint(packet));
    push_escaped(&mut out, &packet.id);
    out.push(ID_DELIMITER);
    push_escaped(&mut out, packet.method.as_str());
    out.push(METHOD_DELIMITER);
    push_escaped(&mut out, &packet.resource);
    out.push(RESOURCE_DELIMITER);
    out.push_str(&packet.body);
    out
}

/// Decodes one line into a [`Packet`].
///
/// Returns `None` when the line does not contain at least one `.`, one `;`
/// and one `|` somewhere.  That is the normal outcome for console noise on
/// the serial link, not an error.
///
/// Otherwise the line always decodes, even if some fields end up empty;
/// callers check [`Packet::validate`] before relaying.  Unknown methods are
/// accepted as [`Method::Other`].
///
/// # Examples
///
/// ```rust
/// use yellownet_core::protocol::{decode, Method};
///
/// let packet = decode("a\\.b.SYS;r|body").unwrap();
/// assert_eq!(packet.id, "a.b");
/// assert_eq!(packet.method, Method::Sys);
///
/// assert!(decode("no-delimiters-here").is_none());
/// ```
pub fn decode(line: &str) -> Option<Packet> {
    if !(line.contains(ID_DELIMITER)
        && line.contains(METHOD_DELIMITER)
        && line.contains(RESOURCE_DELIMITER))
    {
        return None;
    }

    let mut id = String::new();
    let mut method = String::new();
    let mut resource = String::new();
    let mut body = String::new();

    let mut field = Field::Id;
    let mut escape_pending = false;

    for c in line.chars() {
        if escape_pending {
            escape_pending = false;
        } else if c == ESCAPE {
            escape_pending = true;
            continue;
        } else {
            let next = match (field, c) {
                (Field::Id, ID_DELIMITER) => Some(Field::Method),
                (Field::Method, METHOD_DELIMITER) => Some(Field::Resource),
                (Field::Resource, RESOURCE_DELIMITER) => Some(Field::Body),
                _ => None,
            };
            if let Some(next) = next {
                field = next;
                continue;
            }
        }

        match field {
            Field::Id => id.push(c),
            Field::Method => method.push(c),
            Field::Resource => resource.push(c),
            Field::Body => body.push(c),
        }
    }

    Some(Packet {
        id,
        method: Method::from(method),
        resource,
        body,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn is_reserved(c: char) -> bool {
    matches!(
        c,
        ESCAPE | ID_DELIMITER | METHOD_DELIMITER | RESOURCE_DELIMITER
    )
}

fn push_escaped(out: &mut String, field: &str) {
    for c in field.chars() {
        if is_reserved(c) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

fn encoded_len_hint(packet: &Packet) -> usize {
    let escapes = [
        packet.id.as_str(),
        packet.method.as_str(),
        packet.resource.as_str(),
    ]
    .iter()
    .flat_map(|f| f.chars())
    .filter(|c| is_reserved(*c))
    .count();
    packet.id.len()
        + packet.method.as_str().len()
        + packet.resource.len()
        + packet.body.len()
        + 3
        + escapes
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── decode: rejection ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_line_without_delimiters_is_not_a_packet() {
        assert_eq!(decode("no-delimiters-here"), None);
    }

    #[test]
    fn test_decode_requires_all_three_delimiters() {
        // Each line is missing exactly one delimiter.
        assert_eq!(decode("1.MSG chat|body"), None);
        assert_eq!(decode("1 MSG;chat|body"), None);
        assert_eq!(decode("1.MSG;chat body"), None);
    }

    #[test]
    fn test_decode_empty_line_is_not_a_packet() {
        assert_eq!(decode(""), None);
    }

    #[test]
    fn test_decode_delimiter_presence_is_not_positional() {
        // Delimiters in the "wrong" order still pass the precondition; the
        // state machine then folds everything after the first `.` into method.
        let packet = decode("|;.").expect("precondition only checks presence");
        assert_eq!(packet.id, "|;");
        assert_eq!(packet.method, Method::Other(String::new()));
        assert_eq!(packet.resource, "");
        assert_eq!(packet.body, "");
        assert!(!packet.is_valid());
    }

    #[test]
    fn test_decode_escaped_delimiters_satisfy_precondition() {
        // The precondition looks at raw characters, escaped or not.
        let packet = decode("a\\.b\\;c\\|d").expect("raw delimiters are present");
        assert_eq!(packet.id, "a.b;c|d");
        assert_eq!(packet.method.as_str(), "");
    }

    // ── decode: fields ────────────────────────────────────────────────────────

    #[test]
    fn test_decode_simple_packet() {
        // Arrange
        let line = "42.REQ;weather|paris";

        // Act
        let packet = decode(line).expect("well-formed line");

        // Assert
        assert_eq!(packet.id, "42");
        assert_eq!(packet.method, Method::Req);
        assert_eq!(packet.resource, "weather");
        assert_eq!(packet.body, "paris");
    }

    #[test]
    fn test_decode_escaped_dot_in_id_does_not_transition() {
        let packet = decode("a\\.b.SYS;r|body").unwrap();
        assert_eq!(packet.id, "a.b");
        assert_eq!(packet.method, Method::Sys);
        assert_eq!(packet.resource, "r");
        assert_eq!(packet.body, "body");
    }

    #[test]
    fn test_decode_escaped_pipe_in_body_is_unescaped() {
        let packet = decode("1.MSG;chat|hello\\|world").unwrap();
        assert_eq!(packet, Packet::new("1", Method::Msg, "chat", "hello|world"));
    }

    #[test]
    fn test_decode_escaped_backslash_is_literal() {
        let packet = decode("a\\\\b.MSG;r|x").unwrap();
        assert_eq!(packet.id, "a\\b");
    }

    #[test]
    fn test_decode_escape_applies_to_ordinary_characters() {
        let packet = decode("\\a.MSG;r|x").unwrap();
        assert_eq!(packet.id, "a");
    }

    #[test]
    fn test_decode_trailing_backslash_is_dropped() {
        let packet = decode("1.MSG;r|body\\").unwrap();
        assert_eq!(packet.body, "body");
    }

    #[test]
    fn test_decode_body_keeps_later_delimiters() {
        let packet = decode("1.MSG;r|a.b;c|d").unwrap();
        assert_eq!(packet.body, "a.b;c|d");
    }

    #[test]
    fn test_decode_only_first_delimiter_per_state_transitions() {
        // A second `.` while in Method state is ordinary text.
        let packet = decode("1.MS.G;r;s|x").unwrap();
        assert_eq!(packet.method, Method::Other("MS.G".to_string()));
        assert_eq!(packet.resource, "r;s");
    }

    #[test]
    fn test_decode_delimiters_out_of_state_accumulate() {
        // `;` and `|` before the first `.` belong to the id.
        let packet = decode("a;b|c.MSG;r|x").unwrap();
        assert_eq!(packet.id, "a;b|c");
        assert_eq!(packet.method, Method::Msg);
    }

    #[test]
    fn test_decode_unknown_method_is_accepted() {
        let packet = decode("1.FOO;r|x").unwrap();
        assert_eq!(packet.method, Method::Other("FOO".to_string()));
        assert!(packet.is_valid());
    }

    #[test]
    fn test_decode_empty_body_parses_but_is_invalid() {
        let packet = decode("1.MSG;chat|").unwrap();
        assert_eq!(packet.body, "");
        assert!(!packet.is_valid());
    }

    #[test]
    fn test_decode_control_packet() {
        let packet = decode("1.GTW;set_address|10.0.0.5").unwrap();
        assert_eq!(packet.method, Method::Gtw);
        assert_eq!(packet.resource, "set_address");
        assert_eq!(packet.body, "10.0.0.5");
    }

    #[test]
    fn test_decode_preserves_non_ascii() {
        let packet = decode("é.MSG;ché|日本").unwrap();
        assert_eq!(packet.id, "é");
        assert_eq!(packet.resource, "ché");
        assert_eq!(packet.body, "日本");
    }

    // ── encode ────────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_matches_display() {
        let packet = Packet::new("9", Method::Asw, "weather", "sunny");
        assert_eq!(encode(&packet), packet.to_string());
        assert_eq!(encode(&packet), "9.ASW;weather|sunny");
    }

    #[test]
    fn test_encode_does_not_escape_body() {
        let packet = Packet::new("1", Method::Msg, "chat", "hello|world");
        assert_eq!(encode(&packet), "1.MSG;chat|hello|world");
    }

    #[test]
    fn test_encode_does_not_escape_header_fields() {
        // Known asymmetry: the dot in the id desynchronises a decoder.
        let packet = Packet::new("a.b", Method::Msg, "r", "x");
        let wire = encode(&packet);
        assert_eq!(wire, "a.b.MSG;r|x");
        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded.id, "a");
        assert_eq!(decoded.method, Method::Other("b.MSG".to_string()));
    }

    #[test]
    fn test_encode_then_decode_with_reserved_body_characters() {
        let packet = Packet::new("1", Method::Msg, "chat", "a.b;c|d");
        assert_eq!(decode(&encode(&packet)), Some(packet));
    }

    // ── encode_escaped ────────────────────────────────────────────────────────

    #[test]
    fn test_encode_escaped_escapes_header_fields_only() {
        let packet = Packet::new("a.b", "M;X", "r|s", "x|y");
        assert_eq!(encode_escaped(&packet), "a\\.b.M\\;X;r\\|s|x|y");
    }

    #[test]
    fn test_encode_escaped_survives_decode() {
        let packet = Packet::new("a\\.b", Method::Req, "x;y|z", "body.with|delims");
        assert_eq!(decode(&encode_escaped(&packet)), Some(packet));
    }

    #[test]
    fn test_encode_escaped_without_reserved_characters_equals_encode() {
        let packet = Packet::new("1", Method::Msg, "chat", "hi");
        assert_eq!(encode_escaped(&packet), encode(&packet));
    }
}
