//! Field-text codec for the message container.
//!
//! Bytes `0x00..=0x5E` map to ASCII at `+0x20`; braces are hex-escaped so a
//! literal `{` always opens an escape sequence. `0xE7` is a line break, the
//! party glyphs decode to `{NAME}` escapes, and every remaining byte
//! round-trips as an `{XX}` hex escape. Messages end at the `0xFF`
//! terminator, which `encode` appends.

use anyhow::{bail, Result};

const TERMINATOR: u8 = 0xFF;
const NEWLINE: u8 = 0xE7;

static GLYPHS: &[(u8, &str)] = &[
    (0xEA, "CLOUD"),
    (0xEB, "BARRET"),
    (0xEC, "TIFA"),
    (0xED, "AERITH"),
    (0xEE, "RED XIII"),
    (0xEF, "YUFFIE"),
    (0xF0, "CAIT SITH"),
    (0xF1, "VINCENT"),
    (0xF2, "CID"),
    (0xF3, "PARTY #1"),
    (0xF4, "PARTY #2"),
    (0xF5, "PARTY #3"),
];

fn glyph_name(byte: u8) -> Option<&'static str> {
    GLYPHS
        .iter()
        .find(|&&(code, _)| code == byte)
        .map(|&(_, name)| name)
}

fn glyph_byte(name: &str) -> Option<u8> {
    GLYPHS
        .iter()
        .find(|&&(_, glyph)| glyph == name)
        .map(|&(code, _)| code)
}

/// Decodes an encoded message, stopping at the terminator.
pub fn decode(data: &[u8]) -> Result<String> {
    let mut out = String::new();
    for &byte in data {
        if byte == TERMINATOR {
            return Ok(out);
        }
        if byte == NEWLINE {
            out.push('\n');
            continue;
        }
        if let Some(name) = glyph_name(byte) {
            out.push_str(&format!("{{{name}}}"));
            continue;
        }
        if byte <= 0x5E {
            let ch = (byte + 0x20) as char;
            if ch != '{' && ch != '}' {
                out.push(ch);
                continue;
            }
        }
        out.push_str(&format!("{{{byte:02X}}}"));
    }
    Ok(out)
}

/// Encodes a message and appends the terminator. Inverse of [`decode`] for
/// every representable message.
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() + 1);
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' => out.push(NEWLINE),
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => bail!("unterminated {{...}} escape"),
                    }
                }
                if let Some(byte) = glyph_byte(&name) {
                    out.push(byte);
                } else if name.len() == 2 && name.bytes().all(|b| b.is_ascii_hexdigit()) {
                    out.push(u8::from_str_radix(&name, 16).expect("checked hex digits"));
                } else {
                    bail!("unknown escape {{{name}}}");
                }
            }
            '}' => bail!("unescaped '}}'"),
            c if (' '..='~').contains(&c) => out.push(c as u8 - 0x20),
            c => bail!("character '{c}' cannot be encoded"),
        }
    }
    out.push(TERMINATOR);
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_text_round_trip() {
        let encoded = encode("Hello, world!").unwrap();
        assert_eq!(encoded.last(), Some(&TERMINATOR));
        assert_eq!(decode(&encoded).unwrap(), "Hello, world!");
        // 'H' sits at 0x48 - 0x20.
        assert_eq!(encoded[0], 0x28);
    }

    #[test]
    fn newlines_and_glyphs() {
        let text = "{CLOUD}\nIs that you?";
        let encoded = encode(text).unwrap();
        assert_eq!(encoded[0], 0xEA);
        assert_eq!(encoded[1], NEWLINE);
        assert_eq!(decode(&encoded).unwrap(), text);
    }

    #[test]
    fn every_byte_round_trips() {
        for byte in 0u8..=0xFE {
            let decoded = decode(&[byte, TERMINATOR]).unwrap();
            let encoded = encode(&decoded).unwrap();
            assert_eq!(encoded, vec![byte, TERMINATOR], "byte {byte:#04x} via {decoded:?}");
        }
    }

    #[test]
    fn decode_stops_at_terminator() {
        assert_eq!(decode(&[0x21, TERMINATOR, 0x22]).unwrap(), "A");
    }

    #[test]
    fn bad_escapes_are_rejected() {
        assert!(encode("{NOBODY}").is_err());
        assert!(encode("{unterminated").is_err());
        assert!(encode("stray } brace").is_err());
    }
}
