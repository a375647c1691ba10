//! On-disk layout of the script containers (`wm0.ev`, `wm2.ev`, `wm3.ev`)
//! and the message container (`mes`). All words are little-endian.
//!
//! A script file is a 0x400-byte header followed by the code area. The
//! header holds up to 255 `(index_word, offset_word)` pairs starting at word
//! 2; the pair at words 0..1 is a dummy entry and is skipped. Offsets are
//! word offsets into the code area, whose word 0 holds a shared `Return`
//! serving as the dummy function every unused slot can point at.

use tracing::warn;

use crate::error::{Result, ScriptError};
use crate::opcode::codes::RETURN;

/// Total size of a script container in bytes.
pub const SCRIPT_SIZE: usize = 0x7000;
/// Word index where the code area begins (byte offset 0x400).
pub const CODE_BASE_WORD: usize = 0x200;
/// Total size of the message container in bytes.
pub const MESSAGES_SIZE: usize = 0x1000;

const INDEX_ENTRIES: usize = 255;
const SENTINEL: u16 = 0xFFFF;

const TAG_SYSTEM: u16 = 0;
const TAG_MODEL: u16 = 1;
const TAG_MESH: u16 = 2;

/// A function's identity within the index. Mesh coordinates pack as
/// `x * 36 + z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKey {
    System { id: u8 },
    Model { model_id: u8, id: u8 },
    Mesh { coords: u16, walkmesh_type: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: FunctionKey,
    /// Word offset of the function's code within the code area.
    pub offset: u16,
}

impl FunctionKey {
    pub fn decode(word: u16) -> Option<FunctionKey> {
        match word >> 14 {
            TAG_SYSTEM => Some(FunctionKey::System {
                id: (word & 0xFF) as u8,
            }),
            TAG_MODEL => Some(FunctionKey::Model {
                model_id: ((word >> 8) & 0x3F) as u8,
                id: (word & 0xFF) as u8,
            }),
            TAG_MESH => Some(FunctionKey::Mesh {
                coords: (word >> 4) & 0x3FF,
                walkmesh_type: (word & 0xF) as u8,
            }),
            _ => None,
        }
    }

    pub fn encode(&self) -> u16 {
        match *self {
            FunctionKey::System { id } => id as u16,
            FunctionKey::Model { model_id, id } => 0x4000 | ((model_id as u16) << 8) | id as u16,
            FunctionKey::Mesh {
                coords,
                walkmesh_type,
            } => 0x8000 | (coords << 4) | walkmesh_type as u16,
        }
    }

    /// The file stem a function extracts to, e.g. `012_model_03_05`.
    pub fn file_stem(&self, file_id: usize) -> String {
        match *self {
            FunctionKey::System { id } => format!("{file_id:03}_system_{id:02}"),
            FunctionKey::Model { model_id, id } => {
                format!("{file_id:03}_model_{model_id:02}_{id:02}")
            }
            FunctionKey::Mesh {
                coords,
                walkmesh_type,
            } => format!(
                "{file_id:03}_mesh_{:02}_{:02}_{walkmesh_type}",
                coords / 36,
                coords % 36
            ),
        }
    }

    /// Parses a file stem back into a key. The leading order index (and the
    /// `-NNN` duplicate marker, if any) is ignored.
    pub fn from_file_stem(stem: &str) -> Result<FunctionKey> {
        let bad = || ScriptError::MalformedContainer(format!("unrecognized script file name '{stem}'"));
        let parts: Vec<&str> = stem.split('_').collect();
        let num = |s: &str| s.parse::<u16>().map_err(|_| bad());
        match (parts.get(1), parts.len()) {
            (Some(&"system"), 3) => Ok(FunctionKey::System {
                id: num(parts[2])? as u8,
            }),
            (Some(&"model"), 4) => Ok(FunctionKey::Model {
                model_id: num(parts[2])? as u8,
                id: num(parts[3])? as u8,
            }),
            (Some(&"mesh"), 5) => {
                let coords = num(parts[2])?
                    .checked_mul(36)
                    .and_then(|x| x.checked_add(num(parts[3]).ok()?))
                    .filter(|&c| c <= 0x3FF)
                    .ok_or_else(bad)?;
                Ok(FunctionKey::Mesh {
                    coords,
                    walkmesh_type: num(parts[4])? as u8,
                })
            }
            _ => Err(bad()),
        }
    }
}

fn read_word(data: &[u8], word: usize) -> u16 {
    u16::from_le_bytes([data[word * 2], data[word * 2 + 1]])
}

fn write_word(data: &mut [u8], word: usize, value: u16) {
    data[word * 2..word * 2 + 2].copy_from_slice(&value.to_le_bytes());
}

/// Reads the index and code area of a script container. Index order is
/// preserved as stored; entries with an invalid type tag are reported and
/// skipped.
pub fn read_script(data: &[u8]) -> Result<(Vec<IndexEntry>, Vec<u16>)> {
    if data.len() < CODE_BASE_WORD * 2 {
        return Err(ScriptError::MalformedContainer(format!(
            "script header truncated at {} bytes",
            data.len()
        )));
    }

    let mut index = Vec::new();
    let mut pos = 2; // skip the dummy entry
    while pos < CODE_BASE_WORD {
        let word = read_word(data, pos);
        let offset = read_word(data, pos + 1);
        pos += 2;

        if word == SENTINEL {
            continue;
        }
        match FunctionKey::decode(word) {
            Some(key) => index.push(IndexEntry { key, offset }),
            None => warn!("invalid function type in index word {word:#06x}, skipping"),
        }
    }

    let code = data[CODE_BASE_WORD * 2..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok((index, code))
}

/// Writes a script container from per-function code blobs, in the order
/// given. Word 0 of the code area receives the shared `Return`; function
/// code is laid out back to back starting at word 1.
pub fn write_script(functions: &[(FunctionKey, Vec<u8>)]) -> Result<Vec<u8>> {
    if functions.len() > INDEX_ENTRIES {
        return Err(ScriptError::MalformedContainer(format!(
            "{} functions exceed the {INDEX_ENTRIES} index slots",
            functions.len()
        )));
    }

    let mut data = vec![0u8; SCRIPT_SIZE];
    write_word(&mut data, CODE_BASE_WORD, RETURN);

    let mut index_pos = 2;
    let mut offset = 1usize;
    for (key, code) in functions {
        let start = (CODE_BASE_WORD + offset) * 2;
        if start + code.len() > SCRIPT_SIZE {
            return Err(ScriptError::MalformedContainer(
                "script code area overflows the container".to_string(),
            ));
        }
        write_word(&mut data, index_pos, key.encode());
        write_word(&mut data, index_pos + 1, offset as u16);
        data[start..start + code.len()].copy_from_slice(code);
        index_pos += 2;
        offset += code.len() / 2;
    }

    while index_pos < CODE_BASE_WORD {
        write_word(&mut data, index_pos, SENTINEL);
        write_word(&mut data, index_pos + 1, 0);
        index_pos += 2;
    }

    Ok(data)
}

/// Reads the message container: a count word, then byte offsets at word
/// indices `1..=count`, each pointing at an encoded message. Returns one
/// byte slice per message running to the end of the container; the text
/// codec owns the terminator.
pub fn read_messages(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    if data.len() < 2 {
        return Err(ScriptError::MalformedContainer(
            "message container truncated".to_string(),
        ));
    }
    let count = read_word(data, 0) as usize;
    if (1 + count) * 2 > data.len() {
        return Err(ScriptError::MalformedContainer(format!(
            "message offset table for {count} entries does not fit"
        )));
    }

    let mut messages = Vec::with_capacity(count);
    for i in 0..count {
        let offset = read_word(data, 1 + i) as usize;
        if offset >= data.len() {
            return Err(ScriptError::MalformedContainer(format!(
                "message {i} offset {offset:#x} is outside the container"
            )));
        }
        messages.push(data[offset..].to_vec());
    }
    Ok(messages)
}

/// Writes the message container from already-encoded messages, padded to
/// [`MESSAGES_SIZE`] bytes.
pub fn write_messages(messages: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut data = vec![0u8; MESSAGES_SIZE];
    let count = messages.len();
    write_word(&mut data, 0, count as u16);

    let mut offset = 2 + count * 2;
    for (i, message) in messages.iter().enumerate() {
        if offset + message.len() > MESSAGES_SIZE {
            return Err(ScriptError::MalformedContainer(format!(
                "message {i} overflows the container"
            )));
        }
        write_word(&mut data, 1 + i, offset as u16);
        data[offset..offset + message.len()].copy_from_slice(message);
        offset += message.len();
    }
    Ok(data)
}
