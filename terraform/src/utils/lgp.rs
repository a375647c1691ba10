//! Narrow adapter for the LGP archive holding the world files.
//!
//! The reader walks the table of contents and hands back `(name, bytes)`
//! pairs. The packer re-packs an *existing* archive with replacement
//! contents for the same file set: offsets are recomputed, while the TOC
//! order, the CRC lookup tables between TOC and file data, and the trailing
//! terminator are preserved verbatim. Creating archives from scratch is out
//! of scope.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const CREATOR_LEN: usize = 12;
const NAME_LEN: usize = 20;
const TOC_ENTRY_LEN: usize = NAME_LEN + 4 + 1 + 2;
/// Byte length of a file record header: name + u32 length.
const FILE_HEADER_LEN: usize = NAME_LEN + 4;

struct TocEntry {
    name: String,
    offset: usize,
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn parse_toc(data: &[u8]) -> Result<Vec<TocEntry>> {
    if data.len() < CREATOR_LEN + 4 {
        bail!("archive header truncated at {} bytes", data.len());
    }
    let count = read_u32(data, CREATOR_LEN) as usize;
    let toc_end = CREATOR_LEN + 4 + count * TOC_ENTRY_LEN;
    if data.len() < toc_end {
        bail!("archive TOC for {count} files does not fit");
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let pos = CREATOR_LEN + 4 + i * TOC_ENTRY_LEN;
        let name_bytes = &data[pos..pos + NAME_LEN];
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();
        let offset = read_u32(data, pos + NAME_LEN) as usize;
        if offset + FILE_HEADER_LEN > data.len() {
            bail!("file '{name}' points outside the archive");
        }
        entries.push(TocEntry { name, offset });
    }
    Ok(entries)
}

fn file_content(data: &[u8], entry: &TocEntry) -> Result<(usize, usize)> {
    let length = read_u32(data, entry.offset + NAME_LEN) as usize;
    let start = entry.offset + FILE_HEADER_LEN;
    if start + length > data.len() {
        bail!("file '{}' is truncated", entry.name);
    }
    Ok((start, length))
}

/// Loads every file of the archive as `(name, bytes)`, in TOC order.
pub fn load_files(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let data =
        fs::read(path).with_context(|| format!("cannot read archive {}", path.display()))?;
    let toc = parse_toc(&data)?;

    let mut files = Vec::with_capacity(toc.len());
    for entry in &toc {
        let (start, length) = file_content(&data, entry)?;
        files.push((entry.name.clone(), data[start..start + length].to_vec()));
    }
    Ok(files)
}

/// Rewrites the archive with replacement contents for the named files.
/// Every replacement must already exist in the archive.
pub fn pack(path: &Path, replacements: &[(String, Vec<u8>)]) -> Result<()> {
    let data =
        fs::read(path).with_context(|| format!("cannot read archive {}", path.display()))?;
    let toc = parse_toc(&data)?;

    let mut pending: HashMap<&str, &[u8]> = replacements
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();

    let toc_end = CREATOR_LEN + 4 + toc.len() * TOC_ENTRY_LEN;
    let first_offset = toc.iter().map(|e| e.offset).min().unwrap_or(toc_end);
    if first_offset < toc_end {
        bail!("file data overlaps the archive TOC");
    }

    // Physical order of the file records, which may differ from TOC order.
    let mut order: Vec<usize> = (0..toc.len()).collect();
    order.sort_by_key(|&i| toc[i].offset);

    let last = &toc[*order.last().ok_or_else(|| anyhow!("archive holds no files"))?];
    let (last_start, last_length) = file_content(&data, last)?;
    let terminator = &data[last_start + last_length..];

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..toc_end]);
    // CRC lookup and conflict tables; file names are unchanged, so these
    // stay valid as-is.
    out.extend_from_slice(&data[toc_end..first_offset]);

    let mut new_offsets = vec![0usize; toc.len()];
    for &i in &order {
        let entry = &toc[i];
        let (start, length) = file_content(&data, entry)?;
        let plain = entry.name.trim_start_matches('/');
        let content = match pending.remove(plain) {
            Some(replacement) => replacement,
            None => &data[start..start + length],
        };
        new_offsets[i] = out.len();
        out.extend_from_slice(&data[entry.offset..entry.offset + NAME_LEN]);
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(content);
    }
    out.extend_from_slice(terminator);

    if let Some(name) = pending.keys().next() {
        bail!("file '{name}' is not present in the archive");
    }

    for (i, offset) in new_offsets.iter().enumerate() {
        let pos = CREATOR_LEN + 4 + i * TOC_ENTRY_LEN + NAME_LEN;
        out[pos..pos + 4].copy_from_slice(&(*offset as u32).to_le_bytes());
    }

    fs::write(path, out).with_context(|| format!("cannot write archive {}", path.display()))
}

/// Builds a minimal archive for the driver tests.
#[cfg(test)]
pub(crate) fn build_test_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"\0\0SQUARESOFT");
    out.extend_from_slice(&(files.len() as u32).to_le_bytes());
    let toc_pos = out.len();
    out.resize(out.len() + files.len() * TOC_ENTRY_LEN, 0);
    // Stand-in for the CRC lookup tables the adapter treats as opaque.
    out.extend_from_slice(&[0xAA; 16]);

    let mut offsets = Vec::new();
    for (name, content) in files {
        offsets.push(out.len());
        let mut name_buf = [0u8; NAME_LEN];
        name_buf[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&name_buf);
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(content);
    }
    out.extend_from_slice(b"FINAL FANTASY7");

    for (i, ((name, _), offset)) in files.iter().zip(&offsets).enumerate() {
        let pos = toc_pos + i * TOC_ENTRY_LEN;
        out[pos..pos + name.len()].copy_from_slice(name.as_bytes());
        out[pos + NAME_LEN..pos + NAME_LEN + 4]
            .copy_from_slice(&(*offset as u32).to_le_bytes());
        out[pos + NAME_LEN + 4] = 14; // check byte, unused by the adapter
    }
    out
}
