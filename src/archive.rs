//! Minimal ZIP reader for OOXML packages.
//!
//! Members are read straight from their local file headers; the central
//! directory is never consulted because every byte we need precedes it.

use std::collections::HashMap;

use miniz_oxide::inflate::stream::{InflateState, inflate};
use miniz_oxide::{DataFormat, MZError, MZFlush, MZStatus};
use tokio_util::sync::CancellationToken;

use crate::ParseOptions;
use crate::error::Error;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const LOCAL_HEADER_LEN: usize = 30;
const ZIP64_EXTRA_ID: u16 = 0x0001;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

const INFLATE_CHUNK: usize = 64 * 1024;

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    let bytes: [u8; 8] = data.get(at..at + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

struct LocalHeader {
    name: String,
    flags: u16,
    method: u16,
    compressed_size: u64,
    uncompressed_size: u64,
    payload_start: usize,
}

impl LocalHeader {
    /// Sizes are deferred to a trailing data descriptor.
    fn is_deferred(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0 && self.compressed_size == 0
    }

    fn payload_end(&self) -> Option<usize> {
        if self.is_deferred() {
            return None;
        }
        usize::try_from(self.compressed_size)
            .ok()
            .and_then(|len| self.payload_start.checked_add(len))
    }
}

fn parse_local_header(data: &[u8], offset: usize) -> Option<LocalHeader> {
    let flags = read_u16(data, offset + 6)?;
    let method = read_u16(data, offset + 8)?;
    let mut compressed_size = u64::from(read_u32(data, offset + 18)?);
    let mut uncompressed_size = u64::from(read_u32(data, offset + 22)?);
    let name_len = usize::from(read_u16(data, offset + 26)?);
    let extra_len = usize::from(read_u16(data, offset + 28)?);

    let name_start = offset + LOCAL_HEADER_LEN;
    let extra_start = name_start + name_len;
    let payload_start = extra_start + extra_len;
    let name = data.get(name_start..extra_start)?;
    let extra = data.get(extra_start..payload_start)?;

    if (compressed_size == u64::from(u32::MAX) || uncompressed_size == u64::from(u32::MAX))
        && let Some((uncompressed, compressed)) = zip64_sizes(extra)
    {
        uncompressed_size = uncompressed;
        compressed_size = compressed;
    }

    Some(LocalHeader {
        name: String::from_utf8_lossy(name).into_owned(),
        flags,
        method,
        compressed_size,
        uncompressed_size,
        payload_start,
    })
}

/// Local-header ZIP64 extra field: uncompressed size, then compressed size.
fn zip64_sizes(extra: &[u8]) -> Option<(u64, u64)> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let id = read_u16(extra, pos)?;
        let len = usize::from(read_u16(extra, pos + 2)?);
        if id == ZIP64_EXTRA_ID && len >= 16 {
            return Some((read_u64(extra, pos + 4)?, read_u64(extra, pos + 12)?));
        }
        pos += 4 + len;
    }
    None
}

/// Inflate a raw DEFLATE stream. Returns the output and the number of input
/// bytes the stream occupied.
fn inflate_raw(
    name: &str,
    input: &[u8],
    size_hint: usize,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<(Vec<u8>, usize), Error> {
    let mut state = InflateState::new_boxed(DataFormat::Raw);
    let mut out = Vec::with_capacity(size_hint.min(limit));
    let mut chunk = vec![0u8; INFLATE_CHUNK];
    let mut consumed = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let result = inflate(&mut state, &input[consumed..], &mut chunk, MZFlush::None);
        consumed += result.bytes_consumed;
        out.extend_from_slice(&chunk[..result.bytes_written]);
        if out.len() > limit {
            return Err(Error::malformed(
                name,
                format!("inflated size exceeds {limit} bytes"),
            ));
        }
        let progressed = result.bytes_consumed > 0 || result.bytes_written > 0;
        match result.status {
            Ok(MZStatus::StreamEnd) => return Ok((out, consumed)),
            Ok(_) | Err(MZError::Buf) if progressed => {}
            Ok(_) | Err(MZError::Buf) => {
                return Err(Error::malformed(name, "truncated deflate stream"));
            }
            Err(e) => return Err(Error::malformed(name, format!("corrupt deflate data ({e:?})"))),
        }
    }
}

/// Decoded member bytes plus the offset where scanning resumes.
fn extract_member(
    data: &[u8],
    header: &LocalHeader,
    options: &ParseOptions,
    cancel: &CancellationToken,
) -> Result<(Vec<u8>, usize), Error> {
    if header.flags & FLAG_ENCRYPTED != 0 {
        return Err(Error::malformed(&header.name, "encrypted members are not supported"));
    }
    if header.uncompressed_size > options.max_entry_bytes as u64 {
        return Err(Error::malformed(
            &header.name,
            format!("declared size {} exceeds limit", header.uncompressed_size),
        ));
    }
    let size_hint = header.uncompressed_size as usize;

    match (header.method, header.payload_end()) {
        (METHOD_STORED, Some(end)) => {
            let bytes = data
                .get(header.payload_start..end)
                .ok_or_else(|| Error::malformed(&header.name, "payload runs past end of archive"))?;
            Ok((bytes.to_vec(), end))
        }
        (METHOD_STORED, None) => Err(Error::malformed(
            &header.name,
            "stored member without sizes in its local header",
        )),
        (METHOD_DEFLATE, Some(end)) if end == header.payload_start => Ok((Vec::new(), end)),
        (METHOD_DEFLATE, Some(end)) => {
            let payload = data
                .get(header.payload_start..end)
                .ok_or_else(|| Error::malformed(&header.name, "payload runs past end of archive"))?;
            let (bytes, _) = inflate_raw(
                &header.name,
                payload,
                size_hint,
                options.max_entry_bytes,
                cancel,
            )?;
            Ok((bytes, end))
        }
        (METHOD_DEFLATE, None) => {
            let payload = &data[header.payload_start.min(data.len())..];
            let (bytes, consumed) = inflate_raw(
                &header.name,
                payload,
                size_hint,
                options.max_entry_bytes,
                cancel,
            )?;
            let mut next = header.payload_start + consumed;
            // crc32, compressed size, uncompressed size; the signature is optional
            if read_u32(data, next) == Some(DATA_DESCRIPTOR_SIG) {
                next += 4;
            }
            Ok((bytes, (next + 12).min(data.len())))
        }
        (other, _) => Err(Error::malformed(
            &header.name,
            format!("unsupported compression method {other}"),
        )),
    }
}

/// The decompressed members of one ZIP container.
#[derive(Debug, Default)]
pub struct Archive {
    entries: HashMap<String, Vec<u8>>,
}

impl Archive {
    /// Read every member of `data`.
    pub fn read(
        data: &[u8],
        options: &ParseOptions,
        cancel: &CancellationToken,
    ) -> Result<Self, Error> {
        Self::read_filtered(data, options, cancel, |_| true)
    }

    /// Read the members accepted by `wanted`; the rest are stepped over
    /// without being inflated.
    ///
    /// A member that fails to decode is logged and skipped. The only error
    /// returned is [`Error::Cancelled`].
    pub fn read_filtered(
        data: &[u8],
        options: &ParseOptions,
        cancel: &CancellationToken,
        wanted: impl Fn(&str) -> bool,
    ) -> Result<Self, Error> {
        let mut entries = HashMap::new();
        let mut offset = 0usize;

        while offset + 4 <= data.len() {
            match read_u32(data, offset) {
                Some(LOCAL_HEADER_SIG) => {}
                Some(CENTRAL_HEADER_SIG) => break,
                _ => {
                    offset += 1;
                    continue;
                }
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(header) = parse_local_header(data, offset) else {
                offset += 1;
                continue;
            };

            if header.name.ends_with('/') || !wanted(&header.name) {
                offset = header.payload_end().unwrap_or(header.payload_start);
                continue;
            }

            match extract_member(data, &header, options, cancel) {
                Ok((bytes, next)) => {
                    log::debug!("extracted {} ({} bytes)", header.name, bytes.len());
                    entries.insert(header.name, bytes);
                    offset = next;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    log::warn!("skipping archive member: {e}");
                    offset = header
                        .payload_end()
                        .filter(|end| *end <= data.len())
                        .unwrap_or(header.payload_start);
                }
            }
        }

        Ok(Archive { entries })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// A member decoded as text: UTF-16 when it carries a UTF-16 byte order
    /// mark, UTF-8 (lossily) otherwise.
    pub fn text(&self, name: &str) -> Option<String> {
        let bytes = self.get(name)?;
        if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&units));
        }
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
