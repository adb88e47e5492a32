// src/transport/wire.rs

//! Fixed-layout encoding of the messages exchanged between coordinator and
//! workers.
//!
//! Every message starts with a one-byte tag. Integers are little-endian
//! `u64`, pixel channels little-endian `f32`.
//!
//! ```text
//! Assign : 0x01 rank mode(u8) cycle_size count { x y width height }*count
//! Pixels : 0x02 len { f32 }*len
//! Exit   : 0x03
//! ```

use crate::config::{ConfigError, PartitionMode};
use crate::partition::Region;
use std::fmt;
use thiserror::Error;

const TAG_ASSIGN: u8 = 0x01;
const TAG_PIXELS: u8 = 0x02;
const TAG_EXIT: u8 = 0x03;

/// Work handed to one rank: the regions it must shade, in order, and the
/// mode they were computed with so the worker can check it agrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub rank: usize,
    pub mode: PartitionMode,
    pub regions: Vec<Region>,
}

impl Assignment {
    /// Total pixels across every region.
    pub fn pixel_count(&self) -> usize {
        self.regions.iter().map(Region::area).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Assign(Assignment),
    Pixels(Vec<f32>),
    Exit,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Assign(_) => "assign",
            Message::Pixels(_) => "pixels",
            Message::Exit => "exit",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::Assign(assignment) => {
                let mut out = Vec::with_capacity(1 + 8 * 4 + 1 + 32 * assignment.regions.len());
                out.push(TAG_ASSIGN);
                write_usize(&mut out, assignment.rank);
                out.push(assignment.mode.code());
                write_usize(&mut out, assignment.mode.cycle_size());
                write_usize(&mut out, assignment.regions.len());
                for region in &assignment.regions {
                    write_usize(&mut out, region.x);
                    write_usize(&mut out, region.y);
                    write_usize(&mut out, region.width);
                    write_usize(&mut out, region.height);
                }
                out
            }
            Message::Pixels(channels) => {
                let mut out = Vec::with_capacity(1 + 8 + 4 * channels.len());
                out.push(TAG_PIXELS);
                write_usize(&mut out, channels.len());
                for value in channels {
                    out.extend_from_slice(&value.to_le_bytes());
                }
                out
            }
            Message::Exit => vec![TAG_EXIT],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = ByteReader::new(bytes);
        let message = match reader.read_u8("tag")? {
            TAG_ASSIGN => {
                let rank = reader.read_usize("rank")?;
                let code = reader.read_u8("mode")?;
                let cycle_size = reader.read_usize("cycle size")?;
                let mode = PartitionMode::from_code(code, cycle_size)?;
                let count = reader.read_usize("region count")?;
                if count > reader.remaining() / 32 {
                    return Err(WireError::Truncated {
                        field: "regions",
                        offset: reader.position(),
                    });
                }
                let mut regions = Vec::with_capacity(count);
                for _ in 0..count {
                    regions.push(Region::new(
                        reader.read_usize("region x")?,
                        reader.read_usize("region y")?,
                        reader.read_usize("region width")?,
                        reader.read_usize("region height")?,
                    ));
                }
                Message::Assign(Assignment {
                    rank,
                    mode,
                    regions,
                })
            }
            TAG_PIXELS => {
                let len = reader.read_usize("pixel count")?;
                if len > reader.remaining() / 4 {
                    return Err(WireError::Truncated {
                        field: "pixels",
                        offset: reader.position(),
                    });
                }
                let channels = reader
                    .read_exact(4 * len, "pixels")?
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                Message::Pixels(channels)
            }
            TAG_EXIT => Message::Exit,
            other => return Err(WireError::UnknownTag(other)),
        };
        if reader.remaining() != 0 {
            return Err(WireError::TrailingBytes(reader.remaining()));
        }
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Assign(a) => write!(f, "assign({} regions for rank {})", a.regions.len(), a.rank),
            Message::Pixels(p) => write!(f, "pixels({} channels)", p.len()),
            Message::Exit => f.write_str("exit"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("message ended while reading {field} at byte {offset}")]
    Truncated { field: &'static str, offset: usize },
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    #[error("{0} unexpected bytes after the message")]
    TrailingBytes(usize),
    #[error("value of {0} does not fit this platform")]
    Overflow(&'static str),
    #[error("invalid partitioning mode: {0}")]
    Mode(#[from] ConfigError),
}

fn write_usize(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u64).to_le_bytes());
}

/// Cursor over a received payload.
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    fn read_exact(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::Truncated {
                field,
                offset: self.offset,
            });
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..start + len])
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.read_exact(1, field)?[0])
    }

    fn read_usize(&mut self, field: &'static str) -> Result<usize, WireError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_exact(8, field)?);
        usize::try_from(u64::from_le_bytes(raw)).map_err(|_| WireError::Overflow(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn cyclic_assignment_survives_encoding() {
        let message = Message::Assign(Assignment {
            rank: 2,
            mode: PartitionMode::CyclicVertical { cycle_size: 4 },
            regions: vec![Region::new(4, 0, 4, 9), Region::new(16, 0, 2, 9)],
        });
        assert_eq!(Message::decode(&message.encode()), Ok(message));
    }

    #[test_log::test]
    fn pixel_payload_layout_is_tag_length_then_channels() {
        let bytes = Message::Pixels(vec![1.0, -0.5]).encode();
        assert_eq!(bytes[0], TAG_PIXELS);
        assert_eq!(&bytes[1..9], &2u64.to_le_bytes());
        assert_eq!(&bytes[9..13], &1.0f32.to_le_bytes());
        assert_eq!(bytes.len(), 17);
    }

    #[test_log::test]
    fn truncated_assignment_is_rejected() {
        let mut bytes = Message::Assign(Assignment {
            rank: 1,
            mode: PartitionMode::Blocks,
            regions: vec![Region::new(0, 0, 2, 2)],
        })
        .encode();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            Message::decode(&bytes),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test_log::test]
    fn oversized_pixel_count_is_rejected_before_allocating() {
        let mut bytes = vec![TAG_PIXELS];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(Message::decode(&bytes).is_err());
    }

    #[test_log::test]
    fn unknown_tag_and_trailing_bytes_are_rejected() {
        assert_eq!(Message::decode(&[0x7f]), Err(WireError::UnknownTag(0x7f)));
        assert_eq!(Message::decode(&[TAG_EXIT, 0]), Err(WireError::TrailingBytes(1)));
        assert!(matches!(
            Message::decode(&[]),
            Err(WireError::Truncated { field: "tag", .. })
        ));
    }

    #[test_log::test]
    fn unknown_mode_code_is_rejected() {
        let mut bytes = vec![TAG_ASSIGN];
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.push(42);
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert!(matches!(Message::decode(&bytes), Err(WireError::Mode(_))));
    }
}
