//! Opens a binlog file, validates its magic header, and yields raw event
//! frames (header + body bytes) -- spec.md section 4.1.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::errors::FrameError;
use crate::packet_helpers::crc32;

const MAGIC: [u8; 4] = [0xfe, b'b', b'i', b'n'];
const COMMON_HEADER_LEN: usize = 19;

/// The 19-byte common header shared by every binlog event (spec.md section 3).
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub timestamp: u32,
    pub type_code: u8,
    pub server_id: u32,
    pub event_size: u32,
    pub log_pos: u32,
    pub flags: u16,
}

/// Raw bytes of one event: the common header plus its body, with any
/// trailing CRC32 checksum already stripped and verified.
#[derive(Debug)]
pub struct EventFrame {
    pub header: FrameHeader,
    pub body: Vec<u8>,
    /// Byte offset of this frame's header within the file.
    pub offset: u64,
}

impl EventFrame {
    pub fn next_offset(&self) -> u64 {
        u64::from(self.header.event_size) + self.offset_base()
    }

    fn offset_base(&self) -> u64 {
        self.offset
    }
}

/// Sequential, non-seeking-except-to-advance reader over one binlog file's
/// event frames.
pub struct FrameReader {
    file_name: Option<PathBuf>,
    file: File,
    pos: u64,
    checksummed: bool,
}

impl FrameReader {
    /// Open `path`, validate the magic header, and leave the cursor
    /// positioned right after it (offset 4).
    pub fn open<P: AsRef<Path>>(path: P, checksummed: bool) -> Result<Self, FrameError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(FrameError::OpenError)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(FrameError::Io)?;
        if magic != MAGIC {
            return Err(FrameError::BadMagic(magic));
        }
        Ok(FrameReader {
            file_name: Some(path.to_owned()),
            file,
            pos: 4,
            checksummed,
        })
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    pub fn checksummed(&self) -> bool {
        self.checksummed
    }

    pub fn set_checksummed(&mut self, checksummed: bool) {
        self.checksummed = checksummed;
    }

    /// Read the next frame. Returns `Ok(None)` at a clean end of file --
    /// including a truncated trailing frame, which legitimately happens
    /// against an actively-written binlog (spec.md section 4.1/7).
    pub fn next_frame(&mut self) -> Result<Option<EventFrame>, FrameError> {
        let offset = self.pos;
        let mut header_buf = [0u8; COMMON_HEADER_LEN];
        match self.file.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let mut c = &header_buf[..];
        let timestamp = c.read_u32::<LittleEndian>()?;
        let type_code = c.read_u8()?;
        let server_id = c.read_u32::<LittleEndian>()?;
        let event_size = c.read_u32::<LittleEndian>()?;
        let log_pos = c.read_u32::<LittleEndian>()?;
        let flags = c.read_u16::<LittleEndian>()?;

        if event_size < COMMON_HEADER_LEN as u32 {
            return Err(FrameError::EventSizeTooSmall(event_size));
        }
        let body_len = (event_size as usize) - COMMON_HEADER_LEN;
        let mut body = vec![0u8; body_len];
        match self.file.read_exact(&mut body) {
            Ok(()) => {}
            // a partial body at EOF is a truncated trailing frame, not an error
            Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        self.pos += u64::from(event_size);

        if self.checksummed {
            if body.len() < 4 {
                return Ok(None);
            }
            let checksum_offset = body.len() - 4;
            let expected = (&body[checksum_offset..]).read_u32::<LittleEndian>()?;
            let actual = crc32(&body[..checksum_offset]);
            if actual != expected {
                log::warn!(
                    "CRC32 mismatch decoding event at offset {} (expected {:08x}, got {:08x})",
                    offset,
                    expected,
                    actual
                );
            }
            body.truncate(checksum_offset);
        }

        Ok(Some(EventFrame {
            header: FrameHeader {
                timestamp,
                type_code,
                server_id,
                event_size,
                log_pos,
                flags,
            },
            body,
            offset,
        }))
    }

    pub fn close(self) {
        drop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_frame(buf: &mut Vec<u8>, type_code: u8, body: &[u8], checksummed: bool) {
        let mut full_body = body.to_vec();
        if checksummed {
            let crc = crc32(&full_body);
            full_body.extend_from_slice(&crc.to_le_bytes());
        }
        let event_size = (COMMON_HEADER_LEN + full_body.len()) as u32;
        buf.extend_from_slice(&0u32.to_le_bytes()); // timestamp
        buf.push(type_code);
        buf.extend_from_slice(&1u32.to_le_bytes()); // server_id
        buf.extend_from_slice(&event_size.to_le_bytes());
        buf.extend_from_slice(&(buf.len() as u32 + event_size).to_le_bytes()); // log_pos (approx)
        buf.extend_from_slice(&0u16.to_le_bytes()); // flags
        buf.extend_from_slice(&full_body);
    }

    fn write_test_file(path: &std::path::Path, checksummed: bool) {
        let mut f = File::create(path).unwrap();
        let mut buf = vec![0xfe, b'b', b'i', b'n'];
        write_frame(&mut buf, 2, b"hello", checksummed);
        f.write_all(&buf).unwrap();
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = std::env::temp_dir();
        let path = dir.join("mysql_binlog_reader_test_bad_magic.bin");
        std::fs::write(&path, [0xde, 0xad, 0xbe, 0xef]).unwrap();
        let result = FrameReader::open(&path, false);
        assert!(matches!(result, Err(FrameError::BadMagic(_))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_but_valid_file_yields_no_frames() {
        let dir = std::env::temp_dir();
        let path = dir.join("mysql_binlog_reader_test_empty.bin");
        std::fs::write(&path, [0xfe, b'b', b'i', b'n']).unwrap();
        let mut reader = FrameReader::open(&path, false).unwrap();
        assert!(reader.next_frame().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reads_one_frame_without_checksum() {
        let dir = std::env::temp_dir();
        let path = dir.join("mysql_binlog_reader_test_one_frame.bin");
        write_test_file(&path, false);
        let mut reader = FrameReader::open(&path, false).unwrap();
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.header.type_code, 2);
        assert_eq!(frame.body, b"hello");
        assert!(reader.next_frame().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn strips_trailing_checksum() {
        let dir = std::env::temp_dir();
        let path = dir.join("mysql_binlog_reader_test_checksum.bin");
        write_test_file(&path, true);
        let mut reader = FrameReader::open(&path, true).unwrap();
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.body, b"hello");
        std::fs::remove_file(&path).ok();
    }
}
