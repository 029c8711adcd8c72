//! Length-prefixed message framing.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;

use crate::RelayResult;

/// Write one message: 4-byte big-endian length prefix, then the payload.
pub fn write_message<W: Write>(writer: &mut W, payload: &[u8]) -> RelayResult<()> {
    let len = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one message. Returns `Ok(None)` when the peer has closed: either a
/// clean EOF before the header, a short read, or a zero-length header.
pub fn read_message<R: Read>(reader: &mut R) -> RelayResult<Option<Bytes>> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload) {
        Ok(()) => Ok(Some(Bytes::from(payload))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_round_trip() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"hello").unwrap();
        write_message(&mut buf, b"frames").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_message(&mut cursor).unwrap().unwrap().as_ref(), b"hello");
        assert_eq!(
            read_message(&mut cursor).unwrap().unwrap().as_ref(),
            b"frames"
        );
        assert!(read_message(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_header_encoding_is_big_endian() {
        let mut buf = Vec::new();
        write_message(&mut buf, &[0xAB; 3]).unwrap();
        assert_eq!(&buf[..4], &[0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_zero_length_header_means_closed() {
        let mut cursor = Cursor::new(vec![0u8; 4]);
        assert!(read_message(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_short_payload_means_closed() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"hello").unwrap();
        buf.truncate(buf.len() - 2);

        let mut cursor = Cursor::new(buf);
        assert!(read_message(&mut cursor).unwrap().is_none());
    }
}
