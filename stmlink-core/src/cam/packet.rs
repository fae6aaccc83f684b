//! Datagram layout for streamed frames.
//!
//! ```text
//! counter:  u32 LE  (4)   wall-clock milliseconds, truncated to 32 bits
//! jpeg:     [u8]          baseline JPEG stream, rest of the datagram
//! ```
//!
//! One frame per datagram. The counter wraps roughly every 49.7 days and
//! is only meant for ordering / drop detection on the receiving side.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::LinkError;

/// Size of the counter prefix.
pub const HEADER_SIZE: usize = 4;

/// Largest JPEG sent in one datagram. Keeps packets well under the
/// 65 507-byte UDP payload limit.
pub const MAX_JPEG_SIZE: usize = 60_000;

/// Frame counter for `now`: milliseconds since the Unix epoch modulo 2^32.
pub fn frame_counter(now: SystemTime) -> u32 {
    let millis = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    (millis & 0xFFFF_FFFF) as u32
}

/// Build `[counter][jpeg]`.
pub fn encode(counter: u32, jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + jpeg.len());
    buf.put_u32_le(counter);
    buf.put_slice(jpeg);
    buf.freeze()
}

/// A parsed datagram borrowing its JPEG bytes from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacket<'a> {
    pub counter: u32,
    pub jpeg: &'a [u8],
}

/// Split a datagram into counter and JPEG payload.
pub fn decode(datagram: &[u8]) -> Result<FramePacket<'_>, LinkError> {
    if datagram.len() < HEADER_SIZE {
        return Err(LinkError::InvalidPacket("shorter than counter prefix"));
    }
    let (head, jpeg) = datagram.split_at(HEADER_SIZE);
    if jpeg.is_empty() {
        return Err(LinkError::InvalidPacket("no image data"));
    }

    let mut counter = [0u8; HEADER_SIZE];
    counter.copy_from_slice(head);
    Ok(FramePacket {
        counter: u32::from_le_bytes(counter),
        jpeg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counter_truncates_to_32_bits() {
        let t = UNIX_EPOCH + Duration::from_millis((1u64 << 32) + 1234);
        assert_eq!(frame_counter(t), 1234);

        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(frame_counter(t), (1_700_000_000_123u64 % (1u64 << 32)) as u32);
    }

    #[test]
    fn counter_is_little_endian_prefix() {
        let pkt = encode(0x0403_0201, &[0xFF, 0xD8, 0xFF]);
        assert_eq!(&pkt[..], &[0x01, 0x02, 0x03, 0x04, 0xFF, 0xD8, 0xFF]);

        let parsed = decode(&pkt).unwrap();
        assert_eq!(parsed.counter, 0x0403_0201);
        assert_eq!(parsed.jpeg, &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn short_datagrams_are_rejected() {
        assert!(matches!(decode(&[1, 2]), Err(LinkError::InvalidPacket(_))));
        assert!(matches!(decode(&[1, 2, 3, 4]), Err(LinkError::InvalidPacket(_))));
    }
}
