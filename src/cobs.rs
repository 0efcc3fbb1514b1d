//! In-place COBS encoding and decoding over a staging-layout buffer.
//!
//! Consistent Overhead Byte Stuffing eliminates a chosen byte value from a
//! payload by rewriting each occurrence as the distance to the next one,
//! anchored by an overhead byte in front of the payload and terminated by
//! one unencoded delimiter. For payloads of at most 254 bytes the cost is
//! exactly one overhead byte, and the delimiter is guaranteed to appear
//! exactly once, at the end of the packet.
//!
//! Both operations work in place on a buffer that follows the layout in
//! [`specification`](crate::specification): payload size at index 1,
//! overhead byte at index 2, payload from index 3. The decoder doubles as
//! a corruption check behind the CRC: a packet whose jump chain does not
//! land exactly on the trailing delimiter is rejected even when its
//! checksum happens to match.

use crate::{
    error::CobsError,
    specification::{
        MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, MIN_PACKET_SIZE, MIN_PAYLOAD_SIZE, OVERHEAD_BYTE_INDEX,
        PAYLOAD_SIZE_INDEX, PAYLOAD_START_INDEX,
    },
};

/// Encodes the staged payload in place, returning the packet size
/// (overhead byte + encoded payload + delimiter).
///
/// Runs a single reverse pass over the payload region: the delimiter
/// appended after the payload is the initial anchor, every payload byte
/// equal to `delimiter` is overwritten with the distance to the previous
/// anchor, and the overhead byte finally receives the distance to the
/// first one. The reverse direction produces each jump value in one write.
///
/// The overhead byte must be zero on entry; a nonzero value means the
/// buffer already holds an encoded packet and the call is refused.
pub(crate) fn encode_payload(buffer: &mut [u8], delimiter: u8) -> Result<usize, CobsError> {
    if buffer.len() <= OVERHEAD_BYTE_INDEX {
        return Err(CobsError::EncodedPacketExceedsBuffer);
    }

    let payload_size = buffer[PAYLOAD_SIZE_INDEX] as usize;
    let required_len = payload_size + OVERHEAD_BYTE_INDEX + 2;

    if payload_size < MIN_PAYLOAD_SIZE {
        return Err(CobsError::PayloadTooSmall);
    }
    if payload_size > MAX_PAYLOAD_SIZE {
        return Err(CobsError::PayloadTooLarge);
    }
    if buffer.len() < required_len {
        return Err(CobsError::EncodedPacketExceedsBuffer);
    }
    if buffer[OVERHEAD_BYTE_INDEX] != 0 {
        return Err(CobsError::PayloadAlreadyEncoded);
    }

    // Inclusive index of the last payload byte; the delimiter goes right
    // after it.
    let payload_end = payload_size + OVERHEAD_BYTE_INDEX;
    let delimiter_index = payload_end + 1;
    buffer[delimiter_index] = delimiter;

    let mut last_delimiter = 0usize;
    for i in (PAYLOAD_START_INDEX..=payload_end).rev() {
        if buffer[i] == delimiter {
            let anchor = if last_delimiter == 0 {
                delimiter_index
            } else {
                last_delimiter
            };
            buffer[i] = (anchor - i) as u8;
            last_delimiter = i;
        }
    }

    // The overhead byte points at the first encoded jump, or straight at
    // the appended delimiter when the payload contained none.
    buffer[OVERHEAD_BYTE_INDEX] = if last_delimiter != 0 {
        (last_delimiter - OVERHEAD_BYTE_INDEX) as u8
    } else {
        (delimiter_index - OVERHEAD_BYTE_INDEX) as u8
    };

    Ok(payload_size + 2)
}

/// Decodes the packet in place, returning the restored payload size.
///
/// Walks the jump chain starting at the overhead byte, writing
/// `delimiter` back into every traversed position, until the cursor lands
/// on the unencoded delimiter that terminates the packet. A delimiter
/// encountered before the terminal index means the packet was corrupted
/// in transit; a chain that exhausts the packet without meeting the
/// delimiter means the same. The order of those two checks is load-bearing
/// for the reported code and must not change.
///
/// The overhead byte is cleared before traversal, so a failed decode still
/// marks the buffer as consumed and a repeated call reports
/// [`CobsError::PacketAlreadyDecoded`] rather than corrupting data.
pub(crate) fn decode_payload(buffer: &mut [u8], delimiter: u8) -> Result<usize, CobsError> {
    if buffer.len() <= OVERHEAD_BYTE_INDEX {
        return Err(CobsError::DecodedPacketExceedsBuffer);
    }

    let payload_size = buffer[PAYLOAD_SIZE_INDEX] as usize;
    let packet_size = payload_size + 2;
    let required_len = payload_size + OVERHEAD_BYTE_INDEX + 2;
    let delimiter_index = packet_size + 1;

    if packet_size < MIN_PACKET_SIZE {
        return Err(CobsError::PacketTooSmall);
    }
    if packet_size > MAX_PACKET_SIZE {
        return Err(CobsError::PacketTooLarge);
    }
    if buffer.len() < required_len {
        return Err(CobsError::DecodedPacketExceedsBuffer);
    }
    if buffer[OVERHEAD_BYTE_INDEX] == 0 {
        return Err(CobsError::PacketAlreadyDecoded);
    }

    let mut read_index = OVERHEAD_BYTE_INDEX;
    let mut jump = buffer[read_index] as usize;

    // Cleared up front so the already-decoded guard fires on a second
    // attempt even when the traversal below fails. The overhead byte is
    // read before the loop, which also lets an overhead value equal to a
    // nonzero delimiter pass through undisturbed.
    buffer[read_index] = 0;
    read_index += jump;

    while read_index < required_len {
        if buffer[read_index] == delimiter {
            if read_index == delimiter_index {
                return Ok(payload_size);
            }
            return Err(CobsError::DelimiterFoundTooEarly);
        }
        jump = buffer[read_index] as usize;
        buffer[read_index] = delimiter;
        read_index += jump;
    }

    Err(CobsError::DelimiterNotFound)
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    /// Builds a staging buffer around the given payload, with room for a
    /// 16-bit postamble like the transport engine reserves.
    fn staged(payload: &[u8]) -> Vec<u8> {
        let mut buffer = vec![0u8; payload.len() + OVERHEAD_BYTE_INDEX + 2 + 2];
        buffer[PAYLOAD_SIZE_INDEX] = payload.len() as u8;
        buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + payload.len()].copy_from_slice(payload);
        buffer
    }

    #[test]
    fn encode_known_vector() {
        let mut buffer = staged(&[1, 0, 3, 0, 0, 0, 7, 0, 9, 10]);
        let packet_size = encode_payload(&mut buffer, 0).unwrap();

        assert_eq!(packet_size, 12);
        assert_eq!(buffer[OVERHEAD_BYTE_INDEX], 2);
        assert_eq!(
            &buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + 10],
            &[1, 2, 3, 1, 1, 2, 7, 3, 9, 10]
        );
        assert_eq!(buffer[PAYLOAD_START_INDEX + 10], 0);
    }

    #[test]
    fn decode_known_vector() {
        let mut buffer = staged(&[1, 2, 3, 1, 1, 2, 7, 3, 9, 10]);
        buffer[OVERHEAD_BYTE_INDEX] = 2;
        buffer[PAYLOAD_START_INDEX + 10] = 0;

        let payload_size = decode_payload(&mut buffer, 0).unwrap();

        assert_eq!(payload_size, 10);
        assert_eq!(buffer[OVERHEAD_BYTE_INDEX], 0);
        assert_eq!(
            &buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + 10],
            &[1, 0, 3, 0, 0, 0, 7, 0, 9, 10]
        );
    }

    #[test]
    fn roundtrip_all_payload_sizes() {
        let mut rng = StdRng::from_seed([7u8; 32]);
        for size in 1..=MAX_PAYLOAD_SIZE {
            let payload: Vec<u8> = (0..size)
                .map(|_| {
                    // Bias toward zeros so every size exercises encoded jumps.
                    if rng.random_range(0..4) == 0 {
                        0
                    } else {
                        rng.random()
                    }
                })
                .collect();

            let mut buffer = staged(&payload);
            let packet_size = encode_payload(&mut buffer, 0).unwrap();
            assert_eq!(packet_size, size + 2);

            // The encoded span must be free of the delimiter, except for
            // the terminator itself.
            assert!(buffer[OVERHEAD_BYTE_INDEX..PAYLOAD_START_INDEX + size]
                .iter()
                .all(|&byte| byte != 0));
            assert_eq!(buffer[PAYLOAD_START_INDEX + size], 0);

            let decoded_size = decode_payload(&mut buffer, 0).unwrap();
            assert_eq!(decoded_size, size);
            assert_eq!(
                &buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + size],
                payload.as_slice()
            );
        }
    }

    #[test]
    fn roundtrip_nonzero_delimiter() {
        let mut rng = StdRng::from_seed([21u8; 32]);
        for _ in 0..512 {
            let size = rng.random_range(1..=MAX_PAYLOAD_SIZE);
            let payload: Vec<u8> = (0..size).map(|_| rng.random()).collect();

            let mut buffer = staged(&payload);
            encode_payload(&mut buffer, 0xAA).unwrap();
            assert!(buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + size]
                .iter()
                .all(|&byte| byte != 0xAA));

            let decoded_size = decode_payload(&mut buffer, 0xAA).unwrap();
            assert_eq!(decoded_size, size);
            assert_eq!(
                &buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + size],
                payload.as_slice()
            );
        }
    }

    #[test]
    fn decoder_tolerates_overhead_equal_to_delimiter() {
        // With delimiter 5 the first jump distance below works out to 5 as
        // well; the decoder must read it as a distance, not a terminator.
        let payload = [1, 2, 3, 4, 5, 6, 7];
        let mut buffer = staged(&payload);
        encode_payload(&mut buffer, 5).unwrap();
        assert_eq!(buffer[OVERHEAD_BYTE_INDEX], 5);

        let decoded_size = decode_payload(&mut buffer, 5).unwrap();
        assert_eq!(decoded_size, payload.len());
        assert_eq!(
            &buffer[PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + payload.len()],
            &payload
        );
    }

    #[test]
    fn encode_rejects_empty_payload() {
        let mut buffer = vec![0u8; 16];
        assert_eq!(
            encode_payload(&mut buffer, 0),
            Err(CobsError::PayloadTooSmall)
        );
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut buffer = vec![0u8; 300];
        buffer[PAYLOAD_SIZE_INDEX] = 255;
        assert_eq!(
            encode_payload(&mut buffer, 0),
            Err(CobsError::PayloadTooLarge)
        );
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let mut buffer = vec![0u8; 10];
        buffer[PAYLOAD_SIZE_INDEX] = 10;
        assert_eq!(
            encode_payload(&mut buffer, 0),
            Err(CobsError::EncodedPacketExceedsBuffer)
        );
    }

    #[test]
    fn encode_refuses_double_encode() {
        let mut buffer = staged(&[1, 0, 2]);
        encode_payload(&mut buffer, 0).unwrap();
        assert_eq!(
            encode_payload(&mut buffer, 0),
            Err(CobsError::PayloadAlreadyEncoded)
        );
    }

    #[test]
    fn decode_refuses_double_decode() {
        let mut buffer = staged(&[1, 0, 2]);
        encode_payload(&mut buffer, 0).unwrap();
        decode_payload(&mut buffer, 0).unwrap();
        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::PacketAlreadyDecoded)
        );
    }

    #[test]
    fn failed_decode_still_marks_buffer_decoded() {
        let mut buffer = staged(&[5, 0, 7]);
        encode_payload(&mut buffer, 0).unwrap();
        buffer[PAYLOAD_START_INDEX + 1] = 0; // corrupt an encoded jump

        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::DelimiterFoundTooEarly)
        );
        // A second attempt reports the decoded state, not another
        // delimiter error.
        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::PacketAlreadyDecoded)
        );
    }

    #[test]
    fn decode_reports_missing_delimiter() {
        let mut buffer = staged(&[5, 0, 7]);
        encode_payload(&mut buffer, 0).unwrap();
        let delimiter_index = PAYLOAD_START_INDEX + 3;
        buffer[delimiter_index] = 9; // overwrite the terminator

        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::DelimiterNotFound)
        );
    }

    #[test]
    fn decode_rejects_declared_sizes_out_of_range() {
        let mut buffer = vec![0u8; 300];
        buffer[PAYLOAD_SIZE_INDEX] = 0;
        buffer[OVERHEAD_BYTE_INDEX] = 1;
        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::PacketTooSmall)
        );

        buffer[PAYLOAD_SIZE_INDEX] = 255;
        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::PacketTooLarge)
        );
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let mut buffer = vec![0u8; 10];
        buffer[PAYLOAD_SIZE_INDEX] = 10;
        buffer[OVERHEAD_BYTE_INDEX] = 1;
        assert_eq!(
            decode_payload(&mut buffer, 0),
            Err(CobsError::DecodedPacketExceedsBuffer)
        );
    }
}
