//! The wire-level frame layout shared by the codecs and the transport engine.

// Packet, as emitted on the wire:
// ```text
// | start | payload_size | overhead | encoded payload | delimiter |  crc   |
// |  1B   |      1B      |    1B    |    1 - 254B     |    1B     | 1/2/4B |
// |    <- preamble ->    |        <- checksummed span ->          |
// ```
// The staging buffers reproduce this layout exactly, so payload staging,
// COBS encoding, checksumming and transmission all happen in one
// allocation. The payload size byte doubles as the staged-payload tracker
// and the overhead byte doubles as the encoded/decoded state flag.

/// Position of the start byte. Written once at construction, never changed.
pub(crate) const START_BYTE_INDEX: usize = 0;

/// Position of the payload size byte / staged-payload tracker.
pub(crate) const PAYLOAD_SIZE_INDEX: usize = 1;

/// Position of the COBS overhead byte. Zero means "not encoded".
/// This index doubles as the preamble size.
pub(crate) const OVERHEAD_BYTE_INDEX: usize = 2;

/// First payload byte, immediately after the overhead byte.
pub(crate) const PAYLOAD_START_INDEX: usize = OVERHEAD_BYTE_INDEX + 1;

/// Empty payloads cannot be framed.
pub(crate) const MIN_PAYLOAD_SIZE: usize = 1;

/// COBS caps the payload at 254 bytes so every jump distance fits a byte.
pub(crate) const MAX_PAYLOAD_SIZE: usize = 254;

/// Overhead byte, one payload byte and the delimiter.
pub(crate) const MIN_PACKET_SIZE: usize = 3;

/// A full 254-byte payload plus the overhead and delimiter bytes.
pub(crate) const MAX_PACKET_SIZE: usize = 256;
