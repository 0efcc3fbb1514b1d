//! The staging buffers and their typed payload views.
//!
//! Each transport engine owns two staging buffers, one per direction,
//! allocated once at construction and reused for every frame. Callers
//! never see the buffer itself; they move values in and out through the
//! [`Pod`]-typed read and write views, which translate payload-relative
//! offsets into buffer positions and keep the payload size tracker
//! honest.

use bytemuck::Pod;

use crate::{
    error::FrameError,
    specification::{
        OVERHEAD_BYTE_INDEX, PAYLOAD_SIZE_INDEX, PAYLOAD_START_INDEX, START_BYTE_INDEX,
    },
};

/// A fixed-capacity frame staging area following the wire layout.
///
/// The payload size byte doubles as a high-water tracker: writes only ever
/// raise it, so interleaved writes and overwrites keep the full staged
/// span, and only [`reset`](StagingBuffer::reset) brings it back to zero.
#[derive(Clone, Debug)]
pub(crate) struct StagingBuffer {
    bytes: Vec<u8>,
    max_payload_size: u8,
}

impl StagingBuffer {
    /// Allocates a zeroed buffer sized for `max_payload_size` plus the
    /// preamble, COBS bytes and `postamble_size` checksum bytes, and
    /// stamps the start byte.
    pub(crate) fn new(start_byte: u8, max_payload_size: u8, postamble_size: usize) -> Self {
        let capacity = max_payload_size as usize + OVERHEAD_BYTE_INDEX + 2 + postamble_size;
        let mut bytes = vec![0u8; capacity];
        bytes[START_BYTE_INDEX] = start_byte;
        Self {
            bytes,
            max_payload_size,
        }
    }

    /// Zeroes the payload size tracker and the overhead byte, readying the
    /// buffer for a fresh payload. Stale payload bytes are left in place;
    /// the tracker is what makes them unreachable.
    pub(crate) fn reset(&mut self) {
        self.bytes[PAYLOAD_SIZE_INDEX] = 0;
        self.bytes[OVERHEAD_BYTE_INDEX] = 0;
    }

    pub(crate) fn payload_size(&self) -> u8 {
        self.bytes[PAYLOAD_SIZE_INDEX]
    }

    pub(crate) fn max_payload_size(&self) -> u8 {
        self.max_payload_size
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Copies `object` into the payload region at payload-relative
    /// `start`, returning the next free payload offset.
    ///
    /// The write is bounded by the region capacity; on success the payload
    /// size tracker is raised to cover the written span.
    pub(crate) fn write_object<T: Pod>(
        &mut self,
        object: &T,
        start: usize,
    ) -> Result<usize, FrameError> {
        let source = bytemuck::bytes_of(object);
        let required = start + source.len();
        if required > self.max_payload_size as usize {
            return Err(FrameError::WriteOutOfRange);
        }

        let offset = start + PAYLOAD_START_INDEX;
        self.bytes[offset..offset + source.len()].copy_from_slice(source);
        self.bytes[PAYLOAD_SIZE_INDEX] = self.bytes[PAYLOAD_SIZE_INDEX].max(required as u8);
        Ok(required)
    }

    /// Copies bytes from the payload region at payload-relative `start`
    /// into `object`, returning the offset past the bytes read.
    ///
    /// The read is bounded by the received payload length, not the region
    /// capacity, so leftovers from earlier frames can never leak into a
    /// caller's values.
    pub(crate) fn read_object<T: Pod>(
        &self,
        object: &mut T,
        start: usize,
    ) -> Result<usize, FrameError> {
        let destination = bytemuck::bytes_of_mut(object);
        let required = start + destination.len();
        if required > self.bytes[PAYLOAD_SIZE_INDEX] as usize {
            return Err(FrameError::ReadOutOfRange);
        }

        let offset = start + PAYLOAD_START_INDEX;
        destination.copy_from_slice(&self.bytes[offset..offset + destination.len()]);
        Ok(required)
    }
}

#[cfg(test)]
mod test {
    use bytemuck::{Pod, Zeroable};

    use super::*;

    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Telemetry {
        flags: u8,
        channel: u8,
        ticks: u16,
        samples: u32,
    }

    fn buffer() -> StagingBuffer {
        StagingBuffer::new(129, 254, 2)
    }

    #[test]
    fn capacity_accounts_for_metadata_and_postamble() {
        let staging = buffer();
        assert_eq!(staging.len(), 254 + 2 + 2 + 2);
        assert_eq!(staging.as_slice()[START_BYTE_INDEX], 129);
    }

    #[test]
    fn chained_writes_and_reads_roundtrip() {
        let mut staging = buffer();
        let telemetry = Telemetry {
            flags: 0b1010_0001,
            channel: 3,
            ticks: 44321,
            samples: 1_234_567_890,
        };

        let next = staging.write_object(&0xBEEFu16, 0).unwrap();
        let next = staging.write_object(&[1u8, 2, 3, 4, 5], next).unwrap();
        let written = staging.write_object(&telemetry, next).unwrap();
        assert_eq!(staging.payload_size() as usize, written);

        let mut value = 0u16;
        let mut array = [0u8; 5];
        let mut decoded = Telemetry::default();
        let next = staging.read_object(&mut value, 0).unwrap();
        let next = staging.read_object(&mut array, next).unwrap();
        staging.read_object(&mut decoded, next).unwrap();

        assert_eq!(value, 0xBEEF);
        assert_eq!(array, [1, 2, 3, 4, 5]);
        assert_eq!(decoded, telemetry);
    }

    #[test]
    fn tracker_is_a_high_water_mark() {
        let mut staging = buffer();

        staging.write_object(&[0u8; 50], 0).unwrap();
        assert_eq!(staging.payload_size(), 50);

        // Overwriting already-counted bytes keeps the staged span.
        staging.write_object(&[1u8; 20], 0).unwrap();
        assert_eq!(staging.payload_size(), 50);

        // Writing past the current mark extends it to the write's end,
        // including any untouched gap before it.
        staging.write_object(&[2u8; 10], 60).unwrap();
        assert_eq!(staging.payload_size(), 70);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut staging = buffer();
        staging.write_object(&[9u8; 16], 0).unwrap();
        staging.as_mut_slice()[OVERHEAD_BYTE_INDEX] = 7;

        staging.reset();
        let snapshot = staging.as_slice().to_vec();
        staging.reset();

        assert_eq!(staging.as_slice(), snapshot.as_slice());
        assert_eq!(staging.payload_size(), 0);
        assert_eq!(staging.as_slice()[OVERHEAD_BYTE_INDEX], 0);
    }

    #[test]
    fn write_past_capacity_is_rejected() {
        let mut staging = StagingBuffer::new(129, 32, 2);
        assert_eq!(
            staging.write_object(&[0u8; 33], 0),
            Err(FrameError::WriteOutOfRange)
        );
        assert_eq!(
            staging.write_object(&0u32, 29),
            Err(FrameError::WriteOutOfRange)
        );
        // The failed writes must not have moved the tracker.
        assert_eq!(staging.payload_size(), 0);
    }

    #[test]
    fn read_is_bounded_by_received_length_not_capacity() {
        let mut staging = buffer();
        staging.write_object(&[7u8; 8], 0).unwrap();

        let mut word = 0u32;
        assert_eq!(staging.read_object(&mut word, 4).unwrap(), 8);
        assert_eq!(
            staging.read_object(&mut word, 5),
            Err(FrameError::ReadOutOfRange)
        );

        // After a reset the stale bytes are unreachable even though they
        // are physically still in the buffer.
        staging.reset();
        assert_eq!(
            staging.read_object(&mut word, 0),
            Err(FrameError::ReadOutOfRange)
        );
    }
}
