//! Snapshot encoder and decoder.
//!
//! Encoding and decoding are mirrored matches over [`DeltaMode`]; every branch the decoder
//! takes is selected by a flag the encoder wrote.

mod ack;
mod index;
mod mode;
mod object;

pub use ack::AckPacket;
pub use mode::{Baseline, DeltaMode, PacketHeader};
pub use object::FieldCoder;

use glam::IVec3;

use crate::bitstream::{BitCounter, BitReader, BitWrite, BitWriter, StreamError, bits_required};
use crate::config::SyncConfig;
use crate::quantize::Quantizer;
use crate::state::{QuantizedRigidBodyState, QuantizedSnapshot, RigidBodyState};
use index::{read_relative_index, write_relative_index};

/// Interacting flag plus thirteen raw floats.
pub const UNCOMPRESSED_OBJECT_BITS: usize = 1 + 13 * 32;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("baseline {0:?} is not available")]
    MissingBaseline(Baseline),
    #[error("object index {index} out of range for {num_objects} objects")]
    IndexOutOfRange { index: usize, num_objects: usize },
    #[error("non-finite float in uncompressed state")]
    InvalidFloat,
    #[error("relative position {0} leaves the world bounds")]
    PositionOutOfBounds(IVec3),
    #[error("unknown delta mode tag {0}")]
    UnknownMode(u8),
    #[error("frame does not match {mode} packet")]
    FrameMismatch { mode: DeltaMode },
    #[error("snapshot holds {actual} objects, expected {expected}")]
    SnapshotLength { expected: usize, actual: usize },
    #[error("object index {index} does not follow {previous}")]
    UnorderedIndex { index: usize, previous: usize },
}

/// Packet body: sparse `(index, state)` updates. Delta updates are in ascending index order
/// and every object they leave out keeps its baseline value.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotFrame {
    Uncompressed(Vec<(usize, RigidBodyState)>),
    Absolute(Vec<(usize, QuantizedRigidBodyState)>),
    Delta(Vec<(usize, QuantizedRigidBodyState)>),
}

/// Objects of `current` that differ from `base`, as delta updates.
pub fn delta_updates(
    current: &QuantizedSnapshot,
    base: &QuantizedSnapshot,
) -> Vec<(usize, QuantizedRigidBodyState)> {
    current
        .objects
        .iter()
        .zip(&base.objects)
        .enumerate()
        .filter(|(_, (state, base))| state != base)
        .map(|(index, (state, _))| (index, *state))
        .collect()
}

/// The snapshot a delta frame reconstructs on top of `base`.
pub fn apply_updates(
    base: &QuantizedSnapshot,
    updates: &[(usize, QuantizedRigidBodyState)],
) -> QuantizedSnapshot {
    let mut snapshot = base.clone();
    for &(index, state) in updates {
        if let Some(slot) = snapshot.objects.get_mut(index) {
            *slot = state;
        }
    }
    snapshot
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPacket {
    pub header: PacketHeader,
    pub frame: SnapshotFrame,
}

#[derive(Debug, Clone)]
pub struct SnapshotCodec {
    quantizer: Quantizer,
    fields: FieldCoder,
    num_objects: usize,
    index_threshold_bits: Option<usize>,
}

impl SnapshotCodec {
    pub fn new(config: &SyncConfig) -> Self {
        let quantizer = Quantizer::new(&config.quantization);
        let fields = FieldCoder::new(&quantizer, &config.codec);
        Self {
            quantizer,
            fields,
            num_objects: config.protocol.num_objects,
            index_threshold_bits: config.codec.index_threshold_bits,
        }
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    fn max_index(&self) -> i32 {
        self.num_objects as i32 - 1
    }

    fn check_length(&self, snapshot: &QuantizedSnapshot) -> Result<(), CodecError> {
        if snapshot.len() != self.num_objects {
            return Err(CodecError::SnapshotLength {
                expected: self.num_objects,
                actual: snapshot.len(),
            });
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), CodecError> {
        if index >= self.num_objects {
            return Err(CodecError::IndexOutOfRange {
                index,
                num_objects: self.num_objects,
            });
        }
        Ok(())
    }

    pub fn header_bits(header: &PacketHeader) -> usize {
        let mut counter = BitCounter::new();
        header.write(&mut counter);
        counter.bits_written()
    }

    /// Upper bound on the bits a `mode` body spends on framing rather than objects.
    pub fn framing_bits(&self, mode: DeltaMode) -> usize {
        match mode {
            DeltaMode::Uncompressed | DeltaMode::QuantizedAbsolute => {
                bits_required(0, self.num_objects as i32) as usize
            }
            DeltaMode::NotChanged => self.num_objects,
            // an index list is only chosen when it beats the flags
            _ => 1 + self.num_objects,
        }
    }

    /// Bits one object adds to a `mode` packet when it is sent, framing excluded.
    pub fn object_bits(
        &self,
        mode: DeltaMode,
        state: &QuantizedRigidBodyState,
        base: &QuantizedRigidBodyState,
    ) -> usize {
        let index_bits = bits_required(0, self.max_index()) as usize;
        match mode {
            DeltaMode::Uncompressed => index_bits + UNCOMPRESSED_OBJECT_BITS,
            DeltaMode::QuantizedAbsolute => {
                let mut counter = BitCounter::new();
                self.fields.write_state(&mut counter, state);
                index_bits + counter.bits_written()
            }
            _ => {
                let mut counter = BitCounter::new();
                self.fields.write_changed(&mut counter, mode, state, base);
                counter.bits_written()
            }
        }
    }

    pub fn encode(
        &self,
        header: &PacketHeader,
        frame: &SnapshotFrame,
        base: Option<&QuantizedSnapshot>,
    ) -> Result<Vec<u8>, CodecError> {
        let mut writer = BitWriter::with_capacity(256);
        self.write_packet(&mut writer, header, frame, base)?;
        Ok(writer.finish())
    }

    /// Exact encoded size in bits, without building the packet.
    pub fn measure(
        &self,
        header: &PacketHeader,
        frame: &SnapshotFrame,
        base: Option<&QuantizedSnapshot>,
    ) -> Result<usize, CodecError> {
        let mut counter = BitCounter::new();
        self.write_packet(&mut counter, header, frame, base)?;
        Ok(counter.bits_written())
    }

    pub fn write_packet<W: BitWrite>(
        &self,
        writer: &mut W,
        header: &PacketHeader,
        frame: &SnapshotFrame,
        base: Option<&QuantizedSnapshot>,
    ) -> Result<(), CodecError> {
        let mode = header.mode;
        if !mode.is_delta() && !header.is_initial() {
            return Err(CodecError::FrameMismatch { mode });
        }

        match (mode, frame, base) {
            (DeltaMode::Uncompressed, SnapshotFrame::Uncompressed(objects), _) => {
                self.check_updates(objects.iter().map(|(index, _)| *index), objects.len())?;
                if !objects.iter().all(|(_, state)| state.is_finite()) {
                    return Err(CodecError::InvalidFloat);
                }
                header.write(writer);
                writer.write_bounded(objects.len() as i32, 0, self.num_objects as i32);
                for (index, state) in objects {
                    writer.write_bounded(*index as i32, 0, self.max_index());
                    self.fields.write_uncompressed(writer, state);
                }
            }
            (DeltaMode::QuantizedAbsolute, SnapshotFrame::Absolute(objects), _) => {
                self.check_updates(objects.iter().map(|(index, _)| *index), objects.len())?;
                header.write(writer);
                writer.write_bounded(objects.len() as i32, 0, self.num_objects as i32);
                for (index, state) in objects {
                    writer.write_bounded(*index as i32, 0, self.max_index());
                    self.fields.write_state(writer, state);
                }
            }
            (
                DeltaMode::NotChanged
                | DeltaMode::ChangedIndex
                | DeltaMode::RelativeIndex
                | DeltaMode::RelativePosition
                | DeltaMode::RelativeOrientation,
                SnapshotFrame::Delta(updates),
                Some(base),
            ) => {
                self.check_updates(updates.iter().map(|(index, _)| *index), updates.len())?;
                check_ascending(updates.iter().map(|(index, _)| *index))?;
                self.check_length(base)?;
                header.write(writer);
                self.write_delta(writer, mode, updates, base);
            }
            _ => return Err(CodecError::FrameMismatch { mode }),
        }
        Ok(())
    }

    fn check_updates(
        &self,
        mut indices: impl Iterator<Item = usize>,
        count: usize,
    ) -> Result<(), CodecError> {
        if count > self.num_objects {
            return Err(CodecError::SnapshotLength {
                expected: self.num_objects,
                actual: count,
            });
        }
        indices.try_for_each(|index| self.check_index(index))
    }

    fn write_delta<W: BitWrite>(
        &self,
        writer: &mut W,
        mode: DeltaMode,
        updates: &[(usize, QuantizedRigidBodyState)],
        base: &QuantizedSnapshot,
    ) {
        if mode.has_index_choice() {
            let indices: Vec<usize> = updates.iter().map(|(index, _)| *index).collect();
            let use_indices = self.prefer_indices(mode, &indices);
            writer.write_bool(use_indices);
            if use_indices {
                writer.write_bounded(updates.len() as i32, 0, self.num_objects as i32);
                let mut previous = None;
                for (index, state) in updates {
                    self.write_index(writer, mode, previous, *index);
                    self.fields
                        .write_changed(writer, mode, state, &base.objects[*index]);
                    previous = Some(*index);
                }
                return;
            }
        }

        let mut updates = updates.iter().peekable();
        for (index, base) in base.objects.iter().enumerate() {
            match updates.next_if(|(next, _)| *next == index) {
                Some((_, state)) => {
                    writer.write_bool(true);
                    self.fields.write_changed(writer, mode, state, base);
                }
                None => writer.write_bool(false),
            }
        }
    }

    fn write_index<W: BitWrite>(
        &self,
        writer: &mut W,
        mode: DeltaMode,
        previous: Option<usize>,
        index: usize,
    ) {
        match previous {
            Some(previous) if mode.relative_indices() => {
                write_relative_index(writer, previous, index, self.num_objects)
            }
            _ => writer.write_bounded(index as i32, 0, self.max_index()),
        }
    }

    fn read_index(
        &self,
        reader: &mut BitReader<'_>,
        mode: DeltaMode,
        previous: Option<usize>,
    ) -> Result<usize, CodecError> {
        match previous {
            Some(previous) if mode.relative_indices() => {
                read_relative_index(reader, previous, self.num_objects)
            }
            _ => Ok(reader.read_bounded(0, self.max_index())? as usize),
        }
    }

    /// Cost of the update index list (count and indices, payload excluded).
    pub fn index_list_bits(&self, mode: DeltaMode, changed: &[usize]) -> usize {
        let mut counter = BitCounter::new();
        counter.write_bounded(changed.len() as i32, 0, self.num_objects as i32);
        let mut previous = None;
        for &index in changed {
            self.write_index(&mut counter, mode, previous, index);
            previous = Some(index);
        }
        counter.bits_written()
    }

    fn prefer_indices(&self, mode: DeltaMode, changed: &[usize]) -> bool {
        let bits = self.index_list_bits(mode, changed);
        bits < self.num_objects && self.index_threshold_bits.is_none_or(|limit| bits < limit)
    }

    /// Decodes one packet. `lookup` resolves the baseline of delta packets; a miss discards
    /// the packet.
    pub fn decode<'a>(
        &self,
        bytes: &[u8],
        lookup: impl FnOnce(Baseline) -> Option<&'a QuantizedSnapshot>,
    ) -> Result<SnapshotPacket, CodecError> {
        let mut reader = BitReader::new(bytes);
        let header = PacketHeader::read(&mut reader)?;
        let mode = header.mode;
        if !mode.is_delta() && !header.is_initial() {
            return Err(CodecError::FrameMismatch { mode });
        }

        let frame = match mode {
            DeltaMode::Uncompressed => {
                let count = reader.read_bounded(0, self.num_objects as i32)? as usize;
                let mut objects = Vec::with_capacity(count);
                for _ in 0..count {
                    let index = reader.read_bounded(0, self.max_index())? as usize;
                    objects.push((index, self.fields.read_uncompressed(&mut reader)?));
                }
                SnapshotFrame::Uncompressed(objects)
            }
            DeltaMode::QuantizedAbsolute => {
                let count = reader.read_bounded(0, self.num_objects as i32)? as usize;
                let mut objects = Vec::with_capacity(count);
                for _ in 0..count {
                    let index = reader.read_bounded(0, self.max_index())? as usize;
                    objects.push((index, self.fields.read_state(&mut reader)?));
                }
                SnapshotFrame::Absolute(objects)
            }
            DeltaMode::NotChanged
            | DeltaMode::ChangedIndex
            | DeltaMode::RelativeIndex
            | DeltaMode::RelativePosition
            | DeltaMode::RelativeOrientation => {
                let base = lookup(header.baseline).ok_or(CodecError::MissingBaseline(header.baseline))?;
                self.check_length(base)?;
                SnapshotFrame::Delta(self.read_delta(&mut reader, mode, base)?)
            }
        };

        Ok(SnapshotPacket { header, frame })
    }

    fn read_delta(
        &self,
        reader: &mut BitReader<'_>,
        mode: DeltaMode,
        base: &QuantizedSnapshot,
    ) -> Result<Vec<(usize, QuantizedRigidBodyState)>, CodecError> {
        let mut updates = Vec::new();

        if mode.has_index_choice() && reader.read_bool()? {
            let count = reader.read_bounded(0, self.num_objects as i32)? as usize;
            let mut previous = None;
            for _ in 0..count {
                let index = self.read_index(reader, mode, previous)?;
                if let Some(previous) = previous.filter(|&previous| index <= previous) {
                    return Err(CodecError::UnorderedIndex { index, previous });
                }
                updates.push((index, self.fields.read_changed(reader, mode, &base.objects[index])?));
                previous = Some(index);
            }
        } else {
            for (index, base) in base.objects.iter().enumerate() {
                if reader.read_bool()? {
                    updates.push((index, self.fields.read_changed(reader, mode, base)?));
                }
            }
        }

        Ok(updates)
    }
}

fn check_ascending(indices: impl Iterator<Item = usize>) -> Result<(), CodecError> {
    let mut previous: Option<usize> = None;
    for index in indices {
        if let Some(previous) = previous.filter(|&previous| index <= previous) {
            return Err(CodecError::UnorderedIndex { index, previous });
        }
        previous = Some(index);
    }
    Ok(())
}
