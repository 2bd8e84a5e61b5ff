use serde::{Deserialize, Serialize};

use super::CodecError;
use crate::bitstream::{BitReader, BitWrite};

/// Snapshot encoding carried in every packet header, ordered from least to most compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeltaMode {
    Uncompressed = 0,
    QuantizedAbsolute = 1,
    NotChanged = 2,
    ChangedIndex = 3,
    RelativeIndex = 4,
    RelativePosition = 5,
    #[default]
    RelativeOrientation = 6,
}

impl DeltaMode {
    pub const ALL: [DeltaMode; 7] = [
        DeltaMode::Uncompressed,
        DeltaMode::QuantizedAbsolute,
        DeltaMode::NotChanged,
        DeltaMode::ChangedIndex,
        DeltaMode::RelativeIndex,
        DeltaMode::RelativePosition,
        DeltaMode::RelativeOrientation,
    ];

    const MAX_TAG: i32 = DeltaMode::RelativeOrientation as i32;

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeltaMode::Uncompressed => "uncompressed",
            DeltaMode::QuantizedAbsolute => "quantized absolute",
            DeltaMode::NotChanged => "not changed",
            DeltaMode::ChangedIndex => "changed index",
            DeltaMode::RelativeIndex => "relative index",
            DeltaMode::RelativePosition => "relative position",
            DeltaMode::RelativeOrientation => "relative orientation",
        }
    }

    /// Delta modes read unchanged objects from a baseline snapshot.
    pub fn is_delta(&self) -> bool {
        !matches!(self, DeltaMode::Uncompressed | DeltaMode::QuantizedAbsolute)
    }

    /// Modes that may switch from per-object flags to a list of changed indices.
    pub fn has_index_choice(&self) -> bool {
        self.is_delta() && *self != DeltaMode::NotChanged
    }

    /// Indices after the first are coded as gaps from the previous one.
    pub fn relative_indices(&self) -> bool {
        matches!(
            self,
            DeltaMode::RelativeIndex | DeltaMode::RelativePosition | DeltaMode::RelativeOrientation
        )
    }

    pub fn relative_position(&self) -> bool {
        matches!(
            self,
            DeltaMode::RelativePosition | DeltaMode::RelativeOrientation
        )
    }

    pub fn relative_orientation(&self) -> bool {
        *self == DeltaMode::RelativeOrientation
    }

    fn write<W: BitWrite>(&self, writer: &mut W) {
        writer.write_bounded(*self as i32, 0, Self::MAX_TAG);
    }

    fn read(reader: &mut BitReader<'_>) -> Result<Self, CodecError> {
        let tag = reader.read_bounded(0, Self::MAX_TAG)?;
        // bounded read already rejects tags above MAX_TAG
        Self::from_u8(tag as u8).ok_or(CodecError::UnknownMode(tag as u8))
    }
}

impl std::fmt::Display for DeltaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot a delta packet is encoded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Baseline {
    /// The snapshot both peers hold from session start.
    Initial,
    Sequence(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence: u16,
    pub mode: DeltaMode,
    pub baseline: Baseline,
}

impl PacketHeader {
    pub fn new(sequence: u16, mode: DeltaMode, baseline: Baseline) -> Self {
        Self {
            sequence,
            mode,
            baseline,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.baseline == Baseline::Initial
    }

    pub fn write<W: BitWrite>(&self, writer: &mut W) {
        writer.write_u16(self.sequence);
        self.mode.write(writer);
        match self.baseline {
            Baseline::Initial => writer.write_bool(true),
            Baseline::Sequence(base) => {
                writer.write_bool(false);
                writer.write_u16(base);
            }
        }
    }

    pub fn read(reader: &mut BitReader<'_>) -> Result<Self, CodecError> {
        let sequence = reader.read_u16()?;
        let mode = DeltaMode::read(reader)?;
        let baseline = if reader.read_bool()? {
            Baseline::Initial
        } else {
            Baseline::Sequence(reader.read_u16()?)
        };
        Ok(Self {
            sequence,
            mode,
            baseline,
        })
    }
}
