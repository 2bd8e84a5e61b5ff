use super::CodecError;
use crate::bitstream::{BitReader, BitWrite, BitWriter};

/// Receiver to sender: the newest snapshot sequence received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    pub ack: u16,
}

impl AckPacket {
    pub const SIZE: usize = 2;

    pub fn new(ack: u16) -> Self {
        Self { ack }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(Self::SIZE);
        writer.write_u16(self.ack);
        writer.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = BitReader::new(bytes);
        Ok(Self {
            ack: reader.read_u16()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_is_two_bytes() {
        let bytes = AckPacket::new(0xABCD).encode();
        assert_eq!(bytes.len(), AckPacket::SIZE);
        assert_eq!(AckPacket::decode(&bytes).unwrap().ack, 0xABCD);
    }

    #[test]
    fn truncated_ack_is_rejected() {
        assert!(matches!(
            AckPacket::decode(&[0x01]),
            Err(CodecError::Stream(_))
        ));
    }
}
