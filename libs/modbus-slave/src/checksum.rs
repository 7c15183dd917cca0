//! Frame checksums for the serial transports
//!
//! ASCII frames carry a one-byte LRC, RTU frames a two-byte CRC-16
//! (low byte first). TCP and UDP frames carry no checksum.

use crc::{Crc, CRC_16_MODBUS};

/// CRC calculator for RTU (polynomial 0xA001 reflected, initial 0xFFFF)
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Checksum algorithm used by a serial transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// Longitudinal redundancy check (ASCII)
    Lrc,
    /// CRC-16/MODBUS (RTU)
    Crc16,
}

impl ChecksumKind {
    /// Number of trailing checksum bytes on the wire
    pub const fn len(self) -> usize {
        match self {
            Self::Lrc => 1,
            Self::Crc16 => 2,
        }
    }

    /// Checksum bytes for a frame without its checksum
    pub fn compute(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Lrc => vec![calculate_lrc(data)],
            Self::Crc16 => calculate_crc(data).to_le_bytes().to_vec(),
        }
    }

    /// Compare the computed checksum of the data portion against the trailing bytes
    pub fn verify(self, frame: &[u8]) -> bool {
        if frame.len() < self.len() {
            return false;
        }
        let (data, received) = frame.split_at(frame.len() - self.len());
        self.compute(data) == received
    }
}

/// Two's complement of the 8-bit sum of all bytes
pub fn calculate_lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

/// Modbus CRC-16 of the given bytes
pub fn calculate_crc(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtu_crc() {
        // Read holding registers request
        let data1 = [0x01, 0x03, 0x00, 0x01, 0x00, 0x02];
        assert_eq!(calculate_crc(&data1), 0xCB95);

        // Write single register request
        let data2 = [0x01, 0x06, 0x00, 0x01, 0x00, 0x03];
        assert_eq!(calculate_crc(&data2), 0x0B98);

        // Exception response
        let data3 = [0x01, 0x83, 0x02];
        assert_eq!(calculate_crc(&data3), 0xF1C0);
    }

    #[test]
    fn test_crc_appended_low_byte_first() {
        let bytes = ChecksumKind::Crc16.compute(&[0x01, 0x03, 0x00, 0x01, 0x00, 0x02]);
        assert_eq!(bytes, vec![0x95, 0xCB]);
    }

    #[test]
    fn test_lrc() {
        // 0x01 + 0x03 + 0x00 + 0x00 + 0x00 + 0x0A = 0x0E, negated = 0xF2
        assert_eq!(calculate_lrc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]), 0xF2);
        assert_eq!(calculate_lrc(&[]), 0x00);
        // Sum wraps before negation
        assert_eq!(calculate_lrc(&[0xFF, 0x02]), 0xFF);
    }

    #[test]
    fn test_verify_full_frame() {
        let mut frame = vec![0x11, 0x06, 0x00, 0x01, 0x00, 0x03];
        frame.extend(ChecksumKind::Crc16.compute(&frame));
        assert!(ChecksumKind::Crc16.verify(&frame));

        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(!ChecksumKind::Crc16.verify(&frame));

        let mut ascii = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        ascii.push(calculate_lrc(&ascii));
        assert!(ChecksumKind::Lrc.verify(&ascii));
        assert!(!ChecksumKind::Lrc.verify(&[]));
    }
}
