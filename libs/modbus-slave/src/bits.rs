//! Coil and discrete-input bit packing
//!
//! Bits are packed LSB first: coil `n` lives in byte `n / 8`, bit `n % 8`.

const BITS_PER_BYTE: usize = 8;

/// Number of bytes needed to store the given number of bits
pub const fn bytes_needed(bits: usize) -> usize {
    (bits + BITS_PER_BYTE - 1) / BITS_PER_BYTE
}

/// Pack boolean values into bytes, padding the last byte with zeros
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bytes_needed(bits.len())];
    for (i, _) in bits.iter().enumerate().filter(|(_, bit)| **bit) {
        bytes[i / BITS_PER_BYTE] |= 1 << (i % BITS_PER_BYTE);
    }
    bytes
}

/// Unpack `count` bits; positions past the end of `bytes` read as false
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / BITS_PER_BYTE)
                .is_some_and(|byte| byte & (1 << (i % BITS_PER_BYTE)) != 0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_needed() {
        assert_eq!(bytes_needed(0), 0);
        assert_eq!(bytes_needed(1), 1);
        assert_eq!(bytes_needed(8), 1);
        assert_eq!(bytes_needed(9), 2);
    }

    #[test]
    fn test_pack_lsb_first() {
        // Coils 20-28 example from the Modbus application protocol
        let bits = [
            true, false, true, true, false, false, true, true, true, true, false, true,
        ];
        assert_eq!(pack_bits(&bits), vec![0xCD, 0x0B]);
    }

    #[test]
    fn test_unpack() {
        let bits = unpack_bits(&[0b1010_1010], 4);
        assert_eq!(bits, vec![false, true, false, true]);
        assert_eq!(unpack_bits(&[], 2), vec![false, false]);
    }
}
