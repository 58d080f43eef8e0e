//! CRC16-CCITT (XMODEM variant)
//!
//! Polynomial 0x1021, initial value 0, no reflection, no final xor. Both the
//! SUMD receiver frames and VESC packets use this checksum.

/// Byte-indexed lookup table for polynomial 0x1021
pub const CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC16 accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    /// Start a new checksum
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Feed one byte
    pub fn update(&mut self, byte: u8) {
        self.value = CRC16_TABLE[((self.value >> 8) as u8 ^ byte) as usize] ^ (self.value << 8);
    }

    /// Feed a slice of bytes
    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    /// Current checksum value
    pub fn value(&self) -> u16 {
        self.value
    }
}

/// Checksum of a complete byte slice
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update_slice(bytes);
    crc.value()
}
