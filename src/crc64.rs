//! CRC-64 with the Jones polynomial, reflected, no final xor.

const POLY: u64 = 0x95AC_9329_AC4B_C9B5;

/// Byte-at-a-time lookup table.
pub(crate) const CRC64_TABLE: [u64; 256] = {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Feed one byte into `crc`.
#[inline]
pub fn update(crc: u64, byte: u8) -> u64 {
    CRC64_TABLE[((crc ^ u64::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
}

/// CRC-64 of `data` starting from zero.
pub fn crc64(data: &[u8]) -> u64 {
    data.iter().fold(0, |crc, &b| update(crc, b))
}
