/// Seed the Zephyr link uses for every checksum.
pub const CRC_SEED: u16 = 0x1021;

/// Byte-wise CRC-16/CCITT starting from `seed`.
pub fn crc16_ccitt(seed: u16, data: &[u8]) -> u16 {
    let [mut msb, mut lsb] = seed.to_be_bytes();
    for &byte in data {
        let mut x = byte ^ msb;
        x ^= x >> 4;
        msb = lsb ^ (x >> 3) ^ (x << 4);
        lsb = x ^ (x << 5);
    }
    u16::from_be_bytes([msb, lsb])
}

/// Checksum as carried in `<CRC>` elements and binary trailers.
pub fn zephyr_crc(data: &[u8]) -> u16 {
    crc16_ccitt(CRC_SEED, data)
}
