pub fn from_u8_to_i16(src: &[u8], dst: &mut [i16]) {
    for (d, chunk) in dst.iter_mut().zip(src.chunks_exact(2)) {
        *d = i16::from_le_bytes([chunk[0], chunk[1]]);
    }
}

pub fn from_u8_to_u16(src: &[u8], dst: &mut [u16]) {
    for (d, chunk) in dst.iter_mut().zip(src.chunks_exact(2)) {
        *d = u16::from_le_bytes([chunk[0], chunk[1]]);
    }
}

pub fn from_u8_to_u32(src: &[u8], dst: &mut [u32]) {
    for (d, chunk) in dst.iter_mut().zip(src.chunks_exact(4)) {
        *d = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
}

pub fn from_i16_to_u8(src: &[i16], dst: &mut [u8]) {
    for (num, chunk) in src.iter().zip(dst.chunks_exact_mut(2)) {
        chunk.copy_from_slice(&num.to_le_bytes());
    }
}

pub fn from_u32_to_u8(src: &[u32], dst: &mut [u8]) {
    for (num, chunk) in src.iter().zip(dst.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&num.to_le_bytes());
    }
}

#[inline]
pub fn read_u32(src: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([src[pos], src[pos + 1], src[pos + 2], src[pos + 3]])
}

/// Reverse the byte order of every 4-byte group, in place.
///
/// # Panics
///
/// If `buffer.len()` is not a multiple of 4. The firmware only exchanges
/// 32-bit words, so an odd length is a programming error, not a bus failure.
pub fn swap_buffer(buffer: &mut [u8]) {
    assert!(
        buffer.len() % 4 == 0,
        "swap_buffer: length {} is not a multiple of 4",
        buffer.len()
    );
    for chunk in buffer.chunks_exact_mut(4) {
        chunk.reverse();
    }
}
