//! Octet-array helpers shared by the decoder and encoder for the
//! variable-length bitmap and array directives. Factored out because both
//! interpreters need byte-at-a-time, partial-byte-aware field access and
//! the logic is identical in each direction but for which end carries the
//! partial byte.

use crate::bitvector::BitVector;
use crate::error::Result;

/// Read `total_bits` worth of octets starting at `pos`, right-aligned: the
/// leftover `total_bits % 8` bits (if any) occupy the low bits of the
/// *first* output byte, and every following byte is a full octet.
/// (`VARIABLE_BITMAP`.)
pub fn read_bitmap_right_aligned(bv: &BitVector, pos: usize, total_bits: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut p = pos;
    let mut remaining = total_bits;
    let first = remaining % 8;
    if first > 0 {
        out.push(bv.read_bits(p, first as u8)? as u8);
        p += first as usize;
        remaining -= first;
    }
    while remaining > 0 {
        out.push(bv.read_bits(p, 8)? as u8);
        p += 8;
        remaining -= 8;
    }
    Ok(out)
}

pub fn write_bitmap_right_aligned(
    bv: &mut BitVector,
    pos: usize,
    total_bits: u32,
    bytes: &[u8],
) -> Result<()> {
    let mut p = pos;
    let mut remaining = total_bits;
    let first = remaining % 8;
    let mut iter = bytes.iter();
    if first > 0 {
        let b = *iter.next().unwrap_or(&0);
        bv.write_bits(p, first as u8, b as u64)?;
        p += first as usize;
        remaining -= first;
    }
    while remaining > 0 {
        let b = *iter.next().unwrap_or(&0);
        bv.write_bits(p, 8, b as u64)?;
        p += 8;
        remaining -= 8;
    }
    Ok(())
}

/// As above but left-aligned: full bytes first, leftover bits in the high
/// bits of the *last* output byte. (`LEFT_ALIGNED_VAR_BMP`.)
pub fn read_bitmap_left_aligned(bv: &BitVector, pos: usize, total_bits: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut p = pos;
    let mut remaining = total_bits;
    while remaining >= 8 {
        out.push(bv.read_bits(p, 8)? as u8);
        p += 8;
        remaining -= 8;
    }
    if remaining > 0 {
        out.push(bv.read_bits(p, remaining as u8)? as u8);
    }
    Ok(out)
}

pub fn write_bitmap_left_aligned(
    bv: &mut BitVector,
    pos: usize,
    total_bits: u32,
    bytes: &[u8],
) -> Result<()> {
    let mut p = pos;
    let mut remaining = total_bits;
    let mut iter = bytes.iter();
    while remaining >= 8 {
        let b = *iter.next().unwrap_or(&0);
        bv.write_bits(p, 8, b as u64)?;
        p += 8;
        remaining -= 8;
    }
    if remaining > 0 {
        let b = *iter.next().unwrap_or(&0);
        bv.write_bits(p, remaining as u8, b as u64)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_aligned_round_trip_partial_byte() {
        let mut data = [0u8; 3];
        {
            let mut bv = BitVector::new(&mut data);
            write_bitmap_right_aligned(&mut bv, 0, 13, &[0b101, 0xFF]).unwrap();
        }
        let bv = BitVector::new(&mut data);
        let got = read_bitmap_right_aligned(&bv, 0, 13).unwrap();
        assert_eq!(got, vec![0b101, 0xFF]);
    }

    #[test]
    fn left_aligned_round_trip_partial_byte() {
        let mut data = [0u8; 3];
        {
            let mut bv = BitVector::new(&mut data);
            write_bitmap_left_aligned(&mut bv, 0, 13, &[0xFF, 0b101]).unwrap();
        }
        let bv = BitVector::new(&mut data);
        let got = read_bitmap_left_aligned(&bv, 0, 13).unwrap();
        assert_eq!(got, vec![0xFF, 0b101]);
    }

    #[test]
    fn exact_multiple_of_eight_has_no_partial_byte() {
        let mut data = [0u8; 2];
        {
            let mut bv = BitVector::new(&mut data);
            write_bitmap_right_aligned(&mut bv, 0, 16, &[0xAB, 0xCD]).unwrap();
        }
        let bv = BitVector::new(&mut data);
        assert_eq!(read_bitmap_right_aligned(&bv, 0, 16).unwrap(), vec![0xAB, 0xCD]);
        assert_eq!(read_bitmap_left_aligned(&bv, 0, 16).unwrap(), vec![0xAB, 0xCD]);
    }
}
