//! The decoder interpreter: walks a description and builds a [`Value`] tree.

use crate::bitfield::{read_bitmap_left_aligned, read_bitmap_right_aligned};
use crate::bitvector::BitVector;
use crate::directive::{ChoiceAlt, Count, Directive, SentinelTag, UnionArm, UNION_INDEX_BITS};
use crate::error::{Error, Result};
use crate::lh::lh_read;
use crate::state::CodecState;
use crate::value::{Record, Value};

/// Decode one description level into a [`Value::Struct`].
pub fn decode(descr: &'static [Directive], bv: &BitVector, state: &mut CodecState) -> Result<Value> {
    let record = decode_description(descr, bv, state)?;
    Ok(Value::Struct(record))
}

fn take(bv: &BitVector, state: &mut CodecState, n: u8, label: &'static str) -> Result<u64> {
    if state.remaining_bits < n as i64 {
        return Err(Error::NeedMoreBits {
            label,
            position: state.bit_offset,
        });
    }
    let v = bv.read_bits(state.bit_offset as usize, n)?;
    log::trace!("decode {label}: {n} bits @ {} = {v:#x}", state.bit_offset);
    state.advance(n);
    Ok(v)
}

fn take_lh(bv: &BitVector, state: &mut CodecState, n: u8, label: &'static str) -> Result<u64> {
    if state.remaining_bits < n as i64 {
        return Err(Error::NeedMoreBits {
            label,
            position: state.bit_offset,
        });
    }
    let v = lh_read(bv, state.bit_offset as usize, n)?;
    state.advance(n);
    Ok(v)
}

fn check_uint_width(bits: u8, label: &'static str) -> Result<()> {
    if bits > 32 {
        Err(Error::General {
            label,
            bits: bits as u32,
        })
    } else {
        Ok(())
    }
}

/// Mask to the low `bits` bits. `UINT_OFFSET` adds/subtracts its delta in
/// full `i64` precision and then truncates back to the field's own declared
/// width, so a field near its wraparound boundary round-trips exactly - the
/// reference library instead truncates through a fixed-width intermediate
/// (`guint8`/`guint16`) regardless of the field's exact declared width,
/// which breaks round-tripping for anything between 17 and 31 bits; this
/// engine truncates to the field's actual width instead.
fn truncate_to_width(x: i64, bits: u8) -> u64 {
    if bits >= 64 {
        x as u64
    } else {
        (x as u64) & ((1u64 << bits) - 1)
    }
}

fn check_array_element_width(bits: u8, label: &'static str) -> Result<()> {
    match bits {
        0..=8 => Ok(()),
        9..=32 => Err(Error::NotImplemented {
            label,
            bits: bits as u32,
        }),
        _ => Err(Error::General {
            label,
            bits: bits as u32,
        }),
    }
}

fn resolve_count(record: &Record, count: &Count, label: &'static str) -> Result<u32> {
    match count {
        Count::Fixed(n) => Ok(*n),
        Count::Field(field) => Ok(record.get_uint(field)? as u32),
    }
}

fn exist_next(bv: &BitVector, state: &mut CodecState, tag: SentinelTag, label: &'static str) -> Result<bool> {
    let bit = take(bv, state, 1, label)?;
    Ok(match tag {
        SentinelTag::Standard => bit != 0,
        SentinelTag::Reversed => bit == 0,
    })
}

fn decode_union_index(
    bv: &BitVector,
    state: &mut CodecState,
    k: u8,
    lh: bool,
    label: &'static str,
) -> Result<u8> {
    if k == 0 || k as usize >= UNION_INDEX_BITS.len() {
        return Err(Error::InvalidUnionIndex { label, index: 0, k });
    }
    let bits = UNION_INDEX_BITS[k as usize];
    let raw = if lh {
        take_lh(bv, state, bits, label)?
    } else {
        take(bv, state, bits, label)?
    };
    let idx = raw as u8;
    Ok(idx.min(k - 1))
}

fn decode_description(
    descr: &'static [Directive],
    bv: &BitVector,
    state: &mut CodecState,
) -> Result<Record> {
    let mut record = Record::new();
    let mut i = 0usize;
    while i < descr.len() {
        let d = &descr[i];
        match d {
            Directive::End => break,

            Directive::Bit { label } => {
                let v = take(bv, state, 1, label)?;
                record.push(label, Value::Bit(v != 0));
                i += 1;
            }

            Directive::Null => {
                record.push(d.label(), Value::Null);
                i += 1;
            }

            Directive::UInt { bits, label } => {
                check_uint_width(*bits, label)?;
                let v = take(bv, state, *bits, label)?;
                record.push(label, Value::UInt(v));
                i += 1;
            }

            Directive::UIntOffset { bits, delta, label } => {
                check_uint_width(*bits, label)?;
                let raw = take(bv, state, *bits, label)?;
                let v = truncate_to_width((raw as i64).wrapping_add(*delta), *bits);
                record.push(label, Value::UInt(v));
                i += 1;
            }

            Directive::UIntLh { bits, label } => {
                if *bits > 8 {
                    return Err(Error::General {
                        label,
                        bits: *bits as u32,
                    });
                }
                let v = take_lh(bv, state, *bits, label)?;
                record.push(label, Value::UInt(v));
                i += 1;
            }

            Directive::UIntArray { bits, count, label } => {
                let n = resolve_count(&record, count, label)?;
                check_array_element_width(*bits, label)?;
                let mut list = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    list.push(Value::UInt(take(bv, state, *bits, label)?));
                }
                record.push(label, Value::List(list));
                i += 1;
            }

            Directive::Bitmap { bits, label } => {
                if *bits > 64 {
                    return Err(Error::NotImplemented {
                        label,
                        bits: *bits as u32,
                    });
                }
                let v = take(bv, state, *bits, label)?;
                record.push(label, Value::Bitmap(v));
                i += 1;
            }

            Directive::Type { descr: sub, label } => {
                let mut child = state.child();
                let v = decode(sub, bv, &mut child)?;
                state.inherit(child);
                record.push(label, v);
                i += 1;
            }

            Directive::Choice { alts, label } => {
                record.push(label, decode_choice(alts, bv, state, label)?);
                i += 1;
            }

            Directive::Union { k, arms, label } => {
                let idx = decode_union_index(bv, state, *k, false, label)?;
                let v = decode_union_arm(&arms[idx as usize], bv, state, &record)?;
                record.push(label, Value::Choice { index: idx, value: Box::new(v) });
                i += 1;
            }

            Directive::UnionLh { k, arms, label } => {
                let idx = decode_union_index(bv, state, *k, true, label)?;
                let v = decode_union_arm(&arms[idx as usize], bv, state, &record)?;
                record.push(label, Value::Choice { index: idx, value: Box::new(v) });
                i += 1;
            }

            Directive::Exist { label } => {
                let present = take(bv, state, 1, label)? != 0;
                record.push(label, Value::Bit(present));
                if !present {
                    break;
                }
                i += 1;
            }

            Directive::ExistLh { label } => {
                let present = take_lh(bv, state, 1, label)? != 0;
                record.push(label, Value::Bit(present));
                if !present {
                    break;
                }
                i += 1;
            }

            Directive::NextExist { skip, or_null, label } => {
                if *or_null && state.remaining_bits == 0 {
                    record.push(label, Value::Absent);
                    i += skip + 1;
                    continue;
                }
                let present = take(bv, state, 1, label)? != 0;
                if present {
                    record.push(label, Value::Bit(true));
                    i += 1;
                } else {
                    record.push(label, Value::Absent);
                    i += skip + 1;
                }
            }

            Directive::NextExistLh { skip, or_null, label } => {
                if *or_null && state.remaining_bits == 0 {
                    record.push(label, Value::Absent);
                    i += skip + 1;
                    continue;
                }
                let present = take_lh(bv, state, 1, label)? != 0;
                if present {
                    record.push(label, Value::Bit(true));
                    i += 1;
                } else {
                    record.push(label, Value::Absent);
                    i += skip + 1;
                }
            }

            Directive::VariableBitmap { delta, count_field, label } => {
                let n = record.get_uint(count_field)? as i64 + delta;
                record.push(label, decode_bitmap(bv, state, n, false, label)?);
                i += 1;
            }

            Directive::VariableBitmap1 { label } => {
                let n = state.remaining_bits;
                record.push(label, decode_bitmap(bv, state, n, false, label)?);
                i += 1;
            }

            Directive::LeftAlignedVarBmp { delta, count_field, label } => {
                let n = record.get_uint(count_field)? as i64 + delta;
                record.push(label, decode_bitmap(bv, state, n, true, label)?);
                i += 1;
            }

            Directive::LeftAlignedVarBmp1 { label } => {
                let n = state.remaining_bits;
                record.push(label, decode_bitmap(bv, state, n, true, label)?);
                i += 1;
            }

            Directive::VariableArray { delta, count_field, label } => {
                let count = record.get_uint(count_field)? as i64 + delta;
                let mut octets = Vec::new();
                if count > 0 {
                    let total_bits = count as i64 * 8;
                    if state.remaining_bits < total_bits {
                        return Err(Error::NeedMoreBits { label, position: state.bit_offset });
                    }
                    for _ in 0..count {
                        octets.push(take(bv, state, 8, label)? as u8);
                    }
                }
                record.push(label, Value::Octets(octets));
                i += 1;
            }

            Directive::VariableTArray { descr: sub, count_field, label }
            | Directive::VariableTArrayOffset { descr: sub, count_field, label } => {
                let n = record.get_uint(count_field)?;
                let mut list = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let mut child = state.child();
                    list.push(decode(sub, bv, &mut child)?);
                    state.inherit(child);
                }
                record.push(label, Value::List(list));
                i += 1;
            }

            Directive::TypeArray { descr: sub, count, label } => {
                let mut list = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    let mut child = state.child();
                    list.push(decode(sub, bv, &mut child)?);
                    state.inherit(child);
                }
                record.push(label, Value::List(list));
                i += 1;
            }

            Directive::RecursiveArray { bits, label } => {
                let mut list = Vec::new();
                while exist_next(bv, state, SentinelTag::Standard, label)? {
                    list.push(Value::UInt(take(bv, state, *bits, label)?));
                }
                record.push(label, Value::List(list));
                i += 1;
            }

            Directive::RecursiveTArray { descr: sub, label } => {
                let mut list = Vec::new();
                while exist_next(bv, state, SentinelTag::Standard, label)? {
                    let mut child = state.child();
                    list.push(decode(sub, bv, &mut child)?);
                    state.inherit(child);
                }
                record.push(label, Value::List(list));
                i += 1;
            }

            Directive::RecursiveTArray1 { descr: sub, label } => {
                record.push(label, decode_recursive_tarray_tagged(sub, bv, state, SentinelTag::Standard)?);
                i += 1;
            }

            Directive::RecursiveTArray2 { descr: sub, label } => {
                record.push(label, decode_recursive_tarray_tagged(sub, bv, state, SentinelTag::Reversed)?);
                i += 1;
            }

            Directive::Serialize { func, label } => {
                // 7-bit length prefix, then the body; the prefix is
                // authoritative for how far the cursor moves, regardless of
                // exactly how many bits the serializer itself consumed.
                let len = take(bv, state, 7, label)?;
                if state.remaining_bits < len as i64 {
                    return Err(Error::NeedMoreBits { label, position: state.bit_offset });
                }
                let mut child = CodecState::decoder(state.bit_offset, len as i64);
                let v = func.decode(bv, &mut child)?;
                state.bit_offset += len as i64;
                state.remaining_bits -= len as i64;
                record.push(label, v);
                i += 1;
            }

            Directive::Fixed { bits, value, label } => {
                let v = take(bv, state, *bits, label)?;
                if v != *value {
                    return Err(Error::DataNotValid {
                        label,
                        position: state.bit_offset - *bits as i64,
                        expected: *value,
                        actual: v,
                    });
                }
                record.push(label, Value::UInt(v));
                i += 1;
            }

            Directive::Callback { label } => {
                return Err(Error::Internal {
                    label,
                    reason: "CALLBACK is reserved and not implemented",
                });
            }

            Directive::TrapError { code, label } => {
                return Err(Error::Trap { label, code: *code });
            }
        }
    }
    Ok(record)
}

fn decode_bitmap(
    bv: &BitVector,
    state: &mut CodecState,
    n: i64,
    left_aligned: bool,
    label: &'static str,
) -> Result<Value> {
    if n <= 0 {
        return Ok(Value::BitBlob { bits: Vec::new(), len_bits: 0 });
    }
    if state.remaining_bits < n {
        return Err(Error::NeedMoreBits { label, position: state.bit_offset });
    }
    let bits = if left_aligned {
        read_bitmap_left_aligned(bv, state.bit_offset as usize, n as u32)?
    } else {
        read_bitmap_right_aligned(bv, state.bit_offset as usize, n as u32)?
    };
    state.bit_offset += n;
    state.remaining_bits -= n;
    Ok(Value::BitBlob { bits, len_bits: n as u32 })
}

fn decode_choice(
    alts: &'static [ChoiceAlt],
    bv: &BitVector,
    state: &mut CodecState,
    label: &'static str,
) -> Result<Value> {
    for (idx, alt) in alts.iter().enumerate() {
        if state.remaining_bits < alt.bits as i64 {
            continue;
        }
        let trial = bv.read_bits(state.bit_offset as usize, alt.bits)?;
        if trial == alt.value {
            state.advance(alt.bits);
            let mut child = state.child();
            let v = decode(alt.descr, bv, &mut child)?;
            state.inherit(child);
            return Ok(Value::Choice {
                index: idx as u8,
                value: Box::new(v),
            });
        }
    }
    Err(Error::DataNotValid {
        label,
        position: state.bit_offset,
        expected: 0,
        actual: 0,
    })
}

fn decode_union_arm(
    arm: &UnionArm,
    bv: &BitVector,
    state: &mut CodecState,
    outer: &Record,
) -> Result<Value> {
    match arm {
        UnionArm::Bit { label } => Ok(Value::Bit(take(bv, state, 1, label)? != 0)),
        UnionArm::Null => Ok(Value::Null),
        UnionArm::UInt { bits, label } => {
            check_uint_width(*bits, label)?;
            Ok(Value::UInt(take(bv, state, *bits, label)?))
        }
        UnionArm::UIntOffset { bits, delta, label } => {
            check_uint_width(*bits, label)?;
            let raw = take(bv, state, *bits, label)?;
            Ok(Value::UInt(truncate_to_width((raw as i64).wrapping_add(*delta), *bits)))
        }
        UnionArm::UIntLh { bits, label } => {
            if *bits > 8 {
                return Err(Error::General { label, bits: *bits as u32 });
            }
            Ok(Value::UInt(take_lh(bv, state, *bits, label)?))
        }
        UnionArm::UIntArray { bits, count, label } => {
            let n = resolve_count(outer, count, label)?;
            check_array_element_width(*bits, label)?;
            let mut list = Vec::with_capacity(n as usize);
            for _ in 0..n {
                list.push(Value::UInt(take(bv, state, *bits, label)?));
            }
            Ok(Value::List(list))
        }
        UnionArm::VariableTArray { descr, count_field, .. }
        | UnionArm::VariableTArrayOffset { descr, count_field, .. } => {
            let n = outer.get_uint(count_field)?;
            let mut list = Vec::with_capacity(n as usize);
            for _ in 0..n {
                let mut child = state.child();
                list.push(decode(descr, bv, &mut child)?);
                state.inherit(child);
            }
            Ok(Value::List(list))
        }
        UnionArm::TypeArray { descr, count, .. } => {
            let mut list = Vec::with_capacity(*count as usize);
            for _ in 0..*count {
                let mut child = state.child();
                list.push(decode(descr, bv, &mut child)?);
                state.inherit(child);
            }
            Ok(Value::List(list))
        }
        UnionArm::Bitmap { bits, label } => {
            if *bits > 64 {
                return Err(Error::NotImplemented { label, bits: *bits as u32 });
            }
            Ok(Value::Bitmap(take(bv, state, *bits, label)?))
        }
        UnionArm::Type { descr, .. } => {
            let mut child = state.child();
            let v = decode(descr, bv, &mut child)?;
            state.inherit(child);
            Ok(v)
        }
    }
}

fn decode_recursive_tarray_tagged(
    sub: &'static [Directive],
    bv: &BitVector,
    state: &mut CodecState,
    tag: SentinelTag,
) -> Result<Value> {
    let mut list = Vec::new();
    loop {
        let mut child = state.child();
        list.push(decode(sub, bv, &mut child)?);
        state.inherit(child);
        if !exist_next(bv, state, tag, sub.first().map(Directive::label).unwrap_or("element"))? {
            break;
        }
    }
    Ok(Value::List(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::Directive::*;

    #[test]
    fn s1_single_bit() {
        static DESCR: &[Directive] = &[Bit { label: "b" }, End];
        let mut data = [0b1000_0000u8];
        let bv = BitVector::new(&mut data);
        let mut state = CodecState::decoder(0, 8);
        let v = decode(DESCR, &bv, &mut state).unwrap();
        let rec = v.as_struct().unwrap();
        assert_eq!(rec.get("b"), Some(&Value::Bit(true)));
        assert_eq!(state.remaining_bits, 7);
    }

    #[test]
    fn s4_fixed_mismatch() {
        static DESCR: &[Directive] = &[Fixed { bits: 3, value: 0b101, label: "f" }, End];
        let mut data = [0b1100_0000u8];
        let bv = BitVector::new(&mut data);
        let mut state = CodecState::decoder(0, 8);
        let err = decode(DESCR, &bv, &mut state).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::DATA_NOT_VALID);
    }

    #[test]
    fn s5_recursive_array() {
        static DESCR: &[Directive] = &[RecursiveArray { bits: 4, label: "xs" }, End];
        // 1 0101 1 0011 0, zero-padded to 16 bits: 1010 1100 1100 0000
        let mut data = [0b1010_1100u8, 0b1100_0000u8];
        let bv = BitVector::new(&mut data);
        let mut state = CodecState::decoder(0, 11);
        let v = decode(DESCR, &bv, &mut state).unwrap();
        let rec = v.as_struct().unwrap();
        let list = rec.get("xs").unwrap().as_list().unwrap();
        assert_eq!(list, &[Value::UInt(5), Value::UInt(3)]);
        assert_eq!(state.remaining_bits, 0);
    }

    #[test]
    fn truncated_input_reports_need_more_bits_not_panic() {
        static DESCR: &[Directive] = &[UInt { bits: 16, label: "x" }, End];
        let mut data = [0u8; 1];
        let bv = BitVector::new(&mut data);
        let mut state = CodecState::decoder(0, 8);
        let err = decode(DESCR, &bv, &mut state).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::NEED_MORE_BITS_TO_UNPACK);
    }
}
