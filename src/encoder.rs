//! The encoder interpreter: mirror of the decoder. Reads a [`Value`] tree
//! and emits bits; on any schema/width violation it returns the identical
//! error taxonomy the decoder uses.

use crate::bitfield::{write_bitmap_left_aligned, write_bitmap_right_aligned};
use crate::bitvector::BitVector;
use crate::directive::{ChoiceAlt, Count, Directive, SentinelTag, UnionArm, UNION_INDEX_BITS};
use crate::error::{Error, Result};
use crate::lh::lh_write;
use crate::state::CodecState;
use crate::value::{Record, Value};

/// Encode a [`Value::Struct`] against a description level.
pub fn encode(
    descr: &'static [Directive],
    bv: &mut BitVector,
    state: &mut CodecState,
    value: &Value,
) -> Result<()> {
    let record = value.as_struct().ok_or(Error::InScript {
        label: descr.first().map(Directive::label).unwrap_or("<descr>"),
        reason: "expected a struct value at this description level",
    })?;
    encode_description(descr, bv, state, record)
}

fn emit(bv: &mut BitVector, state: &mut CodecState, n: u8, v: u64, label: &'static str) -> Result<()> {
    if state.remaining_bits < n as i64 {
        return Err(Error::NeedMoreBits {
            label,
            position: state.bit_offset,
        });
    }
    bv.write_bits(state.bit_offset as usize, n, v)?;
    log::trace!("encode {label}: {n} bits @ {} = {v:#x}", state.bit_offset);
    state.advance(n);
    Ok(())
}

fn emit_lh(bv: &mut BitVector, state: &mut CodecState, n: u8, v: u64, label: &'static str) -> Result<()> {
    if state.remaining_bits < n as i64 {
        return Err(Error::NeedMoreBits {
            label,
            position: state.bit_offset,
        });
    }
    lh_write(bv, state.bit_offset as usize, n, v)?;
    state.advance(n);
    Ok(())
}

fn check_uint_width(bits: u8, label: &'static str) -> Result<()> {
    if bits > 32 {
        Err(Error::General { label, bits: bits as u32 })
    } else {
        Ok(())
    }
}

/// Inverse of the truncation `decoder::truncate_to_width` applies: mask the
/// subtracted value back down to the field's declared width before it is
/// written, so the bits placed on the wire are exactly what decode expects.
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
        9..=32 => Err(Error::NotImplemented { label, bits: bits as u32 }),
        _ => Err(Error::General { label, bits: bits as u32 }),
    }
}

fn field<'a>(record: &'a Record, label: &'static str) -> Result<&'a Value> {
    record.get(label).ok_or(Error::InScript {
        label,
        reason: "field missing from message value",
    })
}

fn expect_uint(record: &Record, label: &'static str) -> Result<u64> {
    field(record, label)?.as_uint().ok_or(Error::InScript {
        label,
        reason: "field is not an integer",
    })
}

fn expect_list<'a>(record: &'a Record, label: &'static str) -> Result<&'a [Value]> {
    field(record, label)?.as_list().ok_or(Error::InScript {
        label,
        reason: "field is not a list",
    })
}

fn resolve_count(record: &Record, count: &Count, label: &'static str) -> Result<u32> {
    match count {
        Count::Fixed(n) => Ok(*n),
        Count::Field(f) => Ok(record.get_uint(f)? as u32),
    }
}

fn check_count_matches(record: &Record, count_field: &'static str, delta: i64, actual: usize, label: &'static str) -> Result<()> {
    if let Ok(declared) = record.get_uint(count_field) {
        if declared as i64 + delta != actual as i64 {
            return Err(Error::InScript {
                label,
                reason: "declared count field does not match the list/array length being encoded",
            });
        }
    }
    Ok(())
}

fn encode_description(
    descr: &'static [Directive],
    bv: &mut BitVector,
    state: &mut CodecState,
    record: &Record,
) -> Result<()> {
    let mut i = 0usize;
    while i < descr.len() {
        let d = &descr[i];
        match d {
            Directive::End => break,

            Directive::Bit { label } => {
                let v = field(record, label)?.as_uint().ok_or(Error::InScript {
                    label,
                    reason: "expected a bit value",
                })?;
                emit(bv, state, 1, v, label)?;
                i += 1;
            }

            Directive::Null => {
                i += 1;
            }

            Directive::UInt { bits, label } => {
                check_uint_width(*bits, label)?;
                let v = expect_uint(record, label)?;
                emit(bv, state, *bits, v, label)?;
                i += 1;
            }

            Directive::UIntOffset { bits, delta, label } => {
                check_uint_width(*bits, label)?;
                let v = expect_uint(record, label)?;
                let raw = truncate_to_width((v as i64).wrapping_sub(*delta), *bits);
                emit(bv, state, *bits, raw, label)?;
                i += 1;
            }

            Directive::UIntLh { bits, label } => {
                if *bits > 8 {
                    return Err(Error::General { label, bits: *bits as u32 });
                }
                let v = expect_uint(record, label)?;
                emit_lh(bv, state, *bits, v, label)?;
                i += 1;
            }

            Directive::UIntArray { bits, count, label } => {
                let list = expect_list(record, label)?;
                let n = resolve_count(record, count, label)?;
                check_array_element_width(*bits, label)?;
                if list.len() != n as usize {
                    return Err(Error::InScript { label, reason: "array length does not match declared count" });
                }
                for elem in list {
                    let v = elem.as_uint().ok_or(Error::InScript { label, reason: "array element is not an integer" })?;
                    emit(bv, state, *bits, v, label)?;
                }
                i += 1;
            }

            Directive::Bitmap { bits, label } => {
                if *bits > 64 {
                    return Err(Error::NotImplemented { label, bits: *bits as u32 });
                }
                let v = expect_uint(record, label)?;
                emit(bv, state, *bits, v, label)?;
                i += 1;
            }

            Directive::Type { descr: sub, label } => {
                let v = field(record, label)?;
                let mut child = state.child();
                encode(sub, bv, &mut child, v)?;
                state.inherit(child);
                i += 1;
            }

            Directive::Choice { alts, label } => {
                encode_choice(alts, bv, state, field(record, label)?, label)?;
                i += 1;
            }

            Directive::Union { k, arms, label } => {
                encode_union(arms, *k, false, bv, state, field(record, label)?, label)?;
                i += 1;
            }

            Directive::UnionLh { k, arms, label } => {
                encode_union(arms, *k, true, bv, state, field(record, label)?, label)?;
                i += 1;
            }

            Directive::Exist { label } => {
                let present = field(record, label)?.as_uint().map(|v| v != 0).unwrap_or(false);
                emit(bv, state, 1, present as u64, label)?;
                if !present {
                    break;
                }
                i += 1;
            }

            Directive::ExistLh { label } => {
                let present = field(record, label)?.as_uint().map(|v| v != 0).unwrap_or(false);
                emit_lh(bv, state, 1, present as u64, label)?;
                if !present {
                    break;
                }
                i += 1;
            }

            Directive::NextExist { skip, or_null, label } => {
                let present = !matches!(record.get(label), Some(Value::Absent) | None);
                if !present && *or_null && state.remaining_bits == 0 {
                    i += skip + 1;
                    continue;
                }
                emit(bv, state, 1, present as u64, label)?;
                i += if present { 1 } else { skip + 1 };
            }

            Directive::NextExistLh { skip, or_null, label } => {
                let present = !matches!(record.get(label), Some(Value::Absent) | None);
                if !present && *or_null && state.remaining_bits == 0 {
                    i += skip + 1;
                    continue;
                }
                emit_lh(bv, state, 1, present as u64, label)?;
                i += if present { 1 } else { skip + 1 };
            }

            Directive::VariableBitmap { delta, count_field, label } => {
                encode_bitmap(bv, state, record, field(record, label)?, *delta, count_field, false, label)?;
                i += 1;
            }

            Directive::VariableBitmap1 { label } => {
                encode_bitmap_to_end(bv, state, field(record, label)?, false, label)?;
                i += 1;
            }

            Directive::LeftAlignedVarBmp { delta, count_field, label } => {
                encode_bitmap(bv, state, record, field(record, label)?, *delta, count_field, true, label)?;
                i += 1;
            }

            Directive::LeftAlignedVarBmp1 { label } => {
                encode_bitmap_to_end(bv, state, field(record, label)?, true, label)?;
                i += 1;
            }

            Directive::VariableArray { delta, count_field, label } => {
                let v = field(record, label)?;
                let octets = match v {
                    Value::Octets(o) => o,
                    _ => return Err(Error::InScript { label, reason: "expected an octet array" }),
                };
                check_count_matches(record, count_field, *delta, octets.len(), label)?;
                if state.remaining_bits < octets.len() as i64 * 8 {
                    return Err(Error::NeedMoreBits { label, position: state.bit_offset });
                }
                for b in octets {
                    emit(bv, state, 8, *b as u64, label)?;
                }
                i += 1;
            }

            Directive::VariableTArray { descr: sub, count_field, label }
            | Directive::VariableTArrayOffset { descr: sub, count_field, label } => {
                let list = expect_list(record, label)?;
                check_count_matches(record, count_field, 0, list.len(), label)?;
                for elem in list {
                    let mut child = state.child();
                    encode(sub, bv, &mut child, elem)?;
                    state.inherit(child);
                }
                i += 1;
            }

            Directive::TypeArray { descr: sub, count, label } => {
                let list = expect_list(record, label)?;
                if list.len() != *count as usize {
                    return Err(Error::InScript { label, reason: "array length does not match fixed count" });
                }
                for elem in list {
                    let mut child = state.child();
                    encode(sub, bv, &mut child, elem)?;
                    state.inherit(child);
                }
                i += 1;
            }

            Directive::RecursiveArray { bits, label } => {
                let list = expect_list(record, label)?;
                for elem in list {
                    let v = elem.as_uint().ok_or(Error::InScript { label, reason: "element is not an integer" })?;
                    emit(bv, state, 1, 1, label)?;
                    emit(bv, state, *bits, v, label)?;
                }
                emit(bv, state, 1, 0, label)?;
                i += 1;
            }

            Directive::RecursiveTArray { descr: sub, label } => {
                let list = expect_list(record, label)?;
                for elem in list {
                    emit(bv, state, 1, 1, label)?;
                    let mut child = state.child();
                    encode(sub, bv, &mut child, elem)?;
                    state.inherit(child);
                }
                emit(bv, state, 1, 0, label)?;
                i += 1;
            }

            Directive::RecursiveTArray1 { descr: sub, label } => {
                encode_recursive_tarray_tagged(sub, bv, state, expect_list(record, label)?, SentinelTag::Standard, label)?;
                i += 1;
            }

            Directive::RecursiveTArray2 { descr: sub, label } => {
                encode_recursive_tarray_tagged(sub, bv, state, expect_list(record, label)?, SentinelTag::Reversed, label)?;
                i += 1;
            }

            Directive::Serialize { func, label } => {
                // Reserve the 7-bit prefix, write the body at the next bit
                // position, then back-patch the prefix with the body's
                // actual bit length.
                let prefix_pos = state.bit_offset as usize;
                if state.remaining_bits < 7 {
                    return Err(Error::NeedMoreBits { label, position: state.bit_offset });
                }
                state.advance(7);
                let body_start = state.bit_offset;
                let mut child = CodecState::encoder(body_start, state.remaining_bits);
                func.encode(bv, &mut child, field(record, label)?)?;
                let body_len = child.bit_offset - body_start;
                if !(0..=127).contains(&body_len) {
                    return Err(Error::General { label, bits: body_len as u32 });
                }
                bv.write_bits(prefix_pos, 7, body_len as u64)?;
                state.bit_offset = child.bit_offset;
                state.remaining_bits = child.remaining_bits;
                i += 1;
            }

            Directive::Fixed { bits, value, label } => {
                emit(bv, state, *bits, *value, label)?;
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
    Ok(())
}

fn encode_bitmap(
    bv: &mut BitVector,
    state: &mut CodecState,
    record: &Record,
    value: &Value,
    delta: i64,
    count_field: &'static str,
    left_aligned: bool,
    label: &'static str,
) -> Result<()> {
    let (bits, len_bits) = match value {
        Value::BitBlob { bits, len_bits } => (bits, *len_bits),
        _ => return Err(Error::InScript { label, reason: "expected a bit blob" }),
    };
    let declared = record.get_uint(count_field)? as i64 + delta;
    if declared != len_bits as i64 {
        return Err(Error::InScript { label, reason: "bitmap length does not match count field" });
    }
    if len_bits == 0 {
        return Ok(());
    }
    if state.remaining_bits < len_bits as i64 {
        return Err(Error::NeedMoreBits { label, position: state.bit_offset });
    }
    if left_aligned {
        write_bitmap_left_aligned(bv, state.bit_offset as usize, len_bits, bits)?;
    } else {
        write_bitmap_right_aligned(bv, state.bit_offset as usize, len_bits, bits)?;
    }
    state.bit_offset += len_bits as i64;
    state.remaining_bits -= len_bits as i64;
    Ok(())
}

fn encode_bitmap_to_end(
    bv: &mut BitVector,
    state: &mut CodecState,
    value: &Value,
    left_aligned: bool,
    label: &'static str,
) -> Result<()> {
    let (bits, len_bits) = match value {
        Value::BitBlob { bits, len_bits } => (bits, *len_bits),
        _ => return Err(Error::InScript { label, reason: "expected a bit blob" }),
    };
    if len_bits as i64 != state.remaining_bits {
        return Err(Error::InScript {
            label,
            reason: "bit blob length does not cover exactly what remains in the message",
        });
    }
    if len_bits == 0 {
        return Ok(());
    }
    if left_aligned {
        write_bitmap_left_aligned(bv, state.bit_offset as usize, len_bits, bits)?;
    } else {
        write_bitmap_right_aligned(bv, state.bit_offset as usize, len_bits, bits)?;
    }
    state.bit_offset += len_bits as i64;
    state.remaining_bits -= len_bits as i64;
    Ok(())
}

fn encode_choice(
    alts: &'static [ChoiceAlt],
    bv: &mut BitVector,
    state: &mut CodecState,
    value: &Value,
    label: &'static str,
) -> Result<()> {
    let (index, inner) = match value {
        Value::Choice { index, value } => (*index, value.as_ref()),
        _ => return Err(Error::InScript { label, reason: "expected a choice value" }),
    };
    let alt = alts.get(index as usize).ok_or(Error::InScript { label, reason: "choice index out of range" })?;
    emit(bv, state, alt.bits, alt.value, label)?;
    let mut child = state.child();
    encode(alt.descr, bv, &mut child, inner)?;
    state.inherit(child);
    Ok(())
}

fn encode_union(
    arms: &'static [UnionArm],
    k: u8,
    lh: bool,
    bv: &mut BitVector,
    state: &mut CodecState,
    value: &Value,
    label: &'static str,
) -> Result<()> {
    let (index, inner) = match value {
        Value::Choice { index, value } => (*index, value.as_ref()),
        _ => return Err(Error::InScript { label, reason: "expected a union value" }),
    };
    if k == 0 || k as usize >= UNION_INDEX_BITS.len() || index >= k {
        return Err(Error::InvalidUnionIndex { label, index, k });
    }
    let bits = UNION_INDEX_BITS[k as usize];
    if lh {
        emit_lh(bv, state, bits, index as u64, label)?;
    } else {
        emit(bv, state, bits, index as u64, label)?;
    }
    let arm = &arms[index as usize];
    encode_union_arm(arm, bv, state, inner)
}

fn encode_union_arm(arm: &UnionArm, bv: &mut BitVector, state: &mut CodecState, value: &Value) -> Result<()> {
    match arm {
        UnionArm::Bit { label } => {
            let v = value.as_uint().ok_or(Error::InScript { label, reason: "expected a bit" })?;
            emit(bv, state, 1, v, label)
        }
        UnionArm::Null => Ok(()),
        UnionArm::UInt { bits, label } => {
            check_uint_width(*bits, label)?;
            let v = value.as_uint().ok_or(Error::InScript { label, reason: "expected an integer" })?;
            emit(bv, state, *bits, v, label)
        }
        UnionArm::UIntOffset { bits, delta, label } => {
            check_uint_width(*bits, label)?;
            let v = value.as_uint().ok_or(Error::InScript { label, reason: "expected an integer" })?;
            let raw = truncate_to_width((v as i64).wrapping_sub(*delta), *bits);
            emit(bv, state, *bits, raw, label)
        }
        UnionArm::UIntLh { bits, label } => {
            if *bits > 8 {
                return Err(Error::General { label, bits: *bits as u32 });
            }
            let v = value.as_uint().ok_or(Error::InScript { label, reason: "expected an integer" })?;
            emit_lh(bv, state, *bits, v, label)
        }
        UnionArm::UIntArray { bits, label, .. } => {
            check_array_element_width(*bits, label)?;
            let list = value.as_list().ok_or(Error::InScript { label, reason: "expected a list" })?;
            for elem in list {
                let v = elem.as_uint().ok_or(Error::InScript { label, reason: "element is not an integer" })?;
                emit(bv, state, *bits, v, label)?;
            }
            Ok(())
        }
        UnionArm::VariableTArray { descr, label, .. } | UnionArm::VariableTArrayOffset { descr, label, .. } => {
            let list = value.as_list().ok_or(Error::InScript { label, reason: "expected a list" })?;
            for elem in list {
                let mut child = state.child();
                encode(descr, bv, &mut child, elem)?;
                state.inherit(child);
            }
            Ok(())
        }
        UnionArm::TypeArray { descr, count, label } => {
            let list = value.as_list().ok_or(Error::InScript { label, reason: "expected a list" })?;
            if list.len() != *count as usize {
                return Err(Error::InScript { label, reason: "array length does not match fixed count" });
            }
            for elem in list {
                let mut child = state.child();
                encode(descr, bv, &mut child, elem)?;
                state.inherit(child);
            }
            Ok(())
        }
        UnionArm::Bitmap { bits, label } => {
            if *bits > 64 {
                return Err(Error::NotImplemented { label, bits: *bits as u32 });
            }
            let v = value.as_uint().ok_or(Error::InScript { label, reason: "expected an integer" })?;
            emit(bv, state, *bits, v, label)
        }
        UnionArm::Type { descr, .. } => {
            let mut child = state.child();
            encode(descr, bv, &mut child, value)?;
            state.inherit(child);
            Ok(())
        }
    }
}

fn encode_recursive_tarray_tagged(
    sub: &'static [Directive],
    bv: &mut BitVector,
    state: &mut CodecState,
    list: &[Value],
    tag: SentinelTag,
    label: &'static str,
) -> Result<()> {
    let (cont, end) = match tag {
        SentinelTag::Standard => (1u64, 0u64),
        SentinelTag::Reversed => (0u64, 1u64),
    };
    let n = list.len();
    for (idx, elem) in list.iter().enumerate() {
        let mut child = state.child();
        encode(sub, bv, &mut child, elem)?;
        state.inherit(child);
        if idx + 1 < n {
            emit(bv, state, 1, cont, label)?;
        }
    }
    emit(bv, state, 1, end, label)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::directive::Directive::*;

    #[test]
    fn round_trips_single_bit() {
        static DESCR: &[Directive] = &[Bit { label: "b" }, End];
        let mut record = Record::new();
        record.push("b", Value::Bit(true));
        let msg = Value::Struct(record);

        let mut buf = [0u8; 1];
        let mut state = CodecState::encoder(0, 8);
        {
            let mut bv = BitVector::new(&mut buf);
            encode(DESCR, &mut bv, &mut state, &msg).unwrap();
        }
        assert_eq!(buf[0], 0b1000_0000);

        let bv = BitVector::new(&mut buf);
        let mut dstate = CodecState::decoder(0, 8);
        let decoded = decode(DESCR, &bv, &mut dstate).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn union_offset_round_trips_through_decoder() {
        use crate::directive::Directive;
        static ARMS: &[UnionArm] = &[UnionArm::UIntOffset { bits: 16, delta: -10, label: "v" }];
        static DESCR: &[Directive] = &[Directive::Union { k: 1, arms: ARMS, label: "u" }, Directive::End];
        let mut record = Record::new();
        record.push("u", Value::Choice { index: 0, value: Box::new(Value::UInt(42)) });
        let msg = Value::Struct(record);

        let mut buf = [0u8; 4];
        let mut state = CodecState::encoder(0, 32);
        {
            let mut bv = BitVector::new(&mut buf);
            encode(DESCR, &mut bv, &mut state, &msg).unwrap();
        }

        let bv = BitVector::new(&mut buf);
        let mut dstate = CodecState::decoder(0, 32);
        let decoded = decode(DESCR, &bv, &mut dstate).unwrap();
        assert_eq!(decoded, msg);
    }
}
