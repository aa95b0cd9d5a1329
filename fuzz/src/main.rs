use afl::*;

use csn1_codec::directive::Directive::*;
use csn1_codec::{decode, BitVector, CodecState, Directive};

/// A grammar chosen to touch most directive families in one pass: plain and
/// offset/L/H integers, a fixed marker, an optional group, and a recursive
/// array - the combination most likely to expose an interpreter bug on
/// arbitrary or truncated bytes.
static GRAMMAR: &[Directive] = &[
    Bit { label: "flag" },
    UIntOffset { bits: 8, delta: -16, label: "offset_field" },
    UIntLh { bits: 5, label: "lh_field" },
    Fixed { bits: 2, value: 0b11, label: "marker" },
    NextExist { skip: 1, or_null: false, label: "group_present" },
    UInt { bits: 6, label: "group_field" },
    RecursiveArray { bits: 3, label: "tail" },
    End,
];

fn main() {
    fuzz!(|data: &[u8]| {
        let mut buf = data.to_vec();
        let bv = BitVector::new(&mut buf);
        let mut state = CodecState::decoder(0, bv.len_bits() as i64);
        // Must never panic, regardless of input: either a clean Value tree
        // or a typed error.
        let _ = decode(GRAMMAR, &bv, &mut state);
    })
}
