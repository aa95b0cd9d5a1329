//! Decodes a small hand-written grammar mixing `UNION` and `CHOICE` against
//! a literal byte buffer, with tracing enabled so the per-directive log
//! lines are visible.

use csn1_codec::directive::Directive::*;
use csn1_codec::directive::{ChoiceAlt, UnionArm};
use csn1_codec::{decode, BitVector, CodecState, Directive};

// UNION of two alternatives: a bare bit, or a 4-bit integer. Index bits = 1.
static UNION_ARMS: &[UnionArm] = &[
    UnionArm::Bit { label: "short_form" },
    UnionArm::UInt { bits: 4, label: "long_form" },
];

// CHOICE between a "small report" and a "large report", discriminated by a
// 2-bit literal prefix.
static SMALL_REPORT: &[Directive] = &[UInt { bits: 3, label: "code" }, End];
static LARGE_REPORT: &[Directive] = &[
    UInt { bits: 3, label: "code" },
    Union { k: 2, arms: UNION_ARMS, label: "detail" },
    End,
];
static CHOICE_ALTS: &[ChoiceAlt] = &[
    ChoiceAlt { bits: 2, value: 0b00, descr: SMALL_REPORT, label: "small" },
    ChoiceAlt { bits: 2, value: 0b01, descr: LARGE_REPORT, label: "large" },
];

static GRAMMAR: &[Directive] = &[Choice { alts: CHOICE_ALTS, label: "report" }, End];

fn main() {
    env_logger::init();

    // 01 (choice = large), 101 (code = 5), 1 (union index -> long_form),
    // 1010 (long_form = 10).
    let mut data = [0b0110_1110u8, 0b1000_0000u8];
    let bv = BitVector::new(&mut data);
    let mut state = CodecState::decoder(0, 16);

    let msg = decode(GRAMMAR, &bv, &mut state).expect("well-formed fixture");
    println!("decoded: {msg:?}");
    println!("bits consumed: {}", state.bit_offset);
}
