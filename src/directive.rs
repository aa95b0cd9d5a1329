//! The tagged-variant description model (§4.1 of the grammar this engine
//! interprets). Each variant exposes exactly the fields its kind needs;
//! there is no opaque payload pointer to reinterpret.

use crate::bitvector::BitVector;
use crate::error::Result;
use crate::state::CodecState;
use crate::value::Value;

/// How many elements an array-like directive carries.
#[derive(Debug, Clone, Copy)]
pub enum Count {
    /// The count is a literal in the grammar (`TYPE_ARRAY`, `UINT_ARRAY`
    /// with a fixed count).
    Fixed(u32),
    /// The count was decoded earlier into the named sibling field
    /// (`UINT_ARRAY` with count-by-reference, `VARIABLE_TARRAY`).
    Field(&'static str),
}

/// One alternative of a `CHOICE` directive: a literal bit pattern to try,
/// and the sub-description to recurse into on a match.
#[derive(Debug, Clone, Copy)]
pub struct ChoiceAlt {
    pub bits: u8,
    pub value: u64,
    pub descr: &'static [Directive],
    pub label: &'static str,
}

/// The restricted subset of directive kinds legal as a `UNION`/`UNION_LH`
/// arm. The reference engine enforces this subset by falling into the same
/// switch as the outer interpreter; here it is a closed type instead.
#[derive(Debug, Clone, Copy)]
pub enum UnionArm {
    Bit { label: &'static str },
    Null,
    UInt { bits: u8, label: &'static str },
    UIntOffset {
        bits: u8,
        delta: i64,
        label: &'static str,
    },
    UIntLh { bits: u8, label: &'static str },
    UIntArray {
        bits: u8,
        count: Count,
        label: &'static str,
    },
    VariableTArray {
        descr: &'static [Directive],
        count_field: &'static str,
        label: &'static str,
    },
    VariableTArrayOffset {
        descr: &'static [Directive],
        count_field: &'static str,
        label: &'static str,
    },
    TypeArray {
        descr: &'static [Directive],
        count: u32,
        label: &'static str,
    },
    Bitmap { bits: u8, label: &'static str },
    Type {
        descr: &'static [Directive],
        label: &'static str,
    },
}

impl UnionArm {
    pub fn label(&self) -> &'static str {
        match self {
            UnionArm::Bit { label }
            | UnionArm::UInt { label, .. }
            | UnionArm::UIntOffset { label, .. }
            | UnionArm::UIntLh { label, .. }
            | UnionArm::UIntArray { label, .. }
            | UnionArm::VariableTArray { label, .. }
            | UnionArm::VariableTArrayOffset { label, .. }
            | UnionArm::TypeArray { label, .. }
            | UnionArm::Bitmap { label, .. }
            | UnionArm::Type { label, .. } => label,
            UnionArm::Null => "null",
        }
    }
}

/// Contract for the `SERIALIZE` directive's per-type body codec.
///
/// The engine reserves a 7-bit length prefix and hands the serializer the
/// state positioned right after it; on encode the engine back-patches the
/// prefix once the serializer reports how many bits it wrote.
pub trait Serializer: Send + Sync {
    fn decode(&self, bv: &BitVector, state: &mut CodecState) -> Result<Value>;
    fn encode(&self, bv: &mut BitVector, state: &mut CodecState, value: &Value) -> Result<()>;
}

/// Whether a recursive array's sentinel tag means "one more element follows".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelTag {
    /// `1` continues, `0` ends (the default, used by `RECURSIVE_ARRAY`,
    /// `RECURSIVE_TARRAY`, `RECURSIVE_TARRAY_1`).
    Standard,
    /// `0` continues, `1` ends (`RECURSIVE_TARRAY_2`, local to that one
    /// directive - never inherited state).
    Reversed,
}

#[derive(Clone, Copy)]
pub enum Directive {
    Bit {
        label: &'static str,
    },
    Null,
    UInt {
        bits: u8,
        label: &'static str,
    },
    UIntOffset {
        bits: u8,
        delta: i64,
        label: &'static str,
    },
    UIntLh {
        bits: u8,
        label: &'static str,
    },
    UIntArray {
        bits: u8,
        count: Count,
        label: &'static str,
    },
    Bitmap {
        bits: u8,
        label: &'static str,
    },
    Type {
        descr: &'static [Directive],
        label: &'static str,
    },
    Choice {
        alts: &'static [ChoiceAlt],
        label: &'static str,
    },
    Union {
        k: u8,
        arms: &'static [UnionArm],
        label: &'static str,
    },
    UnionLh {
        k: u8,
        arms: &'static [UnionArm],
        label: &'static str,
    },
    Exist {
        label: &'static str,
    },
    ExistLh {
        label: &'static str,
    },
    /// `skip` counts the directives immediately following this one that are
    /// part of the optional group.
    NextExist {
        skip: usize,
        or_null: bool,
        label: &'static str,
    },
    NextExistLh {
        skip: usize,
        or_null: bool,
        label: &'static str,
    },
    VariableBitmap {
        delta: i64,
        count_field: &'static str,
        label: &'static str,
    },
    /// Consumes the rest of the message; `count_field` is unused (kept for
    /// symmetry with the reference grammar's macro shape).
    VariableBitmap1 {
        label: &'static str,
    },
    LeftAlignedVarBmp {
        delta: i64,
        count_field: &'static str,
        label: &'static str,
    },
    LeftAlignedVarBmp1 {
        label: &'static str,
    },
    VariableArray {
        delta: i64,
        count_field: &'static str,
        label: &'static str,
    },
    VariableTArray {
        descr: &'static [Directive],
        count_field: &'static str,
        label: &'static str,
    },
    VariableTArrayOffset {
        descr: &'static [Directive],
        count_field: &'static str,
        label: &'static str,
    },
    TypeArray {
        descr: &'static [Directive],
        count: u32,
        label: &'static str,
    },
    RecursiveArray {
        bits: u8,
        label: &'static str,
    },
    RecursiveTArray {
        descr: &'static [Directive],
        label: &'static str,
    },
    RecursiveTArray1 {
        descr: &'static [Directive],
        label: &'static str,
    },
    RecursiveTArray2 {
        descr: &'static [Directive],
        label: &'static str,
    },
    Serialize {
        func: &'static dyn Serializer,
        label: &'static str,
    },
    Fixed {
        bits: u8,
        value: u64,
        label: &'static str,
    },
    Callback {
        label: &'static str,
    },
    TrapError {
        code: i16,
        label: &'static str,
    },
    End,
}

impl Directive {
    pub fn label(&self) -> &'static str {
        match self {
            Directive::Bit { label }
            | Directive::UInt { label, .. }
            | Directive::UIntOffset { label, .. }
            | Directive::UIntLh { label, .. }
            | Directive::UIntArray { label, .. }
            | Directive::Bitmap { label, .. }
            | Directive::Type { label, .. }
            | Directive::Choice { label, .. }
            | Directive::Union { label, .. }
            | Directive::UnionLh { label, .. }
            | Directive::Exist { label }
            | Directive::ExistLh { label }
            | Directive::NextExist { label, .. }
            | Directive::NextExistLh { label, .. }
            | Directive::VariableBitmap { label, .. }
            | Directive::VariableBitmap1 { label }
            | Directive::LeftAlignedVarBmp { label, .. }
            | Directive::LeftAlignedVarBmp1 { label }
            | Directive::VariableArray { label, .. }
            | Directive::VariableTArray { label, .. }
            | Directive::VariableTArrayOffset { label, .. }
            | Directive::TypeArray { label, .. }
            | Directive::RecursiveArray { label, .. }
            | Directive::RecursiveTArray { label, .. }
            | Directive::RecursiveTArray1 { label, .. }
            | Directive::RecursiveTArray2 { label, .. }
            | Directive::Serialize { label, .. }
            | Directive::Fixed { label, .. }
            | Directive::Callback { label }
            | Directive::TrapError { label, .. } => label,
            Directive::Null => "null",
            Directive::End => "<end>",
        }
    }
}

/// Number of index bits needed to select among `k` union alternatives.
/// `{0,1,1,2,2,3,3,3,4,4,4,4,4,4,4,4,5}` for `k` in `[0,16]`.
pub const UNION_INDEX_BITS: [u8; 17] = [0, 1, 1, 2, 2, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5];
