//! The caller-facing message representation.
//!
//! The reference engine addresses fields by byte offset into an opaque
//! struct; this implementation takes the tagged-variant-tree option
//! discussed in the redesign notes instead (no unsafe, no offset/width
//! bookkeeping to get wrong). `Value` mirrors the shape of whatever
//! description produced or will produce it, and `Record` is the ordered,
//! label-addressed field list a `TYPE`/`UNION` level decodes into.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `BIT`.
    Bit(bool),
    /// `UINT`, `UINT_OFFSET`, `UINT_LH`, a `RECURSIVE_ARRAY` element.
    UInt(u64),
    /// `BITMAP`.
    Bitmap(u64),
    /// `VARIABLE_ARRAY`: a plain octet array.
    Octets(Vec<u8>),
    /// `VARIABLE_BITMAP` / `LEFT_ALIGNED_VAR_BMP`: a bit-length-tagged octet
    /// blob, since the length need not be a multiple of 8.
    BitBlob { bits: Vec<u8>, len_bits: u32 },
    /// `UINT_ARRAY`, `TYPE_ARRAY`, `VARIABLE_TARRAY`, `RECURSIVE_ARRAY`,
    /// `RECURSIVE_TARRAY*`: a homogeneous list.
    List(Vec<Value>),
    /// `TYPE`, and the body of a `CHOICE`/`UNION` alternative.
    Struct(Record),
    /// `CHOICE` / `UNION` / `UNION_LH`: the selected alternative's index and
    /// decoded payload.
    Choice { index: u8, value: Box<Value> },
    /// `EXIST` / `NEXT_EXIST` groups that were not present.
    Absent,
    /// `NULL`.
    Null,
}

impl Value {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) | Value::Bitmap(v) => Some(*v),
            Value::Bit(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Record> {
        match self {
            Value::Struct(r) => Some(r),
            _ => None,
        }
    }
}

/// An ordered, label-addressed field list: the decoded/to-be-encoded body
/// of one description level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(Vec<(&'static str, Value)>);

impl Record {
    pub fn new() -> Self {
        Record(Vec::new())
    }

    pub fn push(&mut self, label: &'static str, value: Value) {
        self.0.push((label, value));
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.0.iter().find(|(l, _)| *l == label).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(&'static str, Value)] {
        &self.0
    }

    /// Look up a sibling field already decoded/queued at this level and
    /// read it as an unsigned integer, for count-field cross-references
    /// (`VARIABLE_ARRAY`, `VARIABLE_BITMAP`, `VARIABLE_TARRAY`).
    pub fn get_uint(&self, label: &'static str) -> Result<u64> {
        self.get(label)
            .and_then(Value::as_uint)
            .ok_or(Error::InScript {
                label,
                reason: "count field missing or not an integer",
            })
    }
}
