/// Direction a [`CodecState`] is being driven in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Decode,
    Encode,
}

/// Running bit cursor and remaining-bits budget for one decode/encode call.
///
/// Invariant: `remaining_bits >= 0` at every directive boundary; `bit_offset`
/// only ever advances within a single call (there is no rewinding cursor
/// anywhere in this engine - see `src/lh.rs` for why `CHOICE` and `UNION_LH`
/// don't need one either).
#[derive(Debug, Clone, Copy)]
pub struct CodecState {
    pub remaining_bits: i64,
    pub bit_offset: i64,
    pub direction: Direction,
}

impl CodecState {
    pub fn new(bit_offset: i64, remaining_bits: i64, direction: Direction) -> Self {
        CodecState {
            remaining_bits,
            bit_offset,
            direction,
        }
    }

    pub fn decoder(bit_offset: i64, remaining_bits: i64) -> Self {
        Self::new(bit_offset, remaining_bits, Direction::Decode)
    }

    pub fn encoder(bit_offset: i64, remaining_bits: i64) -> Self {
        Self::new(bit_offset, remaining_bits, Direction::Encode)
    }

    /// A child state for recursing into a sub-description: same cursor and
    /// budget, which the caller inherits back on successful return.
    pub fn child(&self) -> Self {
        *self
    }

    pub fn inherit(&mut self, child: CodecState) {
        self.bit_offset = child.bit_offset;
        self.remaining_bits = child.remaining_bits;
    }

    pub fn advance(&mut self, n: u8) {
        self.bit_offset += n as i64;
        self.remaining_bits -= n as i64;
    }
}
