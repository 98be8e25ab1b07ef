use std::convert::TryInto;

/// Borrow 4 bytes at `offset` as an array reference
///
/// Panics if `i` does not hold at least `offset + 4` bytes; callers check lengths first.
#[inline]
pub(crate) fn array_ref4(i: &[u8], offset: usize) -> &[u8; 4] {
    i[offset..offset + 4]
        .try_into()
        .expect("slice of length 4")
}

/// Convert a nanosecond timestamp fraction to microseconds
#[inline]
pub(crate) fn nanos_to_micros(frac: u32) -> u32 {
    frac / 1_000
}
