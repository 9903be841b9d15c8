/// Align `value` down to the nearest multiple of `alignment`.
/// If `alignment` is zero, the input is returned unchanged.
#[inline(always)]
pub const fn align_down_u32(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    value & !(alignment - 1)
}

/// Align `value` up to the nearest multiple of `alignment`.
/// If `alignment` is zero, the input is returned unchanged.
#[inline(always)]
pub const fn align_up_u32(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    let adjusted = value.saturating_add(alignment - 1);
    adjusted & !(alignment - 1)
}

#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    value & !(alignment - 1)
}

#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    let adjusted = value.saturating_add(alignment - 1);
    adjusted & !(alignment - 1)
}

#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    alignment == 0 || value & (alignment - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_alignment() {
        assert_eq!(align_up_u32(0x10_1234, 0x1000), 0x10_2000);
        assert_eq!(align_up_u32(0x10_2000, 0x1000), 0x10_2000);
        assert_eq!(align_down_u32(0x10_1FFF, 0x1000), 0x10_1000);
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_down(7, 0), 7);
        assert!(is_aligned(0x3000, 0x1000));
        assert!(!is_aligned(0x3004, 0x1000));
    }
}
