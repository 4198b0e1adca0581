/// Smallest index `i` with `buf[i] >= value`.
///
/// Returns `0` when `buf[0] >= value` and clamps to `buf.len() - 1` when no element qualifies.
/// `buf` must be sorted non-decreasing. An empty slice yields `0`.
pub fn lower_bound_clamped(buf: &[i64], value: i64) -> usize {
    let n = buf.len();
    if n == 0 {
        return 0;
    }
    if buf[0] >= value {
        return 0;
    }
    let i = buf.partition_point(|&v| v < value);
    i.min(n - 1)
}

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

pub(crate) fn unit_to_u8(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
