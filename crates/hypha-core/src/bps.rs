// crates/hypha-core/src/bps.rs
//
// Fixed-point basis-point arithmetic.
//
// Every percentage in the engine (quality scores, slash rates, reporter
// rewards and penalties) is an integer on a 0..=10_000 scale, i.e. a
// percentage with two implied decimal digits. All products go through u128
// so intermediate values cannot overflow, and every division truncates.

/// The basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Upper bound of an oracle-supplied quality score (100.00%).
pub const MAX_QUALITY_SCORE: u64 = 10_000;

/// Compute `floor(a * b / c)` without intermediate overflow.
///
/// Returns 0 when `c` is 0. The result saturates at `u64::MAX`, which can
/// only happen when `b > c`.
pub fn mul_div(a: u64, b: u64, c: u64) -> u64 {
    if c == 0 {
        return 0;
    }
    let wide = (a as u128) * (b as u128) / (c as u128);
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Take `bps` basis points of `amount`, truncating.
///
/// `bps` above 10_000 is clamped, so the result never exceeds `amount`.
pub fn apply_bps(amount: u64, bps: u64) -> u64 {
    mul_div(amount, bps.min(BPS_DENOMINATOR), BPS_DENOMINATOR)
}

/// Express `part / whole` in basis points, truncating. Zero when `whole` is zero.
pub fn ratio_bps(part: u64, whole: u64) -> u64 {
    mul_div(part.min(whole), BPS_DENOMINATOR, whole)
}
