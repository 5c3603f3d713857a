//! Median of per-node spend values
//!
//! The median tolerates a minority of outlier or misreporting nodes. It
//! bounds the error only while a simple majority of the redundant node set
//! reports honestly; it is not a byzantine agreement.

use rust_decimal::Decimal;

/// Median of the given values, `None` when empty
///
/// Odd counts return the middle element; even counts return the mean of the
/// two middle elements. The mean never overflows: when the sum does not fit,
/// it is taken as `lo + (hi - lo) / 2`. `None` is also returned if neither
/// form is representable.
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let (lo, hi) = (sorted[mid - 1], sorted[mid]);
        lo.checked_add(hi)
            .map(|sum| sum / Decimal::TWO)
            .or_else(|| {
                hi.checked_sub(lo)
                    .and_then(|gap| lo.checked_add(gap / Decimal::TWO))
            })
    }
}
