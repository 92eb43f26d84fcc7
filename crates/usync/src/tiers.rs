//! graduated pricing tiers
//!
//! Many prices are tiered: "first 1 000 requests, next 9 000 requests, everything over 10 000".
//! [calculate_tier_buckets] splits a quantity into the amount that falls into each tier.
use rust_decimal::Decimal;

/// Split `quantity` into tier buckets
///
/// `boundaries` are cumulative upper bounds, `[1000, 10000]` describes the tiers
/// `0..1000`, `1000..10000` and an implicit last tier for everything over `10000`.
/// The result always has `boundaries.len() + 1` buckets and sums up to `quantity`.
/// Negative quantities count as zero.
///
/// ```
/// # use rust_decimal::Decimal;
/// # use usync::tiers::calculate_tier_buckets;
/// let buckets = calculate_tier_buckets(Decimal::from(50_000), &[1_000, 10_000, 100_000]);
/// assert_eq!(buckets, [1_000, 9_000, 40_000, 0].map(Decimal::from));
/// ```
pub fn calculate_tier_buckets(quantity: Decimal, boundaries: &[u64]) -> Vec<Decimal> {
    let quantity = quantity.max(Decimal::ZERO);

    let mut buckets = Vec::with_capacity(boundaries.len() + 1);
    let mut allocated = Decimal::ZERO;

    for boundary in boundaries {
        let upper = quantity.min(Decimal::from(*boundary));
        let bucket = (upper - allocated).max(Decimal::ZERO);
        allocated += bucket;
        buckets.push(bucket);
    }

    buckets.push(quantity - allocated);
    buckets
}
