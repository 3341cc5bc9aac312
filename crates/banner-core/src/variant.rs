//! Weighted variant assignment

use crate::hasher::bucket;
use crate::snapshot::VariantSnapshot;

/// Salt suffix separating variant buckets from percentage-rollout buckets of
/// the same flag.
const VARIANT_SALT_SUFFIX: &str = ":variant";

/// Deterministically assign a variant to `subject`.
///
/// Variants are walked in position order accumulating weight; the subject's
/// bucket picks the first variant whose cumulative share exceeds it. The
/// walk is drift-free: changing one weight shifts only the subjects whose
/// buckets fall inside the moved boundary region.
///
/// Returns `default` when no variants exist, the first variant when the
/// total weight is zero.
pub fn assign<'a>(
    flag_key: &str,
    variants: &'a [VariantSnapshot],
    subject: &str,
    default: Option<&'a str>,
) -> Option<&'a str> {
    let Some(first) = variants.first() else {
        return default;
    };

    let total: u64 = variants.iter().map(|v| v.weight as u64).sum();
    if total == 0 {
        return Some(&first.key);
    }

    let salt = format!("{}{}", flag_key, VARIANT_SALT_SUFFIX);
    let b = bucket(&salt, subject) as u64;

    let mut accumulated: u64 = 0;
    for variant in variants {
        accumulated += variant.weight as u64;
        // b < 100 * accumulated / total, kept in integers
        if b * total < accumulated * 100 {
            return Some(&variant.key);
        }
    }

    // Numeric edge: the walk completed without covering the bucket.
    variants.last().map(|v| v.key.as_str())
}
