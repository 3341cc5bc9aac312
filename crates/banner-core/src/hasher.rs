//! Deterministic bucketing.
use sha2::{Digest, Sha256};

/// Map a `(salt, subject)` pair onto a bucket in `[0, 100)`.
///
/// The bucket is `floor(h / 2^32 * 100)` where `h` is the leading 32 bits of
/// `SHA-256(salt || ':' || subject)` read big-endian. Identical input yields
/// an identical bucket on every process, every platform, forever; this is
/// the only determinism primitive used by percentage rollouts and variant
/// assignment.
pub fn bucket(salt: &str, subject: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(subject.as_bytes());
    let digest = hasher.finalize();
    let h = u32::from_be_bytes(digest[0..4].try_into().unwrap());
    // Exact integer form of floor(h / 2^32 * 100).
    ((h as u64 * 100) >> 32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_known_values() {
        // Pinned fixtures; a change here is a wire-breaking change for every
        // subject already assigned.
        assert_eq!(bucket("checkout", "alice"), 6);
        assert_eq!(bucket("checkout", "bob"), 14);
        assert_eq!(bucket("checkout", "carol"), 95);
        assert_eq!(bucket("checkout:variant", "bob"), 19);
        assert_eq!(bucket("checkout:variant", "c"), 83);
        assert_eq!(bucket("", ""), 90);
    }

    #[test]
    fn test_bucket_is_stable() {
        for subject in ["u1", "u2", "a-long-subject-identifier", "ünïcode"] {
            assert_eq!(bucket("salt", subject), bucket("salt", subject));
        }
    }

    #[test]
    fn test_bucket_range() {
        for i in 0..10_000 {
            let b = bucket("range_check", &format!("subject-{}", i));
            assert!(b < 100, "bucket {} out of range", b);
        }
    }

    #[test]
    fn test_salt_separates_distributions() {
        // The same subject should land in unrelated buckets under different
        // salts for at least some inputs.
        let differs = (0..100).any(|i| {
            let s = format!("subject-{}", i);
            bucket("salt_a", &s) != bucket("salt_b", &s)
        });
        assert!(differs);
    }

    #[test]
    fn test_bucket_uniformity() {
        // 100k subjects; each of the 100 buckets expects 1000 hits. The
        // loose 25% tolerance still catches any real skew (e.g. an
        // endianness or truncation mistake).
        let mut counts = [0u32; 100];
        for i in 0..100_000 {
            counts[bucket("uniformity", &format!("id-{}", i)) as usize] += 1;
        }
        for (bucket, &count) in counts.iter().enumerate() {
            assert!(
                (750..=1250).contains(&count),
                "bucket {} has skewed count {}",
                bucket,
                count
            );
        }
    }
}
