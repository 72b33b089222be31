//! Dotted version comparison for peer software versions.

use std::cmp::Ordering;

/// Compare two dotted versions component by component, numerically.
///
/// Missing or non-numeric components count as zero, so `"1.2"` equals
/// `"1.2.0"` and `"1.10.0"` is newer than `"1.2.0"`.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .filter(|part| !part.is_empty())
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };

    let left = parse(left);
    let right = parse(right);
    let len = left.len().max(right.len());

    (0..len)
        .map(|i| {
            let a = left.get(i).copied().unwrap_or(0);
            let b = right.get(i).copied().unwrap_or(0);
            a.cmp(&b)
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
