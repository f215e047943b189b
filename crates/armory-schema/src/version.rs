//! Version comparison for update detection.
//!
//! Armory versions are free-form strings, usually `v1.2.3`. Numeric dotted
//! components are compared as numbers so `v10.0.0` sorts after `v9.0.0`; a
//! release without a suffix is newer than the same release with one
//! (`1.0.0` > `1.0.0-beta`). Strings with no numeric components at all
//! fall back to byte-wise comparison.

use std::cmp::Ordering;

fn split(version: &str) -> (Vec<u64>, &str) {
    let v = version.trim().trim_start_matches(['v', 'V']);
    let (core, suffix) = match v.find(['-', '+']) {
        Some(i) => (&v[..i], &v[i..]),
        None => (v, ""),
    };
    let parts = core
        .split('.')
        .map_while(|s| s.parse::<u64>().ok())
        .collect();
    (parts, suffix)
}

/// Total order over version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a_parts, a_suffix) = split(a);
    let (b_parts, b_suffix) = split(b);

    if a_parts.is_empty() && b_parts.is_empty() {
        return a.cmp(b);
    }

    for i in 0..a_parts.len().max(b_parts.len()) {
        let av = a_parts.get(i).copied().unwrap_or(0);
        let bv = b_parts.get(i).copied().unwrap_or(0);
        match av.cmp(&bv) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    match (a_suffix.is_empty(), b_suffix.is_empty()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => a_suffix.cmp(b_suffix),
    }
}

/// Returns true if `candidate` is newer than `current`.
pub fn is_newer(current: &str, candidate: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer() {
        assert!(is_newer("0.9.0", "1.0.0"));
        assert!(is_newer("v0.0.4", "v0.0.5"));
        assert!(is_newer("v1.2.3", "v1.3.0"));
        assert!(!is_newer("v1.2.3", "v1.2.3"));
        assert!(!is_newer("1.11.5", "1.10.4"));
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert!(is_newer("9.0.0", "10.0.0"));
        assert!(!is_newer("10.0.0", "9.0.0"));
    }

    #[test]
    fn test_prerelease() {
        assert!(is_newer("1.0.0-beta", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0-beta"));
        assert!(is_newer("1.0.0-beta.1", "1.0.0-beta.2"));
    }

    #[test]
    fn test_non_numeric_falls_back_to_string_order() {
        assert!(is_newer("alpha", "beta"));
        assert!(!is_newer("beta", "alpha"));
    }

    #[test]
    fn test_missing_components_are_zero() {
        assert_eq!(compare("1.0", "1.0.0"), Ordering::Equal);
        assert!(is_newer("1.0", "1.0.1"));
    }
}
