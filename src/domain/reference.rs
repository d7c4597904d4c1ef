//! Recovery of identifiers from noisy client input.
//!
//! Everything here is pure string work: no lookups, no allocation beyond the
//! extracted identifier itself.

use super::violation::ViolationId;
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

/// Prefix of the legacy numeric reference form (`OVR100`).
pub const LEGACY_PREFIX: &str = "OVR";
/// Digits in the dashed reference form (`LPC-000123`).
pub const DASHED_DIGITS: usize = 6;
const LEGACY_MAX_DIGITS: usize = 12;

/// Hyphenated UUID anywhere, or a 32-digit simple UUID that is not part of a
/// longer hex run (any window of such a run would parse).
static VIOLATION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<hyphenated>[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})|(?:^|[^0-9a-f])(?P<simple>[0-9a-f]{32})(?:[^0-9a-f]|$)",
    )
    .expect("violation id pattern is valid")
});

/// Three letters, an optional dash, then the whole digit run. Applied to
/// uppercased input.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<prefix>[A-Z]{3})-?(?P<digits>[0-9]+)").expect("reference pattern is valid")
});

/// Extracts the first well-formed internal identifier anywhere in `input`.
///
/// Accepts the hyphenated UUID form and the 32-digit simple form.
pub fn extract_violation_id(input: &str) -> Option<ViolationId> {
    VIOLATION_ID.captures_iter(input).find_map(|caps| {
        let candidate = caps.name("hyphenated").or_else(|| caps.name("simple"))?;
        Uuid::parse_str(candidate.as_str()).ok().map(ViolationId)
    })
}

/// Extracts the first reference number in `input` and returns its canonical form.
///
/// Two shapes are recognised after uppercasing:
/// * legacy numeric: `OVR` followed by digits, canonical `OVR200`
///   (a dash after the prefix is tolerated: `ovr-200` -> `OVR200`);
/// * dashed: three letters, optional dash, exactly six digits, canonical
///   `LPC-000123` (`lpc000123` -> `LPC-000123`).
pub fn extract_reference(input: &str) -> Option<String> {
    let upper = input.to_ascii_uppercase();
    REFERENCE.captures_iter(&upper).find_map(|caps| {
        let prefix = &caps["prefix"];
        let digits = &caps["digits"];
        if prefix == LEGACY_PREFIX {
            (digits.len() <= LEGACY_MAX_DIGITS).then(|| format!("{prefix}{digits}"))
        } else {
            (digits.len() == DASHED_DIGITS).then(|| format!("{prefix}-{digits}"))
        }
    })
}

/// Uppercase alphanumerics only, used to compare references loosely.
pub fn alphanumeric_key(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Length of the longest common substring of `a` and `b`.
pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for &ca in a {
        let mut curr = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                curr[j + 1] = prev[j] + 1;
                best = best.max(curr[j + 1]);
            }
        }
        prev = curr;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6f1c2a9e-3b4d-4e5f-8a7b-1c2d3e4f5a6b";

    #[test]
    fn test_extract_id_with_noise() {
        let expected = ViolationId(Uuid::parse_str(ID).unwrap());
        assert_eq!(extract_violation_id(ID), Some(expected));
        assert_eq!(
            extract_violation_id(&format!("  id: {ID}\n")),
            Some(expected)
        );
        assert_eq!(
            extract_violation_id(&format!("{ID}{ID}")),
            Some(expected),
            "accidental concatenation keeps the first"
        );
    }

    #[test]
    fn test_extract_id_simple_form() {
        let simple = ID.replace('-', "");
        let expected = ViolationId(Uuid::parse_str(ID).unwrap());
        assert_eq!(
            extract_violation_id(&format!("ref={simple};")),
            Some(expected)
        );
        // 33 hex digits is ambiguous
        assert_eq!(extract_violation_id(&format!("a{simple}")), None);
    }

    #[test]
    fn test_extract_id_rejects_garbage() {
        assert_eq!(extract_violation_id(""), None);
        assert_eq!(extract_violation_id("OVR100"), None);
        assert_eq!(extract_violation_id("6f1c2a9e-3b4d-4e5f-8a7b"), None);
        assert_eq!(extract_violation_id("ünïcödé 6f1c"), None);
    }

    #[test]
    fn test_extract_legacy_reference() {
        assert_eq!(extract_reference("OVR100").as_deref(), Some("OVR100"));
        assert_eq!(extract_reference("  ovr-200extra").as_deref(), Some("OVR200"));
        assert_eq!(extract_reference("ref:ovr42").as_deref(), Some("OVR42"));
        assert_eq!(extract_reference("refovr42").as_deref(), Some("OVR42"));
    }

    #[test]
    fn test_extract_dashed_reference() {
        assert_eq!(extract_reference("LPC-000123").as_deref(), Some("LPC-000123"));
        assert_eq!(extract_reference("lpc000123 ").as_deref(), Some("LPC-000123"));
        assert_eq!(
            extract_reference("ticket #abc-123456, thanks").as_deref(),
            Some("ABC-123456")
        );
        // truncated dashed references are not guessed
        assert_eq!(extract_reference("LPC-00012"), None);
        assert_eq!(extract_reference("LPC-0001234"), None);
        assert_eq!(
            extract_reference("OVR1234567890123 then lpc000123").as_deref(),
            Some("LPC-000123")
        );
    }

    #[test]
    fn test_extract_reference_none() {
        assert_eq!(extract_reference(""), None);
        assert_eq!(extract_reference("hello world"), None);
        assert_eq!(extract_reference("12345"), None);
    }

    #[test]
    fn test_longest_common_substring() {
        assert_eq!(longest_common_substring("LPC000123", "LPC000123"), 9);
        assert_eq!(longest_common_substring("00012", "LPC000123"), 5);
        assert_eq!(longest_common_substring("XYZ", "LPC000123"), 0);
        assert_eq!(longest_common_substring("", "LPC"), 0);
    }

    #[test]
    fn test_alphanumeric_key() {
        assert_eq!(alphanumeric_key(" lpc-000 123 "), "LPC000123");
    }
}
