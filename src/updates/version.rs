//! Version parsing and comparison.
//!
//! Release tags are untrusted input, so parsing never fails: anything that
//! is not a dotted numeric version becomes an opaque [`Version`] that can
//! only be compared for equality against its raw text.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Version of the running updraft build.
///
/// Embedding applications pass their own version to
/// [`UpdateSession::new`](super::UpdateSession::new) instead.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Up to three numeric segments, an ignored fourth (revision) segment, and an
// ignored pre-release/build suffix.
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.\d+)?(?:[-+][0-9A-Za-z.+-]*)?$").unwrap()
});

/// A parsed `major.minor.patch` version, or an opaque string that did not parse.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    triple: Option<[u64; 3]>,
}

impl Version {
    /// Parse a version string. Never fails.
    ///
    /// Surrounding whitespace and a single leading `v`/`V` are ignored.
    /// Missing segments default to 0.
    ///
    /// ```
    /// use updraft::updates::Version;
    ///
    /// assert_eq!(Version::parse("v2.3.1"), Version::parse("2.3.1"));
    /// assert_eq!(Version::parse("1.4").triple(), Some((1, 4, 0)));
    /// assert!(!Version::parse("nightly").is_numeric());
    /// ```
    pub fn parse(input: &str) -> Self {
        let text = strip_tag_prefix(input).to_string();
        let triple = VERSION_PATTERN.captures(&text).and_then(|caps| {
            let mut parts = [0u64; 3];
            for (i, part) in parts.iter_mut().enumerate() {
                if let Some(m) = caps.get(i + 1) {
                    *part = m.as_str().parse().ok()?;
                }
            }
            Some(parts)
        });
        Self { text, triple }
    }

    /// The numeric triple, if the input parsed.
    pub fn triple(&self) -> Option<(u64, u64, u64)> {
        self.triple.map(|[a, b, c]| (a, b, c))
    }

    /// Whether the input parsed as a numeric version.
    pub fn is_numeric(&self) -> bool {
        self.triple.is_some()
    }

    /// The input with whitespace and any `v` prefix removed.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Numeric comparison.
    ///
    /// Returns `None` when either side did not parse, unless the raw strings
    /// are identical.
    pub fn compare(&self, other: &Version) -> Option<Ordering> {
        match (self.triple, other.triple) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self.text == other.text => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Remove surrounding whitespace and one leading `v` or `V` from a tag.
pub fn strip_tag_prefix(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix(['v', 'V']).unwrap_or(tag)
}

/// How an update decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonBasis {
    /// Both versions parsed; the numeric triples were compared.
    Numeric,
    /// At least one version did not parse; only string inequality was checked.
    ///
    /// This cannot tell newer from older, so a rollback published as the
    /// latest release is also reported as an update.
    Textual,
}

/// Result of comparing the latest published version with the running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateDecision {
    /// Whether the latest version should be offered.
    pub available: bool,
    /// How the decision was reached.
    pub basis: ComparisonBasis,
}

/// Decide whether `latest` is an update over `current`.
pub fn is_newer_version(latest: &Version, current: &Version) -> UpdateDecision {
    match (latest.triple, current.triple) {
        (Some(l), Some(c)) => UpdateDecision {
            available: l > c,
            basis: ComparisonBasis::Numeric,
        },
        _ => UpdateDecision {
            available: latest.text != current.text,
            basis: ComparisonBasis::Textual,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn newer(latest: &str, current: &str) -> bool {
        is_newer_version(&Version::parse(latest), &Version::parse(current)).available
    }

    #[test]
    fn version_constant_exists() {
        assert!(!VERSION.is_empty());
        assert!(Version::parse(VERSION).is_numeric());
    }

    #[test]
    fn parse_strips_v_prefix() {
        assert_eq!(Version::parse("v2.3.1"), Version::parse("2.3.1"));
        assert_eq!(Version::parse("V2.3.1"), Version::parse("2.3.1"));
        assert_eq!(Version::parse(" v2.3.1 ").as_str(), "2.3.1");
    }

    #[test]
    fn parse_defaults_missing_segments() {
        assert_eq!(Version::parse("2").triple(), Some((2, 0, 0)));
        assert_eq!(Version::parse("1.1").triple(), Some((1, 1, 0)));
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
    }

    #[test]
    fn parse_ignores_revision_and_suffix() {
        assert_eq!(Version::parse("1.2.3.4").triple(), Some((1, 2, 3)));
        assert_eq!(Version::parse("1.2.3-beta.1").triple(), Some((1, 2, 3)));
        assert_eq!(Version::parse("1.2.3+build.7").triple(), Some((1, 2, 3)));
    }

    #[test]
    fn unparsable_input_is_opaque() {
        for input in ["", "abc", "1..2", "1.2.3.4.5", "release-7", "99999999999999999999999"] {
            let v = Version::parse(input);
            assert!(!v.is_numeric(), "{input:?} should not parse");
        }
    }

    #[test]
    fn opaque_versions_compare_by_text() {
        let a = Version::parse("nightly");
        assert_eq!(a, Version::parse("nightly"));
        assert_ne!(a, Version::parse("beta"));
        assert_eq!(a.compare(&Version::parse("beta")), None);
        assert_eq!(a.compare(&Version::parse("1.0.0")), None);
        assert_ne!(a, Version::parse("1.0.0"));
    }

    #[test]
    fn compare_is_lexicographic_over_triple() {
        let ordered = ["0.0.1", "0.1.0", "0.1.9", "0.2.0", "1.0.0", "1.9.9", "2.0.0", "10.0.0"];
        for (i, a) in ordered.iter().enumerate() {
            for (j, b) in ordered.iter().enumerate() {
                let got = Version::parse(a).compare(&Version::parse(b));
                assert_eq!(got, Some(i.cmp(&j)), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn compare_is_antisymmetric_and_transitive() {
        let samples: Vec<Version> = ["1.0", "1.0.1", "0.9.9", "2", "1.10.0", "1.9.0"]
            .iter()
            .map(|s| Version::parse(s))
            .collect();

        for a in &samples {
            assert_eq!(a.compare(a), Some(Ordering::Equal));
            for b in &samples {
                let ab = a.compare(b).unwrap();
                let ba = b.compare(a).unwrap();
                assert_eq!(ab, ba.reverse());
                for c in &samples {
                    if a < b && b < c {
                        assert!(a < c);
                    }
                }
            }
        }
    }

    #[test]
    fn is_newer_version_basic() {
        assert!(newer("0.2.0", "0.1.0"));
        assert!(newer("1.0.0", "0.9.0"));
        assert!(newer("0.1.1", "0.1.0"));
        assert!(newer("1.4.0", "1.3.9"));
    }

    #[test]
    fn is_newer_version_same_or_older() {
        assert!(!newer("0.1.0", "0.1.0"));
        assert!(!newer("1.0", "1.0.0"));
        assert!(!newer("0.1.0", "0.2.0"));
        assert!(!newer("0.9.0", "1.0.0"));
    }

    #[test]
    fn is_newer_version_major_bump() {
        assert!(newer("2.0.0", "1.9.9"));
        assert!(newer("10.0.0", "9.99.99"));
    }

    #[test]
    fn numeric_decision_reports_basis() {
        let decision = is_newer_version(&Version::parse("v1.4.0"), &Version::parse("1.3.9"));
        assert!(decision.available);
        assert_eq!(decision.basis, ComparisonBasis::Numeric);
    }

    #[test]
    fn unparsable_falls_back_to_inequality() {
        let decision = is_newer_version(&Version::parse("nightly-2024"), &Version::parse("1.0.0"));
        assert!(decision.available);
        assert_eq!(decision.basis, ComparisonBasis::Textual);

        let same = is_newer_version(&Version::parse("nightly"), &Version::parse("nightly"));
        assert!(!same.available);
        assert_eq!(same.basis, ComparisonBasis::Textual);
    }

    #[test]
    fn display_uses_stripped_text() {
        assert_eq!(Version::parse("v1.4.0").to_string(), "1.4.0");
        assert_eq!(Version::parse("nightly").to_string(), "nightly");
    }
}
