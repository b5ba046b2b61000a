//! Usage severity classification against configurable warn/critical thresholds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse usage-health tier derived from percent-used.
///
/// Only equality is meaningful; the tiers are never compared by order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    Unknown,
    Ok,
    Warning,
    Critical,
}

impl SeverityLevel {
    /// Upper-case label used in reports and notifications.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Percent-used thresholds. Loaded from the `[thresholds]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Usage at or above this percent is WARNING.
    pub warn_pct: u8,
    /// Usage at or above this percent is CRITICAL.
    pub critical_pct: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn_pct: 85,
            critical_pct: 95,
        }
    }
}

impl Thresholds {
    /// Map a percent-used reading to its severity tier.
    ///
    /// `None` (unparseable probe) and anything above 100 are `Unknown`.
    #[must_use]
    pub fn classify(&self, percent: Option<u8>) -> SeverityLevel {
        match percent {
            None => SeverityLevel::Unknown,
            Some(pct) if pct > 100 => SeverityLevel::Unknown,
            Some(pct) if pct >= self.critical_pct => SeverityLevel::Critical,
            Some(pct) if pct >= self.warn_pct => SeverityLevel::Warning,
            Some(_) => SeverityLevel::Ok,
        }
    }

    /// Whether a reading is at or above the warn threshold.
    #[must_use]
    pub fn is_alerting(&self, percent: Option<u8>) -> bool {
        matches!(
            self.classify(percent),
            SeverityLevel::Warning | SeverityLevel::Critical
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries_follow_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.classify(Some(0)), SeverityLevel::Ok);
        assert_eq!(t.classify(Some(84)), SeverityLevel::Ok);
        assert_eq!(t.classify(Some(85)), SeverityLevel::Warning);
        assert_eq!(t.classify(Some(94)), SeverityLevel::Warning);
        assert_eq!(t.classify(Some(95)), SeverityLevel::Critical);
        assert_eq!(t.classify(Some(100)), SeverityLevel::Critical);
        assert_eq!(t.classify(Some(101)), SeverityLevel::Unknown);
        assert_eq!(t.classify(None), SeverityLevel::Unknown);
    }

    #[test]
    fn custom_thresholds_move_the_bands() {
        let t = Thresholds {
            warn_pct: 70,
            critical_pct: 80,
        };
        assert_eq!(t.classify(Some(69)), SeverityLevel::Ok);
        assert_eq!(t.classify(Some(70)), SeverityLevel::Warning);
        assert_eq!(t.classify(Some(80)), SeverityLevel::Critical);
    }

    #[test]
    fn labels_are_uppercase() {
        assert_eq!(SeverityLevel::Warning.to_string(), "WARNING");
        assert_eq!(
            serde_json::to_string(&SeverityLevel::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }

    proptest! {
        #[test]
        fn classification_partitions_every_reading(pct in 0u8..=255) {
            let t = Thresholds::default();
            let level = t.classify(Some(pct));
            let expected = if pct > 100 {
                SeverityLevel::Unknown
            } else if pct >= 95 {
                SeverityLevel::Critical
            } else if pct >= 85 {
                SeverityLevel::Warning
            } else {
                SeverityLevel::Ok
            };
            prop_assert_eq!(level, expected);
            prop_assert_eq!(t.is_alerting(Some(pct)), (85..=100).contains(&pct));
        }
    }
}
