//! Scrape configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// How a collector that reports no data is treated.
///
/// `Transient` keeps the collector running and records a round failure, for
/// hosts where the counter object appears late. `Permanent` retires the
/// collector on the first no-data round, for hosts where the feature is
/// simply not installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoDataPolicy {
    #[default]
    Transient,
    Permanent,
}

impl fmt::Display for NoDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoDataPolicy::Transient => "transient",
            NoDataPolicy::Permanent => "permanent",
        })
    }
}

impl FromStr for NoDataPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transient" => Ok(NoDataPolicy::Transient),
            "permanent" => Ok(NoDataPolicy::Permanent),
            other => Err(format!(
                "unknown no-data policy '{}', expected 'transient' or 'permanent'",
                other
            )),
        }
    }
}

/// Upper bound of a scraper-announced timeout.
pub const MAX_ANNOUNCED_TIMEOUT: Duration = Duration::from_secs(3600);

/// Timing and failure policy of scrape rounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeConfig {
    /// Round deadline when the scraper does not announce its own timeout.
    pub default_timeout: Duration,
    /// Subtracted from an announced scraper timeout to leave room for
    /// rendering and transfer.
    pub timeout_margin: Duration,
    pub no_data_policy: NoDataPolicy,
    /// How long shutdown waits for busy collectors before closing the rest.
    pub shutdown_grace: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            timeout_margin: Duration::from_millis(500),
            no_data_policy: NoDataPolicy::Transient,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ScrapeConfig {
    /// Deadline of one round given the scraper's announced timeout in
    /// seconds, if any.
    ///
    /// The margin is only subtracted when it leaves a positive budget.
    /// Announced values are capped at [`MAX_ANNOUNCED_TIMEOUT`].
    pub fn effective_timeout(&self, announced_secs: Option<f64>) -> Duration {
        let Some(announced) = announced_secs
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
        else {
            return self.default_timeout;
        };
        let announced = announced.min(MAX_ANNOUNCED_TIMEOUT);
        announced
            .checked_sub(self.timeout_margin)
            .filter(|d| !d.is_zero())
            .unwrap_or(announced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_policy_parse() {
        assert_eq!("permanent".parse::<NoDataPolicy>(), Ok(NoDataPolicy::Permanent));
        assert_eq!("Transient".parse::<NoDataPolicy>(), Ok(NoDataPolicy::Transient));
        assert!("sometimes".parse::<NoDataPolicy>().is_err());
        assert_eq!(NoDataPolicy::default().to_string(), "transient");
    }

    #[test]
    fn test_effective_timeout() {
        let config = ScrapeConfig::default();
        assert_eq!(config.effective_timeout(None), Duration::from_secs(10));
        assert_eq!(config.effective_timeout(Some(5.0)), Duration::from_millis(4500));
        // Margin larger than the budget is ignored.
        assert_eq!(config.effective_timeout(Some(0.2)), Duration::from_millis(200));
        assert_eq!(config.effective_timeout(Some(-1.0)), Duration::from_secs(10));
        assert_eq!(config.effective_timeout(Some(f64::NAN)), Duration::from_secs(10));
    }

    #[test]
    fn test_huge_announced_timeout_is_capped() {
        let config = ScrapeConfig::default();
        let capped = MAX_ANNOUNCED_TIMEOUT - config.timeout_margin;
        assert_eq!(config.effective_timeout(Some(1e30)), capped);
        assert_eq!(config.effective_timeout(Some(f64::MAX)), capped);
        assert_eq!(config.effective_timeout(Some(f64::INFINITY)), Duration::from_secs(10));
    }
}
