use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::PriojobError;

/// Dispatch precedence of a queued job.
///
/// Higher levels are dispatched first. The set is closed: raw values coming
/// from outside the crate (integers, config strings) are validated through
/// [`TryFrom<i32>`] and [`FromStr`], and anything unknown is rejected with
/// [`PriojobError::InvalidPriority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum JobPriority {
    VeryLow = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    VeryHigh = 4,
}

impl JobPriority {
    /// Number of priority levels.
    pub const COUNT: usize = 5;

    /// All levels in dispatch order (highest first).
    pub const DESCENDING: [JobPriority; JobPriority::COUNT] = [
        JobPriority::VeryHigh,
        JobPriority::High,
        JobPriority::Normal,
        JobPriority::Low,
        JobPriority::VeryLow,
    ];

    /// Index of this level in a per-level table (0 = `VeryLow`).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobPriority::VeryLow => "very_low",
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
            JobPriority::VeryHigh => "very_high",
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for JobPriority {
    type Error = PriojobError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(JobPriority::VeryLow),
            1 => Ok(JobPriority::Low),
            2 => Ok(JobPriority::Normal),
            3 => Ok(JobPriority::High),
            4 => Ok(JobPriority::VeryHigh),
            other => Err(PriojobError::InvalidPriority(format!(
                "{other} (expected an integer in 0..=4)"
            ))),
        }
    }
}

impl FromStr for JobPriority {
    type Err = PriojobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalised.as_str() {
            "very_low" | "verylow" => Ok(JobPriority::VeryLow),
            "low" => Ok(JobPriority::Low),
            "normal" => Ok(JobPriority::Normal),
            "high" => Ok(JobPriority::High),
            "very_high" | "veryhigh" => Ok(JobPriority::VeryHigh),
            _ => Err(PriojobError::InvalidPriority(format!(
                "{s:?} (expected \"very_low\", \"low\", \"normal\", \"high\" or \"very_high\")"
            ))),
        }
    }
}

impl TryFrom<String> for JobPriority {
    type Error = PriojobError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
