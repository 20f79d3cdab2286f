use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Break,
}

/// Phase lengths for one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    /// Every n-th completed work phase is followed by a long break.
    #[serde(default = "default_pomodoros_before_long_break")]
    pub pomodoros_before_long_break: u32,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_pomodoros_before_long_break() -> u32 {
    4
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            pomodoros_before_long_break: default_pomodoros_before_long_break(),
        }
    }
}

impl TimerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("work_minutes", self.work_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
            ("pomodoros_before_long_break", self.pomodoros_before_long_break),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn work_secs(&self) -> u64 {
        u64::from(self.work_minutes) * 60
    }

    pub fn short_break_secs(&self) -> u64 {
        u64::from(self.short_break_minutes) * 60
    }

    pub fn long_break_secs(&self) -> u64 {
        u64::from(self.long_break_minutes) * 60
    }

    /// Length of the break that follows the `completed`-th work phase
    /// (1-based, i.e. the count after incrementing).
    pub fn break_secs_after(&self, completed: u32) -> u64 {
        if completed > 0 && completed % self.pomodoros_before_long_break == 0 {
            self.long_break_secs()
        } else {
            self.short_break_secs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fourth_break_is_long() {
        let cfg = TimerConfig::default();
        let lengths: Vec<u64> = (1..=8).map(|n| cfg.break_secs_after(n)).collect();
        assert_eq!(lengths, vec![300, 300, 300, 900, 300, 300, 300, 900]);
    }

    #[test]
    fn validate_rejects_zero_fields() {
        let cfg = TimerConfig {
            pomodoros_before_long_break: 0,
            ..TimerConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(TimerConfig::default().validate().is_ok());
    }
}
