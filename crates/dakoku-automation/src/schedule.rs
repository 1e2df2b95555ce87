//! Attendance schedule and the per-site time encodings.

use std::fmt;

use chrono::NaiveDate;
use dakoku_config::{parse_hhmm, ScheduleConfig};

use crate::error::AutomationError;
use crate::step::PunchKind;

/// A wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    /// Parse a 24-hour `HH:MM` string.
    pub fn parse(value: &str) -> Result<Self, AutomationError> {
        let minutes =
            parse_hhmm(value).ok_or_else(|| AutomationError::InvalidTime(value.to_string()))?;
        Ok(Self {
            hour: minutes / 60,
            minute: minutes % 60,
        })
    }

    /// `HHMM`, as the Jobcan correction form expects.
    pub fn jobcan(&self) -> String {
        format!("{:02}{:02}", self.hour, self.minute)
    }

    /// `H:MM` with the hour's leading zero dropped, as the workflow form expects.
    pub fn chat(&self) -> String {
        format!("{}:{:02}", self.hour, self.minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Start and end of the working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceSchedule {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl AttendanceSchedule {
    pub fn parse(start: &str, end: &str) -> Result<Self, AutomationError> {
        Ok(Self {
            start: ClockTime::parse(start)?,
            end: ClockTime::parse(end)?,
        })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, AutomationError> {
        Self::parse(&config.start, &config.end)
    }

    pub fn time_for(&self, kind: PunchKind) -> ClockTime {
        match kind {
            PunchKind::Start => self.start,
            PunchKind::End => self.end,
        }
    }
}

/// `YYYY/MM/DD`, as the workflow form expects.
pub fn workflow_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}
