use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Serialize;

use crate::error::IntervalError;

/// How a file's coverage relates to a query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    /// The window holds the whole file.
    Within,
    /// The file and the window share at least one instant.
    Overlapping,
    Outside,
}

/// Closed time range `[start, finish]` whose endpoints share one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    #[serde(serialize_with = "serialize_zone")]
    zone: FixedOffset,
    start: DateTime<FixedOffset>,
    finish: DateTime<FixedOffset>,
}

fn serialize_zone<S: serde::Serializer>(zone: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&zone.to_string())
}

impl Interval {
    /// Build an interval in `zone` from two instants given in any zone.
    pub fn new<Tz: TimeZone>(
        zone: FixedOffset,
        start: Option<DateTime<Tz>>,
        finish: Option<DateTime<Tz>>,
    ) -> Result<Self, IntervalError> {
        let start = start.ok_or(IntervalError::MissingStart)?.with_timezone(&zone);
        let finish = finish.ok_or(IntervalError::MissingFinish)?.with_timezone(&zone);
        Self::checked(zone, start, finish)
    }

    /// Build an interval from two zoned timestamps that must carry the same zone.
    pub fn between(
        start: Option<DateTime<FixedOffset>>,
        finish: Option<DateTime<FixedOffset>>,
    ) -> Result<Self, IntervalError> {
        let start = start.ok_or(IntervalError::MissingStart)?;
        let finish = finish.ok_or(IntervalError::MissingFinish)?;
        if start.offset() != finish.offset() {
            return Err(IntervalError::ZoneMismatch {
                start: start.offset().to_string(),
                finish: finish.offset().to_string(),
            });
        }
        Self::checked(*start.offset(), start, finish)
    }

    fn checked(
        zone: FixedOffset,
        start: DateTime<FixedOffset>,
        finish: DateTime<FixedOffset>,
    ) -> Result<Self, IntervalError> {
        if start > finish {
            return Err(IntervalError::StartAfterFinish {
                start: start.to_rfc3339(),
                finish: finish.to_rfc3339(),
            });
        }
        Ok(Interval { zone, start, finish })
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn finish(&self) -> DateTime<FixedOffset> {
        self.finish
    }

    /// Same instants, expressed in `zone`.
    pub fn with_zone(&self, zone: FixedOffset) -> Interval {
        if zone == self.zone {
            return *self;
        }
        Interval {
            zone,
            start: self.start.with_timezone(&zone),
            finish: self.finish.with_timezone(&zone),
        }
    }

    pub fn contains_instant<Tz: TimeZone>(&self, point: &DateTime<Tz>) -> bool {
        let point = point.with_timezone(&self.zone);
        self.start <= point && point <= self.finish
    }

    pub fn contains(&self, other: &Interval) -> bool {
        let other = other.with_zone(self.zone);
        other.start >= self.start && other.finish <= self.finish
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        let other = other.with_zone(self.zone);
        self.contains(&other) || (self.start <= other.finish && other.start <= self.finish)
    }

    /// Classify this interval (a file's coverage) against a query window.
    pub fn classify(&self, window: &Interval) -> Coverage {
        if window.contains(self) {
            Coverage::Within
        } else if window.overlaps(self) {
            Coverage::Overlapping
        } else {
            Coverage::Outside
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.finish.to_rfc3339())
    }
}
