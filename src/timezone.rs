/// POSIX TZ rule strings, e.g. `IST-2IDT,M3.4.4/26,M10.5.0`
///
/// Supported form: `STD offset [DST [offset] [,start[/time],end[/time]]]` where
/// start/end use the `Mm.w.d` notation. Transition hours may run from -167 to
/// 167 as in the POSIX extension, so `/26` means 02:00 on the following day.
use thiserror::Error;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const SECS_PER_HOUR: i32 = 3600;
const DEFAULT_TRANSITION_SECS: i32 = 2 * SECS_PER_HOUR;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TzParseError {
    #[error("missing or invalid zone name at {0:?}")]
    Name(String),
    #[error("missing or invalid offset at {0:?}")]
    Offset(String),
    #[error("invalid transition rule {0:?} (only Mm.w.d is supported)")]
    Rule(String),
    #[error("unexpected trailing input {0:?}")]
    Trailing(String),
}

/// Day selected by `Mm.w.d`: weekday `d` (0 = Sunday) of week `w` (5 = last) in month `m`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    month: Month,
    week: u8,
    weekday: u8,
    /// Seconds after local midnight
    at_secs: i32,
}

impl Transition {
    fn date_in(&self, year: i32) -> Option<Date> {
        let first = Date::from_calendar_date(year, self.month, 1).ok()?;
        let first_weekday = first.weekday().number_days_from_sunday();
        let offset = (7 + self.weekday - first_weekday) % 7;
        let mut date = first + Duration::days(i64::from(offset) + 7 * i64::from(self.week - 1));
        // Week 5 means the last such weekday, which may be the 4th
        while date.month() != self.month {
            date -= Duration::weeks(1);
        }
        Some(date)
    }

    /// UTC instant of this transition in `year`, given the offset in force before it
    fn utc_instant(&self, year: i32, offset_before: UtcOffset) -> Option<OffsetDateTime> {
        let date = self.date_in(year)?;
        let local = PrimitiveDateTime::new(date, Time::MIDNIGHT)
            + Duration::seconds(i64::from(self.at_secs));
        Some(local.assume_offset(offset_before).to_offset(UtcOffset::UTC))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DstRule {
    offset: UtcOffset,
    start: Transition,
    end: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzRule {
    std_name: String,
    std_offset: UtcOffset,
    dst_name: Option<String>,
    dst: Option<DstRule>,
}

impl TzRule {
    pub fn utc() -> Self {
        TzRule {
            std_name: "UTC".to_string(),
            std_offset: UtcOffset::UTC,
            dst_name: None,
            dst: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, TzParseError> {
        let mut cursor = Cursor { rest: input.trim() };

        let std_name = cursor.name()?;
        let std_offset = cursor.offset()?;

        if cursor.rest.is_empty() {
            return Ok(TzRule {
                std_name,
                std_offset,
                dst_name: None,
                dst: None,
            });
        }

        let dst_name = cursor.name()?;
        let dst_offset = if cursor.rest.is_empty() || cursor.rest.starts_with(',') {
            offset_from_secs(std_offset.whole_seconds() + SECS_PER_HOUR)?
        } else {
            cursor.offset()?
        };

        // A DST name without rules has no usable transitions; treat it as fixed standard time
        if cursor.rest.is_empty() {
            return Ok(TzRule {
                std_name,
                std_offset,
                dst_name: Some(dst_name),
                dst: None,
            });
        }

        cursor.expect(',')?;
        let start = cursor.transition()?;
        cursor.expect(',')?;
        let end = cursor.transition()?;

        if !cursor.rest.is_empty() {
            return Err(TzParseError::Trailing(cursor.rest.to_string()));
        }

        Ok(TzRule {
            std_name,
            std_offset,
            dst_name: Some(dst_name),
            dst: Some(DstRule {
                offset: dst_offset,
                start,
                end,
            }),
        })
    }

    /// Offset in force at `instant`
    pub fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        let Some(dst) = self.dst else {
            return self.std_offset;
        };
        let utc = instant.to_offset(UtcOffset::UTC);
        let year = utc.year();

        let (Some(start), Some(end)) = (
            dst.start.utc_instant(year, self.std_offset),
            dst.end.utc_instant(year, dst.offset),
        ) else {
            return self.std_offset;
        };

        let in_dst = if start < end {
            start <= utc && utc < end
        } else {
            // Southern hemisphere: DST spans the new year
            !(end <= utc && utc < start)
        };

        if in_dst {
            dst.offset
        } else {
            self.std_offset
        }
    }

    pub fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.offset_at(instant))
    }

    /// Zone abbreviation in force at `instant`
    pub fn name_at(&self, instant: OffsetDateTime) -> &str {
        match (&self.dst_name, self.dst) {
            (Some(name), Some(dst)) if self.offset_at(instant) == dst.offset => name,
            _ => &self.std_name,
        }
    }
}

fn offset_from_secs(secs: i32) -> Result<UtcOffset, TzParseError> {
    UtcOffset::from_whole_seconds(secs).map_err(|_| TzParseError::Offset(secs.to_string()))
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        head
    }

    fn expect(&mut self, c: char) -> Result<(), TzParseError> {
        match self.rest.strip_prefix(c) {
            Some(tail) => {
                self.rest = tail;
                Ok(())
            }
            None => Err(TzParseError::Rule(self.rest.to_string())),
        }
    }

    fn name(&mut self) -> Result<String, TzParseError> {
        let at = self.rest;
        let name = if let Some(tail) = self.rest.strip_prefix('<') {
            // Quoted form such as <+03>
            let end = tail.find('>').ok_or_else(|| TzParseError::Name(at.to_string()))?;
            self.rest = &tail[end + 1..];
            &tail[..end]
        } else {
            self.take_while(|c| c.is_ascii_alphabetic())
        };
        if name.len() < 3 {
            return Err(TzParseError::Name(at.to_string()));
        }
        Ok(name.to_string())
    }

    /// `[+|-]hh[:mm[:ss]]` as seconds
    fn hms(&mut self, max_hours: i32) -> Option<i32> {
        let negative = if let Some(tail) = self.rest.strip_prefix('-') {
            self.rest = tail;
            true
        } else {
            if let Some(tail) = self.rest.strip_prefix('+') {
                self.rest = tail;
            }
            false
        };

        let hours: i32 = self.take_while(|c| c.is_ascii_digit()).parse().ok()?;
        if hours > max_hours {
            return None;
        }
        let mut secs = hours * SECS_PER_HOUR;
        for unit in [60, 1] {
            if let Some(tail) = self.rest.strip_prefix(':') {
                self.rest = tail;
                let part: i32 = self.take_while(|c| c.is_ascii_digit()).parse().ok()?;
                if part > 59 {
                    return None;
                }
                secs += part * unit;
            } else {
                break;
            }
        }
        Some(if negative { -secs } else { secs })
    }

    fn offset(&mut self) -> Result<UtcOffset, TzParseError> {
        let at = self.rest;
        let secs = self
            .hms(24)
            .ok_or_else(|| TzParseError::Offset(at.to_string()))?;
        // POSIX offsets are west-positive
        offset_from_secs(-secs).map_err(|_| TzParseError::Offset(at.to_string()))
    }

    fn transition(&mut self) -> Result<Transition, TzParseError> {
        let at = self.rest;
        let bad = || TzParseError::Rule(at.to_string());

        self.expect('M').map_err(|_| bad())?;
        let month: u8 = self
            .take_while(|c| c.is_ascii_digit())
            .parse()
            .map_err(|_| bad())?;
        self.expect('.').map_err(|_| bad())?;
        let week: u8 = self
            .take_while(|c| c.is_ascii_digit())
            .parse()
            .map_err(|_| bad())?;
        self.expect('.').map_err(|_| bad())?;
        let weekday: u8 = self
            .take_while(|c| c.is_ascii_digit())
            .parse()
            .map_err(|_| bad())?;

        let month = Month::try_from(month).map_err(|_| bad())?;
        if !(1..=5).contains(&week) || weekday > 6 {
            return Err(bad());
        }

        let at_secs = if let Some(tail) = self.rest.strip_prefix('/') {
            self.rest = tail;
            self.hms(167).ok_or_else(bad)?
        } else {
            DEFAULT_TRANSITION_SECS
        };

        Ok(Transition {
            month,
            week,
            weekday,
            at_secs,
        })
    }
}
