use time::{macros::date, Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Start of window numbering. Window keys count hours/days/months from here.
const EPOCH: Date = date!(2000-01-01);
const LAST_YEAR: i32 = 2099;

/// History granularity, one ring per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Granularity {
    Hours,
    Days,
    Months,
}

impl Granularity {
    /// Finest to coarsest, the order rollovers cascade in.
    pub const ALL: [Granularity; 3] = [Granularity::Hours, Granularity::Days, Granularity::Months];

    /// Total slots including the reserved header slot at index 0.
    pub const fn slots(self) -> usize {
        match self {
            Granularity::Hours => 48 + 1,
            Granularity::Days => 14 + 1,
            Granularity::Months => 24 + 1,
        }
    }

    pub const fn live_slots(self) -> usize {
        self.slots() - 1
    }

    pub const fn file_name(self) -> &'static str {
        match self {
            Granularity::Hours => "RINGhours.csv",
            Granularity::Days => "RINGdays.csv",
            Granularity::Months => "RINGmonths.csv",
        }
    }

    /// Column title of the label field; its length is also the label length.
    pub const fn label_column(self) -> &'static str {
        match self {
            Granularity::Hours => "YYMMDDHH",
            Granularity::Days => "YYMMDD",
            Granularity::Months => "YYMM",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Granularity::Hours => "hours",
            Granularity::Days => "days",
            Granularity::Months => "months",
        }
    }

    /// Window key of the local wall-clock time `at`.
    ///
    /// Returns `None` outside 2000..=2099, which in practice means the clock
    /// has not been set yet.
    pub fn window_of(self, at: OffsetDateTime) -> Option<u32> {
        self.window_of_parts(at.date(), at.hour())
    }

    fn window_of_parts(self, date: Date, hour: u8) -> Option<u32> {
        if date.year() > LAST_YEAR {
            return None;
        }
        let days = u32::try_from(date.to_julian_day() - EPOCH.to_julian_day()).ok()?;
        Some(match self {
            Granularity::Hours => days * 24 + u32::from(hour),
            Granularity::Days => days,
            Granularity::Months => {
                (date.year() - EPOCH.year()) as u32 * 12 + u32::from(u8::from(date.month())) - 1
            }
        })
    }

    /// Local wall-clock time at which window `key` opens.
    pub fn window_start(self, key: u32) -> Option<PrimitiveDateTime> {
        let (date, hour) = match self {
            Granularity::Hours => (day_from_epoch(key / 24)?, (key % 24) as u8),
            Granularity::Days => (day_from_epoch(key)?, 0),
            Granularity::Months => {
                let year = EPOCH.year() + i32::try_from(key / 12).ok()?;
                let month = Month::try_from((key % 12) as u8 + 1).ok()?;
                (Date::from_calendar_date(year, month, 1).ok()?, 0)
            }
        };
        if date.year() > LAST_YEAR {
            return None;
        }
        Some(PrimitiveDateTime::new(date, Time::from_hms(hour, 0, 0).ok()?))
    }

    /// Human label of a window, e.g. `24101813` for hour 13 on 2024-10-18.
    pub fn label_text(self, key: u32) -> Option<String> {
        let start = self.window_start(key)?;
        let yy = start.year() % 100;
        let mm = u8::from(start.month());
        Some(match self {
            Granularity::Hours => format!("{yy:02}{mm:02}{:02}{:02}", start.day(), start.hour()),
            Granularity::Days => format!("{yy:02}{mm:02}{:02}", start.day()),
            Granularity::Months => format!("{yy:02}{mm:02}"),
        })
    }

    /// Inverse of [`Granularity::label_text`].
    pub fn parse_label(self, text: &str) -> Option<u32> {
        let text = text.trim();
        if text.len() != self.label_column().len() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let num = |range: std::ops::Range<usize>| text[range].parse::<u8>().ok();

        let year = 2000 + i32::from(num(0..2)?);
        let month = Month::try_from(num(2..4)?).ok()?;
        let (day, hour) = match self {
            Granularity::Hours => (num(4..6)?, num(6..8)?),
            Granularity::Days => (num(4..6)?, 0),
            Granularity::Months => (1, 0),
        };
        if hour > 23 {
            return None;
        }
        let date = Date::from_calendar_date(year, month, day).ok()?;
        self.window_of_parts(date, hour)
    }
}

fn day_from_epoch(days: u32) -> Option<Date> {
    let days = i32::try_from(days).ok()?;
    Date::from_julian_day(EPOCH.to_julian_day().checked_add(days)?).ok()
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hours" | "hour" => Ok(Granularity::Hours),
            "days" | "day" => Ok(Granularity::Days),
            "months" | "month" => Ok(Granularity::Months),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}
