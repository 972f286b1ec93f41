use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

pub const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const WEEKLY_PREFIX: &str = "WeeklyMoodMelody";
const DAILY_PREFIX: &str = "DailyMoodMelody";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekDay {
    pub date: NaiveDate,
    pub name: &'static str,
}

impl WeekDay {
    pub fn label(&self) -> String {
        short_label(self.date)
    }
}

/// A Monday to Sunday calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Week {
    monday: NaiveDate,
}

impl Week {
    pub fn containing(date: NaiveDate) -> Self {
        let back = i64::from(date.weekday().num_days_from_monday());
        Self { monday: date - Duration::days(back) }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// Moves the week by whole weeks; negative values go back in time.
    pub fn offset(self, weeks: i64) -> Self {
        Self { monday: self.monday + Duration::days(weeks * 7) }
    }

    pub fn previous(self) -> Self {
        self.offset(-1)
    }

    pub fn next(self) -> Self {
        self.offset(1)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.monday
    }

    pub fn last_day(&self) -> NaiveDate {
        self.monday + Duration::days(6)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.first_day()..=self.last_day()).contains(&date)
    }

    pub fn days(&self) -> impl Iterator<Item = WeekDay> {
        let monday = self.monday;
        DAY_NAMES
            .into_iter()
            .enumerate()
            .map(move |(index, name)| WeekDay { date: monday + Duration::days(index as i64), name })
    }

    pub fn download_filename(&self) -> String {
        format!(
            "{WEEKLY_PREFIX}_{}_{}.wav",
            compact_label(self.first_day()),
            compact_label(self.last_day())
        )
    }
}

/// Formats a date the way the journal shows it, e.g. `Jan 1`.
pub fn short_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

fn compact_label(date: NaiveDate) -> String {
    short_label(date).split_whitespace().collect()
}

pub fn daily_filename(date: NaiveDate) -> String {
    format!("{DAILY_PREFIX}_{}.wav", compact_label(date))
}

/// First and last instant of a local calendar day, in UTC.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (local_to_utc(start), local_to_utc(end))
}

pub fn start_of_today() -> DateTime<Utc> {
    day_bounds(Local::now().date_naive()).0
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
