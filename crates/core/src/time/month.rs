use chrono::{DateTime, Local, NaiveDate, Utc};

/// Wall-clock view of a single session. Scan dates and validity months come
/// from the local calendar date; ticker-cache expiry is measured in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanClock {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl ScanClock {
    pub fn local_now() -> Self {
        let local = Local::now();
        Self {
            now: local.with_timezone(&Utc),
            today: local.date_naive(),
        }
    }

    pub fn at(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self { now, today }
    }

    pub fn current_month(&self) -> String {
        month_key(self.today)
    }

    pub fn scan_date(&self) -> String {
        scan_date_string(self.today)
    }
}

/// `YYYY-MM`
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// `YYYY-MM-DD`
pub fn scan_date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Resolves an optional `YYYY-MM-DD` override into a clock, defaulting to the
/// local date.
pub fn resolve_clock(today_arg: Option<&str>, now_utc: DateTime<Utc>) -> anyhow::Result<ScanClock> {
    if let Some(s) = today_arg {
        let today = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?;
        return Ok(ScanClock::at(now_utc, today));
    }
    Ok(ScanClock::at(
        now_utc,
        now_utc.with_timezone(&Local).date_naive(),
    ))
}
