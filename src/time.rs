use chrono::{Datelike, Duration, NaiveDate, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Storage key for a calendar date, `YYYY-MM-DD`.
pub fn format_date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// The Sunday on or before the given date.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

pub fn week_dates(start: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|i| start + Duration::days(i as i64))
}

/// Display label for a week, e.g. `Jan 5 - Jan 11, 2026`.
pub fn format_week_range(start: NaiveDate) -> String {
    let days = week_dates(start);
    let end = days[6];
    format!(
        "{} {} - {} {}, {}",
        days[0].format("%b"),
        days[0].day(),
        end.format("%b"),
        end.day(),
        end.year()
    )
}

/// Friendly date label used in notification emails, e.g. `Thursday, January 15`.
pub fn format_long_date(date: NaiveDate) -> String {
    format!("{} {}", date.format("%A, %B"), date.day())
}

/// Canonicalize a free-form time string to 12-hour `H:MM AM/PM`.
///
/// Dinner context: a bare hour is always read as evening, so inputs without
/// an explicit meridiem come out as PM — `18:00` and `6` both become
/// `6:00 PM`, and it never defaults to AM. Inputs with no digits at all are
/// returned trimmed and unchanged.
pub fn convert_to_12_hour(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_lowercase();
    let is_am = lower.contains("am");
    let is_pm = lower.contains("pm");

    let digits: String = lower
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();
    let mut parts = digits.split(':');
    let hour_part = parts.next().unwrap_or("");
    let minute_part = parts.next().unwrap_or("");

    let hours: u32 = match hour_part.parse() {
        Ok(h) => h,
        Err(_) => return trimmed.to_string(),
    };
    let minutes = if minute_part.is_empty() {
        "00"
    } else {
        minute_part
    };

    if is_am || is_pm {
        let period = if is_am { "AM" } else { "PM" };
        let display = match hours {
            0 => 12,
            h if h > 12 => h - 12,
            h => h,
        };
        return format!("{display}:{minutes} {period}");
    }

    let display = if hours > 12 { hours - 12 } else { hours };
    format!("{display}:{minutes} PM")
}
