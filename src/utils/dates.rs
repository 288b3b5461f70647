use chrono::{Local, NaiveDate};

// Date keys always come from local calendar fields. Slicing a UTC ISO
// timestamp shifts the day near midnight in non-UTC zones, so "today" and
// every per-date cache key go through these helpers instead.

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    // chrono accepts unpadded numerics, so require the canonical rendering.
    NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .ok()
        .filter(|date| date_key(*date) == key)
}
