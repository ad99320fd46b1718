//! Totals and date-bucket grouping for the finance dashboards.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::models::{Expense, HandPayment};

/// A dated money movement.
pub trait Ledger {
    fn occurred_at(&self) -> DateTime<Utc>;
    fn amount_cents(&self) -> i64;
}

impl Ledger for Expense {
    fn occurred_at(&self) -> DateTime<Utc> {
        self.date
    }
    fn amount_cents(&self) -> i64 {
        self.amount_cents
    }
}

impl Ledger for HandPayment {
    fn occurred_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn amount_cents(&self) -> i64 {
        self.amount_cents
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBucket {
    Day,
    /// Weeks start on Monday.
    Week,
    Month,
}

impl DateBucket {
    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            DateBucket::Day => date,
            DateBucket::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            DateBucket::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

impl std::str::FromStr for DateBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(DateBucket::Day),
            "week" => Ok(DateBucket::Week),
            "month" => Ok(DateBucket::Month),
            other => Err(format!("unknown bucket {other:?} (day, week, month)")),
        }
    }
}

pub fn total_cents<L: Ledger>(items: &[L]) -> i64 {
    items.iter().map(|i| i.amount_cents()).sum()
}

/// Income minus expenses.
pub fn net_cents<I: Ledger, E: Ledger>(income: &[I], expenses: &[E]) -> i64 {
    total_cents(income) - total_cents(expenses)
}

/// Items dated within `[from, to]` (inclusive, by UTC calendar day).
pub fn in_range<L: Ledger>(items: &[L], from: NaiveDate, to: NaiveDate) -> Vec<&L> {
    items
        .iter()
        .filter(|i| {
            let d = i.occurred_at().date_naive();
            d >= from && d <= to
        })
        .collect()
}

/// Totals per bucket, ordered by bucket start.
pub fn group_by_bucket<L: Ledger>(items: &[L], bucket: DateBucket) -> Vec<(NaiveDate, i64)> {
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for item in items {
        let key = bucket.start_of(item.occurred_at().date_naive());
        *totals.entry(key).or_insert(0) += item.amount_cents();
    }
    totals.into_iter().collect()
}

/// `123456` -> `"1,234.56"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let units = (abs / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{:02}", abs % 100)
}
