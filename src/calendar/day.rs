use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use super::DayEvent;

/// A displayed day with its clipped events and presentation flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Day {
    pub date: NaiveDate,
    pub events: Vec<DayEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub is_today: bool,
    pub is_offmonth: bool,
    pub is_weekend: bool,
    pub css_class: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_columns: Vec<Vec<DayEvent>>,
}

impl Day {
    pub fn new(date: NaiveDate, events: Vec<DayEvent>) -> Self {
        Self {
            date,
            events,
            link: None,
            is_today: false,
            is_offmonth: false,
            is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            css_class: String::new(),
            event_columns: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: String) -> Self {
        self.link = Some(link);
        self
    }

    /// Set the today/off-month flags and derive the CSS class from them.
    /// `month` is the month being browsed, if any.
    pub fn flagged(mut self, today: NaiveDate, month: Option<u32>) -> Self {
        self.is_today = self.date == today;
        self.is_offmonth = month.is_some_and(|month| self.date.month() != month);
        self.css_class = self.css_class(today);
        self
    }

    /// `today` wins outright; otherwise off-month and weekend are joined with
    /// a dash and days before today also get `past-day`.
    pub fn css_class(&self, today: NaiveDate) -> String {
        if self.is_today {
            return "today".to_string();
        }

        let mut other_days = Vec::new();
        if self.is_offmonth {
            other_days.push("offmonth");
        }
        if self.is_weekend {
            other_days.push("weekend");
        }

        let mut classes = Vec::new();
        if !other_days.is_empty() {
            classes.push(other_days.join("-"));
        }
        if self.date < today {
            classes.push("past-day".to_string());
        }
        classes.join(" ")
    }
}
