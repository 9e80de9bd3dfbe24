//! Reservation records and the people who own them.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type ReservationId = i64;

/// Colour used to tell reservations apart in listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Yellow,
    Green,
    Blue,
    Red,
}

impl Style {
    pub const ALL: [Style; 4] = [Style::Yellow, Style::Green, Style::Blue, Style::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Yellow => "yellow",
            Style::Green => "green",
            Style::Blue => "blue",
            Style::Red => "red",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.as_str() == s)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured user. Permissions are a flat set of names such as
/// `add_reservation` or `change_reservation_lesser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl User {
    pub fn new(username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn has_perm(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Full name, falling back to the username when none is configured.
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

/// A person on the duty roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyPerson {
    pub id: i64,
    pub username: String,
    pub phone: String,
    #[serde(default)]
    pub accounting_no: String,
}

/// A booked time span in one application namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub namespace: String,
    /// Username of the owner.
    pub person: String,
    /// Display name of the owner, captured when the record is loaded.
    #[serde(default)]
    pub person_name: String,
    #[serde(default)]
    pub person_behalf: String,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default = "default_markup")]
    pub long_description_markup: String,
    #[serde(default)]
    pub style: Style,
}

fn default_markup() -> String {
    "raw".to_string()
}

pub const DESCRIPTION_MAX_LEN: usize = 140;

impl Reservation {
    /// Build an unsaved reservation (id 0) owned by `owner`.
    pub fn draft(
        namespace: impl Into<String>,
        owner: &User,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            namespace: namespace.into(),
            person: owner.username.clone(),
            person_name: owner.display_name().to_string(),
            person_behalf: String::new(),
            start,
            stop,
            description: String::new(),
            long_description: String::new(),
            long_description_markup: default_markup(),
            style: Style::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.start > self.stop {
            return Err(crate::error::Error::InvalidReservation(format!(
                "stop {} is before start {}",
                self.stop, self.start
            )));
        }
        if self.description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(crate::error::Error::InvalidReservation(format!(
                "description longer than {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn creator_name(&self) -> String {
        let owner = if self.person_name.is_empty() {
            self.person.as_str()
        } else {
            self.person_name.as_str()
        };
        if self.person_behalf.is_empty() {
            owner.to_string()
        } else {
            format!("{} (by {})", self.person_behalf, owner)
        }
    }

    pub fn one_day(&self) -> bool {
        self.start.date() == self.stop.date()
    }

    /// Whether the reservation starts after the Saturday of the week of `today`.
    pub fn is_next_week(&self, today: NaiveDate) -> bool {
        let date = self.start.date();
        if date < today {
            return false;
        }
        let to_saturday = 5 - today.weekday().num_days_from_monday() as i64;
        match today.checked_add_signed(Duration::days(to_saturday)) {
            Some(saturday) => date > saturday,
            None => false,
        }
    }

    pub fn week(&self) -> WeekFacade {
        WeekFacade::of(self.start.date())
    }

    /// Inclusive overlap with a closed `[start, stop]` window, matching
    /// how a displayed day is bounded.
    pub fn touches(&self, start: NaiveDateTime, stop: NaiveDateTime) -> bool {
        self.start <= stop && self.stop >= start
    }
}

/// The ISO week a batch of reservations lands in; used as redirect target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekFacade {
    pub year: i32,
    pub week: u32,
}

impl WeekFacade {
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn alice() -> User {
        User::new("alice", "Alice Smith")
    }

    #[test]
    fn creator_name_mentions_behalf() {
        let mut res = Reservation::draft("lyra", &alice(), at(2024, 5, 6, 8, 0), at(2024, 5, 6, 9, 0));
        assert_eq!(res.creator_name(), "Alice Smith");
        res.person_behalf = "Bob".into();
        assert_eq!(res.creator_name(), "Bob (by Alice Smith)");
    }

    #[test]
    fn one_day_and_week() {
        let res = Reservation::draft("lyra", &alice(), at(2024, 12, 30, 8, 0), at(2024, 12, 31, 9, 0));
        assert!(!res.one_day());
        // 2024-12-30 is in ISO week 1 of 2025
        assert_eq!(res.week(), WeekFacade { year: 2025, week: 1 });
    }

    #[test]
    fn is_next_week_counts_from_saturday() {
        // Wednesday
        let today = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        let sat = Reservation::draft("lyra", &alice(), at(2024, 5, 11, 8, 0), at(2024, 5, 11, 9, 0));
        let sun = Reservation::draft("lyra", &alice(), at(2024, 5, 12, 8, 0), at(2024, 5, 12, 9, 0));
        let past = Reservation::draft("lyra", &alice(), at(2024, 5, 1, 8, 0), at(2024, 5, 20, 9, 0));
        assert!(!sat.is_next_week(today));
        assert!(sun.is_next_week(today));
        assert!(!past.is_next_week(today));
    }

    #[test]
    fn is_next_week_at_the_end_of_time() {
        let today = NaiveDate::MAX;
        let start = today.and_hms_opt(8, 0, 0).unwrap();
        let res = Reservation::draft("lyra", &alice(), start, start);
        // only a Sunday lies past its own week's Saturday
        assert_eq!(res.is_next_week(today), today.weekday() == chrono::Weekday::Sun);
    }

    #[test]
    fn validate_rejects_reversed_span() {
        let res = Reservation::draft("lyra", &alice(), at(2024, 5, 6, 10, 0), at(2024, 5, 6, 9, 0));
        assert!(res.validate().is_err());
    }

    #[test]
    fn style_parses_known_names() {
        assert_eq!(Style::parse("blue"), Some(Style::Blue));
        assert_eq!(Style::parse("purple"), None);
        assert_eq!(Style::default().to_string(), "yellow");
    }
}
