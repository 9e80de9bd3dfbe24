//! Form binding and validation for reservation views.
//!
//! Submitted forms arrive as flat string maps. Binding converts each field
//! and records per-field messages; cross-field rules (ordering, overlap)
//! run afterwards and add to the same error map.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::Result;
use crate::model::{Reservation, ReservationId, Style, DESCRIPTION_MAX_LEN};
use crate::store::ReservationStore;

pub type FormData = HashMap<String, String>;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_DATETIME: &str = "Enter a valid date/time.";
pub const INVALID_DATE: &str = "Enter a valid date.";
pub const INVALID_TIME: &str = "Enter a valid time.";
pub const INVALID_CHOICE: &str = "Select a valid choice.";
pub const BEGIN_BEFORE_END: &str = "The reservation should begin before it ends";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Error messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

/// Non-empty trimmed value of a field.
pub fn value<'a>(data: &'a FormData, name: &str) -> Option<&'a str> {
    data.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// HTML checkboxes are absent when unticked.
pub fn checkbox(data: &FormData, name: &str) -> bool {
    matches!(
        value(data, name).map(str::to_ascii_lowercase).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}

/// Bind a required field with `parse`, recording a message on failure.
pub fn required<T>(
    data: &FormData,
    name: &str,
    errors: &mut FormErrors,
    invalid: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    match value(data, name) {
        None => {
            errors.add(name, REQUIRED);
            None
        }
        Some(raw) => {
            let parsed = parse(raw);
            if parsed.is_none() {
                errors.add(name, invalid);
            }
            parsed
        }
    }
}

/// Editable fields of a reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationFields {
    pub start: Option<NaiveDateTime>,
    pub stop: Option<NaiveDateTime>,
    pub description: String,
    pub long_description: String,
    pub person_behalf: String,
    pub style: Style,
    /// Refuse to save when the span overlaps other reservations.
    pub exclusive: bool,
}

impl ReservationFields {
    /// Blank form. A `day` of the form `YYYY-MM-DD` preselects 8:00 on that day.
    pub fn initial(day: Option<&str>, exclusive: bool) -> Self {
        let start = day
            .and_then(parse_date)
            .and_then(|date| date.and_hms_opt(8, 0, 0));
        Self {
            start,
            stop: start,
            description: String::new(),
            long_description: String::new(),
            person_behalf: String::new(),
            style: Style::default(),
            exclusive,
        }
    }

    pub fn from_reservation(res: &Reservation, exclusive: bool) -> Self {
        Self {
            start: Some(res.start),
            stop: Some(res.stop),
            description: res.description.clone(),
            long_description: res.long_description.clone(),
            person_behalf: res.person_behalf.clone(),
            style: res.style,
            exclusive,
        }
    }

    /// Copy the fields onto `res`. Owner and namespace are left alone.
    pub fn apply(&self, res: &mut Reservation) {
        if let Some(start) = self.start {
            res.start = start;
        }
        if let Some(stop) = self.stop {
            res.stop = stop;
        }
        res.description = self.description.clone();
        res.long_description = self.long_description.clone();
        res.person_behalf = self.person_behalf.clone();
        res.style = self.style;
    }
}

/// A bound reservation form.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationForm {
    pub fields: ReservationFields,
    pub errors: FormErrors,
}

impl ReservationForm {
    pub fn unbound(fields: ReservationFields) -> Self {
        Self {
            fields,
            errors: FormErrors::default(),
        }
    }

    /// Field-level binding.
    pub fn bind(data: &FormData) -> Self {
        let mut errors = FormErrors::default();

        let start = required(data, "start", &mut errors, INVALID_DATETIME, parse_datetime);
        let stop = required(data, "stop", &mut errors, INVALID_DATETIME, parse_datetime);

        let description = value(data, "description").unwrap_or_default().to_string();
        if description.is_empty() {
            errors.add("description", REQUIRED);
        } else if description.chars().count() > DESCRIPTION_MAX_LEN {
            errors.add(
                "description",
                format!("Ensure this value has at most {DESCRIPTION_MAX_LEN} characters."),
            );
        }

        let style = match value(data, "style") {
            None => Style::default(),
            Some(raw) => Style::parse(raw).unwrap_or_else(|| {
                errors.add("style", INVALID_CHOICE);
                Style::default()
            }),
        };

        Self {
            fields: ReservationFields {
                start,
                stop,
                description,
                long_description: value(data, "long_description").unwrap_or_default().to_string(),
                person_behalf: value(data, "person_behalf").unwrap_or_default().to_string(),
                style,
                exclusive: checkbox(data, "exclusive"),
            },
            errors,
        }
    }

    /// Cross-field rules: ordering, then overlap when exclusive. `instance`
    /// is the reservation being edited, which never conflicts with itself.
    pub async fn clean(
        &mut self,
        store: &dyn ReservationStore,
        namespace: &str,
        instance: Option<ReservationId>,
    ) -> Result<()> {
        let (Some(start), Some(stop)) = (self.fields.start, self.fields.stop) else {
            return Ok(());
        };

        if start > stop {
            self.errors.add("start", BEGIN_BEFORE_END);
        }

        if self.fields.exclusive {
            let conflicts = store
                .would_conflict(namespace, start, stop, instance)
                .await?;
            if conflicts > 0 {
                self.errors.add(
                    "start",
                    format!("The reservation would conflict with {conflicts} other reservations."),
                );
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Deletion confirmation: the `confirm` box must be ticked.
pub fn confirm(data: &FormData) -> FormErrors {
    let mut errors = FormErrors::default();
    if !checkbox(data, "confirm") {
        errors.add("confirm", REQUIRED);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::store::MemoryStore;

    fn data(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_both_datetime_spellings() {
        assert!(parse_datetime("2024-05-06 08:00").is_some());
        assert!(parse_datetime("2024-05-06T08:00:30").is_some());
        assert!(parse_datetime("06.05.2024").is_none());
        assert_eq!(parse_time("7:05").unwrap().to_string(), "07:05:00");
    }

    #[test]
    fn initial_from_day_query() {
        let fields = ReservationFields::initial(Some("2024-05-06"), true);
        assert_eq!(fields.start.unwrap().to_string(), "2024-05-06 08:00:00");
        assert_eq!(fields.start, fields.stop);
        assert!(fields.exclusive);

        let fields = ReservationFields::initial(Some("tomorrow"), false);
        assert!(fields.start.is_none());
    }

    #[test]
    fn bind_reports_missing_and_invalid_fields() {
        let form = ReservationForm::bind(&data(&[
            ("start", "not a date"),
            ("style", "purple"),
        ]));
        assert_eq!(form.errors.field("start"), [INVALID_DATETIME]);
        assert_eq!(form.errors.field("stop"), [REQUIRED]);
        assert_eq!(form.errors.field("description"), [REQUIRED]);
        assert_eq!(form.errors.field("style"), [INVALID_CHOICE]);
    }

    #[tokio::test]
    async fn clean_rejects_reversed_spans() {
        let store = MemoryStore::new();
        let mut form = ReservationForm::bind(&data(&[
            ("start", "2024-05-06 10:00"),
            ("stop", "2024-05-06 09:00"),
            ("description", "standup"),
        ]));
        form.clean(&store, "lyra", None).await.unwrap();
        assert_eq!(form.errors.field("start"), [BEGIN_BEFORE_END]);
    }

    #[tokio::test]
    async fn exclusive_counts_conflicts_but_not_itself() {
        let store = MemoryStore::new();
        let user = User::new("alice", "Alice");
        let start = parse_datetime("2024-05-06 09:00").unwrap();
        let stop = parse_datetime("2024-05-06 10:00").unwrap();
        let existing = store
            .insert(Reservation::draft("drive", &user, start, stop).with_description("van"))
            .await
            .unwrap();

        let submitted = data(&[
            ("start", "2024-05-06 09:30"),
            ("stop", "2024-05-06 11:00"),
            ("description", "van again"),
            ("exclusive", "on"),
        ]);

        let mut form = ReservationForm::bind(&submitted);
        form.clean(&store, "drive", None).await.unwrap();
        assert_eq!(
            form.errors.field("start"),
            ["The reservation would conflict with 1 other reservations."]
        );

        let mut form = ReservationForm::bind(&submitted);
        form.clean(&store, "drive", Some(existing.id)).await.unwrap();
        assert!(form.is_valid());

        // without the checkbox overlaps are allowed
        let mut relaxed = submitted.clone();
        relaxed.remove("exclusive");
        let mut form = ReservationForm::bind(&relaxed);
        form.clean(&store, "drive", None).await.unwrap();
        assert!(form.is_valid());
    }

    #[test]
    fn confirm_needs_the_box() {
        assert_eq!(confirm(&data(&[])).field("confirm"), [REQUIRED]);
        assert!(confirm(&data(&[("confirm", "on")])).is_empty());
    }
}
