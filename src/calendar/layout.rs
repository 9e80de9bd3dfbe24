use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::{Reservation, ReservationId, Style};
use crate::store::day_bounds;

use super::{quarts, Day};

/// Pixel height of one quart.
pub const DEFAULT_QUARTER_HEIGHT: u32 = 15;

const QUARTS_PER_DAY: u32 = 24 * 4;

/// Rendering geometry of an event inside its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub is_vacant: bool,
    pub top: u32,
    pub height: u32,
    pub quarts: u32,
}

/// One event as displayed on one day.
///
/// Reservation-backed events carry their id and links; synthetic events
/// (such as fixed breakfast slots on a menu) have no id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayEvent {
    pub id: Option<ReservationId>,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub description: String,
    pub long_description: String,
    pub style: Style,
    pub one_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_link: Option<String>,
    pub can_update: bool,
    pub can_remove: bool,
    #[serde(flatten)]
    pub geometry: Option<Geometry>,
}

impl DayEvent {
    pub fn synthetic(
        start: NaiveDateTime,
        stop: NaiveDateTime,
        description: impl Into<String>,
        long_description: impl Into<String>,
        style: Style,
    ) -> Self {
        Self {
            id: None,
            start,
            stop,
            description: description.into(),
            long_description: long_description.into(),
            style,
            one_day: start.date() == stop.date(),
            creator_name: None,
            link: None,
            update_link: None,
            remove_link: None,
            can_update: false,
            can_remove: false,
            geometry: None,
        }
    }

    pub fn is_meaningful(&self) -> bool {
        !self.description.is_empty() || !self.long_description.is_empty()
    }
}

/// Project a reservation onto a single displayed day.
///
/// Multi-day reservations show up once for every day they touch, each time
/// clipped to that day's first and last second.
pub fn clip_to_day(res: &Reservation, date: NaiveDate) -> DayEvent {
    let (day_start, day_stop) = day_bounds(date);
    DayEvent {
        id: Some(res.id),
        start: res.start.max(day_start),
        stop: res.stop.min(day_stop),
        description: res.description.clone(),
        long_description: res.long_description.clone(),
        style: res.style,
        one_day: res.one_day(),
        creator_name: Some(res.creator_name()),
        link: None,
        update_link: None,
        remove_link: None,
        can_update: false,
        can_remove: false,
        geometry: None,
    }
}

/// Half-open overlap: spans that merely touch do not conflict.
pub fn overlaps(a: &DayEvent, b: &DayEvent) -> bool {
    a.start < b.stop && b.start < a.stop
}

fn fits(column: &[DayEvent], event: &DayEvent) -> bool {
    !column.iter().any(|other| overlaps(event, other))
}

/// Greedy first-fit packing. There is always at least one column.
pub fn split_columns(events: Vec<DayEvent>) -> Vec<Vec<DayEvent>> {
    let mut columns: Vec<Vec<DayEvent>> = vec![Vec::new()];
    for event in events {
        match columns.iter_mut().find(|column| fits(column, &event)) {
            Some(column) => column.push(event),
            None => columns.push(vec![event]),
        }
    }
    columns
}

/// Visible quart range over all displayed days: the earliest start rounded
/// down to the hour, and the latest stop rounded down to the hour plus two
/// hours of padding. With no events the minimum exceeds the maximum.
pub fn quart_bounds(days: &[Day]) -> (u32, u32) {
    let mut min_quart = QUARTS_PER_DAY;
    let mut max_quart = 0;

    for event in days.iter().flat_map(|day| day.events.iter()) {
        min_quart = min_quart.min(quarts(&event.start));
        max_quart = max_quart.max(quarts(&event.stop));
    }

    min_quart -= min_quart % 4;
    max_quart = max_quart - max_quart % 4 + 8;

    (min_quart, max_quart)
}

/// Hour labels for the visible range; empty when there is nothing to show.
pub fn business_hours(min_quart: u32, max_quart: u32) -> Vec<u32> {
    if min_quart > max_quart {
        return Vec::new();
    }
    (min_quart / 4..max_quart / 4).map(|hour| hour % 24).collect()
}

/// Attach pixel geometry to every event of a column.
pub fn annotate(column: &mut [DayEvent], min_quart: u32, quarter_height: u32) {
    for event in column.iter_mut() {
        let start = quarts(&event.start);
        let span = quarts(&event.stop).saturating_sub(start);
        event.geometry = Some(Geometry {
            is_vacant: false,
            top: start.saturating_sub(min_quart) * quarter_height,
            height: span * quarter_height,
            quarts: span,
        });
    }
}

/// Output of [`DayPlanner::plan`].
#[derive(Debug, Clone, Serialize)]
pub struct PlannedDays {
    /// Days with their columns; empty when no hour is visible.
    pub days: Vec<Day>,
    pub min_quart: u32,
    pub max_quart: u32,
    pub business_hours: Vec<u32>,
    pub hour_height: u32,
    pub table_max_height: u32,
}

/// Lays out a run of days for the week and day grids.
#[derive(Debug, Clone, Copy)]
pub struct DayPlanner {
    pub quarter_height: u32,
    pub display_weekends: bool,
}

impl Default for DayPlanner {
    fn default() -> Self {
        Self {
            quarter_height: DEFAULT_QUARTER_HEIGHT,
            display_weekends: true,
        }
    }
}

impl DayPlanner {
    pub fn new(quarter_height: u32) -> Self {
        Self {
            quarter_height,
            ..Self::default()
        }
    }

    pub fn hide_weekends(mut self) -> Self {
        self.display_weekends = false;
        self
    }

    /// Restrict a Monday-first week to what this planner displays.
    pub fn visible_days(&self, mut week: Vec<NaiveDate>) -> Vec<NaiveDate> {
        if !self.display_weekends {
            week.truncate(5);
        }
        week
    }

    pub fn plan(&self, mut days: Vec<Day>) -> PlannedDays {
        let (min_quart, max_quart) = quart_bounds(&days);
        let hours = business_hours(min_quart, max_quart);

        if hours.is_empty() {
            days.clear();
        } else {
            for day in days.iter_mut() {
                let mut columns = split_columns(day.events.clone());
                for column in columns.iter_mut() {
                    annotate(column, min_quart, self.quarter_height);
                }
                day.event_columns = columns;
            }
        }

        let hour_height = self.quarter_height * 4;
        PlannedDays {
            days,
            min_quart,
            max_quart,
            table_max_height: hour_height * hours.len() as u32,
            business_hours: hours,
            hour_height,
        }
    }
}
