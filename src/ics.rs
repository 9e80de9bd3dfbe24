use chrono::NaiveDateTime;
use ics::{
    escape_text,
    properties::{Categories, Description, DtEnd, DtStart, Summary},
    ICalendar,
};

use crate::app::App;
use crate::model::Reservation;

/// Floating local time, as reservations carry no zone.
fn ics_time(time: NaiveDateTime) -> String {
    time.format("%Y%m%dT%H%M%S").to_string()
}

pub fn reservation_to_ics(res: &Reservation) -> ics::Event<'static> {
    let start = ics_time(res.start);
    let id = format!("{}-{}@{}", res.namespace, res.id, env!("CARGO_PKG_NAME"));

    let mut event = ics::Event::new(id, start.clone());

    event.push(DtStart::new(start));
    event.push(DtEnd::new(ics_time(res.stop)));
    event.push(Summary::new(escape_text(res.description.clone())));
    event.push(Categories::new(res.style.as_str()));

    if !res.long_description.is_empty() {
        event.push(Description::new(escape_text(res.long_description.clone())));
    }

    event
}

/// Calendar of every reservation of an application.
pub fn feed(app: &App, reservations: &[Reservation]) -> String {
    let prodid = format!("-//{}//{}//EN", env!("CARGO_PKG_NAME"), app.namespace);
    let mut icalendar = ICalendar::new("2.0", prodid);

    for res in reservations {
        icalendar.add_event(reservation_to_ics(res));
    }

    icalendar.to_string()
}
