//! On-call duty rosters.
//!
//! A roster entry covers a period of days with the same daily hours and is
//! stored as one reservation per day. The monthly report sums the hours
//! booked in a month.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::json;

use crate::app::{Page, Route};
use crate::error::Result;
use crate::forms::{
    parse_date, parse_time, required, FormData, FormErrors, BEGIN_BEFORE_END, INVALID_CHOICE,
    INVALID_DATE, INVALID_TIME,
};
use crate::model::{DutyPerson, Reservation, User, WeekFacade};
use crate::permissions::Capability;
use crate::store::month_bounds;
use crate::views::RequestContext;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RosterFields {
    pub period_start_date: Option<NaiveDate>,
    pub period_stop_date: Option<NaiveDate>,
    pub period_time_start: Option<NaiveTime>,
    pub period_time_stop: Option<NaiveTime>,
    pub person: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RosterForm {
    pub fields: RosterFields,
    pub errors: FormErrors,
}

impl RosterForm {
    /// `persons` are the valid choices for the `person` field.
    pub fn bind(data: &FormData, persons: &[DutyPerson]) -> Self {
        let mut errors = FormErrors::default();

        let fields = RosterFields {
            period_start_date: required(data, "period_start_date", &mut errors, INVALID_DATE, parse_date),
            period_stop_date: required(data, "period_stop_date", &mut errors, INVALID_DATE, parse_date),
            period_time_start: required(data, "period_time_start", &mut errors, INVALID_TIME, parse_time),
            period_time_stop: required(data, "period_time_stop", &mut errors, INVALID_TIME, parse_time),
            person: required(data, "person", &mut errors, INVALID_CHOICE, |raw| {
                raw.parse::<i64>()
                    .ok()
                    .filter(|id| persons.iter().any(|person| person.id == *id))
            }),
        };

        if let (Some(first), Some(last)) = (fields.period_start_date, fields.period_stop_date) {
            if first > last {
                errors.add("period_start_date", BEGIN_BEFORE_END);
            }
        }
        if let (Some(from), Some(until)) = (fields.period_time_start, fields.period_time_stop) {
            if from > until {
                errors.add("period_time_start", BEGIN_BEFORE_END);
            }
        }

        Self { fields, errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One `(start, stop)` pair per day of the period; empty unless valid.
    pub fn spans(&self) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        let RosterFields {
            period_start_date: Some(first),
            period_stop_date: Some(last),
            period_time_start: Some(from),
            period_time_stop: Some(until),
            ..
        } = self.fields
        else {
            return Vec::new();
        };
        if !self.is_valid() {
            return Vec::new();
        }

        first
            .iter_days()
            .take_while(|date| *date <= last)
            .map(|date| (date.and_time(from), date.and_time(until)))
            .collect()
    }
}

fn render_roster(ctx: &RequestContext, form: &RosterForm) -> Result<Page> {
    let persons: Vec<_> = ctx
        .site
        .duty_persons
        .iter()
        .map(|person| {
            json!({
                "id": person.id,
                "name": ctx.site.display_name(&person.username),
                "phone": person.phone,
            })
        })
        .collect();

    ctx.render(
        "reserve",
        json!({
            "form": form,
            "persons": persons,
            "app_name": ctx.app.description,
        }),
    )
}

/// Blank roster form. The caller has checked the create permission.
pub fn roster_form(ctx: &RequestContext) -> Result<Page> {
    render_roster(ctx, &RosterForm::default())
}

/// Store the roster and send the user to the week it starts in.
pub async fn roster_save(ctx: &RequestContext, owner: &User, data: &FormData) -> Result<Page> {
    let form = RosterForm::bind(data, &ctx.site.duty_persons);
    let person = form.fields.person.and_then(|id| ctx.site.duty_person(id));
    let (Some(person), Some(first)) = (person, form.fields.period_start_date) else {
        return render_roster(ctx, &form);
    };
    if !form.is_valid() {
        return render_roster(ctx, &form);
    }

    let description = format!(
        "{} tel. {}",
        ctx.site.display_name(&person.username),
        person.phone
    );
    let spans = form.spans();
    for (start, stop) in &spans {
        ctx.store()
            .insert(
                Reservation::draft(ctx.namespace(), owner, *start, *stop)
                    .with_description(description.clone()),
            )
            .await?;
    }
    tracing::info!(
        namespace = ctx.namespace(),
        person = person.id,
        days = spans.len(),
        "duty roster saved"
    );

    let facade = WeekFacade::of(first);
    Ok(ctx.redirect(Route::BrowseWeek {
        year: facade.year,
        week: facade.week,
    }))
}

#[derive(Serialize)]
struct ReportRow<'a> {
    #[serde(flatten)]
    reservation: &'a Reservation,
    creator_name: String,
    hours: f64,
}

fn hours(res: &Reservation) -> f64 {
    (res.stop - res.start).num_minutes() as f64 / 60.0
}

/// Reservations overlapping a month with their durations.
pub async fn month_report(ctx: &RequestContext, year: i32, month: u32) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let (first, _) = month_bounds(year, month)?;
    let reservations = ctx.store().month(ctx.namespace(), year, month).await?;
    let rows: Vec<ReportRow> = reservations
        .iter()
        .map(|res| ReportRow {
            reservation: res,
            creator_name: res.creator_name(),
            hours: hours(res),
        })
        .collect();
    let total_hours: f64 = rows.iter().map(|row| row.hours).sum();

    let (prev_year, prev_month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

    ctx.render(
        "month_report",
        json!({
            "reservations": rows,
            "total_hours": total_hours,
            "date": first.date(),
            "prev_month_link": ctx.app.reverse(Route::MonthReport { year: prev_year, month: prev_month }),
            "next_month_link": ctx.app.reverse(Route::MonthReport { year: next_year, month: next_month }),
            "app_name": ctx.app.description,
        }),
    )
}
