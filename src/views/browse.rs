//! Index, year, month, week and day browsing.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{object, RequestContext};
use crate::app::{AppKind, Page, Route};
use crate::calendar::{
    clip_to_day, iso_week, month_weeks, shift_days, week_days, Day, DayEvent,
};
use crate::contrib::food;
use crate::error::{Error, Result};
use crate::ics;
use crate::model::Reservation;
use crate::permissions::Capability;

const UPCOMING_LIMIT: usize = 4;

#[derive(Serialize)]
struct YearEntry {
    year: i32,
    link: String,
    reservation_count: usize,
}

#[derive(Serialize)]
struct MonthEntry {
    date: NaiveDate,
    link: String,
    reservation_count: usize,
}

#[derive(Serialize)]
struct Mention {
    date: NaiveDate,
    link: String,
}

#[derive(Serialize)]
struct MonthWeek {
    week: u32,
    days: Vec<Day>,
    link: String,
}

#[derive(Serialize)]
struct UpcomingEntry<'a> {
    id: i64,
    description: &'a str,
    start: chrono::NaiveDateTime,
    stop: chrono::NaiveDateTime,
    creator_name: String,
    link: String,
    is_next_week: bool,
}

/// Clip each reservation to `date` and attach links and edit rights.
pub fn process_day_events(
    ctx: &RequestContext,
    date: NaiveDate,
    reservations: &[Reservation],
) -> Vec<DayEvent> {
    reservations
        .iter()
        .map(|res| {
            let mut event = clip_to_day(res, date);
            event.link = Some(ctx.app.reverse(Route::Details { pk: res.id }));
            event.update_link = Some(ctx.app.reverse(Route::Update { pk: res.id }));
            event.remove_link = Some(ctx.app.reverse(Route::Remove { pk: res.id }));
            event.can_update = ctx.allows(Capability::Edit, Some(res));
            event.can_remove = ctx.allows(Capability::Delete, Some(res));
            event
        })
        .collect()
}

fn day_link(ctx: &RequestContext, date: NaiveDate) -> String {
    ctx.app.reverse(Route::BrowseDay {
        year: date.year(),
        month: date.month(),
        day: date.day(),
    })
}

fn reserve_link(ctx: &RequestContext) -> Option<String> {
    ctx.allows(Capability::Create, None)
        .then(|| ctx.app.reverse(Route::Reserve))
}

pub async fn index(ctx: &RequestContext) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let mut years = ctx.store().years(ctx.namespace()).await?;
    let next_year = ctx.today().year() + 1;
    if !years.contains(&next_year) {
        years.push(next_year);
        years.sort_unstable();
    }

    let mut entries = Vec::with_capacity(years.len());
    for year in years {
        entries.push(YearEntry {
            year,
            link: ctx.app.reverse(Route::BrowseYear { year }),
            reservation_count: ctx.store().year(ctx.namespace(), year).await?.len(),
        });
    }

    ctx.render(
        "index",
        json!({
            "years": entries,
            "app_name": ctx.app.description,
        }),
    )
}

pub async fn year(ctx: &RequestContext, year: i32) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let mut months = Vec::with_capacity(12);
    for month in 1..=12 {
        let date = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::InvalidDate(format!("{year}")))?;
        months.push(MonthEntry {
            date,
            link: ctx.app.reverse(Route::BrowseMonth { year, month }),
            reservation_count: ctx.store().month(ctx.namespace(), year, month).await?.len(),
        });
    }

    ctx.render(
        "browse_year",
        json!({
            "year": year,
            "next_year_link": ctx.app.reverse(Route::BrowseYear { year: year + 1 }),
            "prev_year_link": ctx.app.reverse(Route::BrowseYear { year: year - 1 }),
            "months": months,
            "app_name": ctx.app.description,
            "index_link": ctx.app.reverse(Route::BrowseIndex),
        }),
    )
}

pub async fn month(ctx: &RequestContext, year: i32, month: u32) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let today = ctx.today();
    let mut weeks = Vec::new();
    for dates in month_weeks(year, month)? {
        let (week_year, week) = iso_week(dates[0]);
        let mut days = Vec::with_capacity(dates.len());
        for date in dates {
            let events = ctx.day_events(date).await?;
            days.push(
                Day::new(date, events)
                    .with_link(day_link(ctx, date))
                    .flagged(today, Some(month)),
            );
        }
        weeks.push(MonthWeek {
            week,
            days,
            link: ctx.app.reverse(Route::BrowseWeek {
                year: week_year,
                week,
            }),
        });
    }

    let (prev_year, prev_month) = if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    ctx.render(
        "browse_month",
        json!({
            "weeks": weeks,
            "year": year,
            "month": NaiveDate::from_ymd_opt(year, month, 1),
            "prev_month_link": ctx.app.reverse(Route::BrowseMonth { year: prev_year, month: prev_month }),
            "prev_year": prev_year,
            "prev_month": prev_month,
            "next_month_link": ctx.app.reverse(Route::BrowseMonth { year: next_year, month: next_month }),
            "next_year": next_year,
            "next_month": next_month,
            "reserve_link": reserve_link(ctx),
            "year_link": ctx.app.reverse(Route::BrowseYear { year }),
            "app_name": ctx.app.description,
        }),
    )
}

/// The week grid. `print` selects the printable menu table on food apps.
pub async fn week(ctx: &RequestContext, year: i32, week: u32, print: bool) -> Result<Page> {
    if print && ctx.app.kind == AppKind::Food {
        week_page(ctx, year, week, "week_print", print).await
    } else {
        week_page(ctx, year, week, "browse_week", print).await
    }
}

/// The current ISO week on the landing template.
pub async fn landing(ctx: &RequestContext) -> Result<Page> {
    let (year, week) = iso_week(ctx.today());
    week_page(ctx, year, week, "landing", false).await
}

async fn week_page(
    ctx: &RequestContext,
    year: i32,
    week: u32,
    template: &str,
    print: bool,
) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let weekdays = ctx.planner().visible_days(week_days(year, week)?);
    let monday = *weekdays
        .first()
        .ok_or_else(|| Error::InvalidDate(format!("{year} week {week}")))?;
    let (prev_year, prev_week) = iso_week(shift_days(monday, -7)?);
    let (next_year, next_week) = iso_week(shift_days(monday, 7)?);

    let mut extra = object(json!({
        "week": week,
        "year": year,
        "prev_week_link": ctx.app.reverse(Route::BrowseWeek { year: prev_year, week: prev_week }),
        "prev_week": prev_week,
        "next_week_link": ctx.app.reverse(Route::BrowseWeek { year: next_year, week: next_week }),
        "next_week": next_week,
    }));

    if ctx.app.kind == AppKind::Food {
        extra.insert(
            "reserve_week_link".into(),
            Value::String(ctx.app.reverse(Route::ReserveWeek { year, week })),
        );
        if print {
            extra.insert(
                "table_rows".into(),
                food::week_table_rows(ctx, year, week).await?,
            );
        }
    }

    render_days(ctx, weekdays, template, extra, true).await
}

pub async fn day(ctx: &RequestContext, year: i32, month: u32, day: u32) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::InvalidDate(format!("{year}-{month}-{day}")))?;
    let tomorrow = shift_days(date, 1)?;
    let yesterday = shift_days(date, -1)?;

    let extra = object(json!({
        "date": date,
        "next_day": tomorrow,
        "next_day_link": day_link(ctx, tomorrow),
        "prev_day": yesterday,
        "prev_day_link": day_link(ctx, yesterday),
    }));

    render_days(ctx, vec![date], "browse_day", extra, false).await
}

async fn render_days(
    ctx: &RequestContext,
    dates: Vec<NaiveDate>,
    template: &str,
    extra: Map<String, Value>,
    week_grid: bool,
) -> Result<Page> {
    let (months_mentioned, years_mentioned) = mentioned(ctx, &dates);

    let today = ctx.today();
    let mut days = Vec::with_capacity(dates.len());
    for date in dates {
        let events = if week_grid {
            ctx.week_events(date).await?
        } else {
            ctx.day_events(date).await?
        };
        days.push(
            Day::new(date, events)
                .with_link(day_link(ctx, date))
                .flagged(today, None),
        );
    }

    let planned = ctx.planner().plan(days);

    let mut context = object(json!({
        "days": planned.days,
        "months_mentioned": months_mentioned,
        "years_mentioned": years_mentioned,
        "business_hours": planned.business_hours,
        "hour_height": planned.hour_height,
        "table_max_height": planned.table_max_height,
        "reserve_link": reserve_link(ctx),
        "app_name": ctx.app.description,
    }));
    context.extend(extra);

    ctx.render(template, Value::Object(context))
}

/// Months and years of the first and last displayed day, without repeats.
fn mentioned(ctx: &RequestContext, dates: &[NaiveDate]) -> (Vec<Mention>, Vec<Mention>) {
    let mut months: Vec<Mention> = Vec::new();
    let mut years: Vec<Mention> = Vec::new();
    for date in [dates.first(), dates.last()].into_iter().flatten() {
        if !months.iter().any(|m| m.date.month() == date.month()) {
            months.push(Mention {
                date: *date,
                link: ctx.app.reverse(Route::BrowseMonth {
                    year: date.year(),
                    month: date.month(),
                }),
            });
        }
        if !years.iter().any(|y| y.date.year() == date.year()) {
            years.push(Mention {
                date: *date,
                link: ctx.app.reverse(Route::BrowseYear { year: date.year() }),
            });
        }
    }
    (months, years)
}

/// A handful of reservations running now or starting later.
pub async fn upcoming(ctx: &RequestContext) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page);
    }

    let reservations = ctx
        .store()
        .upcoming(ctx.namespace(), ctx.now, UPCOMING_LIMIT)
        .await?;
    let today = ctx.today();
    let entries: Vec<UpcomingEntry> = reservations
        .iter()
        .map(|res| UpcomingEntry {
            id: res.id,
            description: &res.description,
            start: res.start,
            stop: res.stop,
            creator_name: res.creator_name(),
            link: ctx.app.reverse(Route::Details { pk: res.id }),
            is_next_week: res.is_next_week(today),
        })
        .collect();

    Ok(Page::Data(json!({
        "app_name": ctx.app.description,
        "reservations": entries,
    })))
}

/// iCalendar export of every reservation of the application.
pub async fn feed(ctx: &RequestContext) -> Result<Response> {
    if let Some(page) = ctx.gate(&[Capability::View], None)? {
        return Ok(page.into_response());
    }

    let reservations = ctx.store().list(ctx.namespace()).await?;
    tracing::debug!(namespace = ctx.namespace(), count = reservations.len(), "exporting feed");
    Ok((
        [(header::CONTENT_TYPE, "text/calendar")],
        ics::feed(&ctx.app, &reservations),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::views::testing::{ctx, rendered, site};
    use chrono::NaiveDateTime;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    async fn book(ctx: &RequestContext, start: NaiveDateTime, stop: NaiveDateTime, what: &str) {
        let owner = User::new("alice", "Alice Smith");
        ctx.store()
            .insert(Reservation::draft(ctx.namespace(), &owner, start, stop).with_description(what))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn week_packs_columns_and_links() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", Some("alice"));
        book(&ctx, at(6, 9, 0), at(6, 11, 0), "a").await;
        book(&ctx, at(6, 10, 0), at(6, 12, 0), "b").await;

        let page = rendered(week(&ctx, 2024, 19, false).await.unwrap());
        assert_eq!(page.template, "lyra/browse_week.html");
        let context = &page.context;
        assert_eq!(context["business_hours"], json!([9, 10, 11, 12, 13]));
        assert_eq!(context["reserve_link"], "/lyra/reservation/");
        assert_eq!(context["prev_week_link"], "/lyra/date/2024/week/18/");

        let monday = &context["days"][0];
        assert_eq!(monday["event_columns"].as_array().unwrap().len(), 2);
        let first = &monday["event_columns"][0][0];
        assert_eq!(first["top"], 0);
        assert_eq!(first["height"], 8 * 15);
        assert_eq!(first["can_update"], true);
        assert_eq!(first["link"], "/lyra/reservation/1/");
        // Wednesday 2024-05-08 is today
        assert_eq!(context["days"][2]["css_class"], "today");
    }

    #[tokio::test]
    async fn empty_week_has_no_days() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        let page = rendered(week(&ctx, 2024, 19, false).await.unwrap());
        assert_eq!(page.context["days"], json!([]));
        assert_eq!(page.context["business_hours"], json!([]));
        // anonymous users may look but not book
        assert_eq!(page.context["reserve_link"], Value::Null);
    }

    #[tokio::test]
    async fn other_users_cannot_edit() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", Some("bob"));
        book(&ctx, at(6, 9, 0), at(6, 10, 0), "a").await;
        let page = rendered(week(&ctx, 2024, 19, false).await.unwrap());
        let event = &page.context["days"][0]["event_columns"][0][0];
        assert_eq!(event["can_update"], false);
        assert_eq!(event["can_remove"], false);
    }

    #[tokio::test]
    async fn drive_week_requires_login() {
        let site = site(&[AppKind::Drive]);
        let ctx = ctx(&site, "drive", None);
        match week(&ctx, 2024, 19, false).await.unwrap() {
            Page::Forbidden(page) => assert_eq!(page.context["reason"], "admin"),
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn landing_shows_the_current_week() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        let page = rendered(landing(&ctx).await.unwrap());
        assert_eq!(page.template, "lyra/landing.html");
        assert_eq!(page.context["week"], 19);
        assert_eq!(page.context["year"], 2024);
    }

    #[tokio::test]
    async fn index_always_offers_next_year() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        book(&ctx, at(6, 9, 0), at(6, 10, 0), "a").await;
        let page = rendered(index(&ctx).await.unwrap());
        let years = page.context["years"].as_array().unwrap();
        assert_eq!(years.len(), 2);
        assert_eq!(years[0]["year"], 2024);
        assert_eq!(years[0]["reservation_count"], 1);
        assert_eq!(years[1]["year"], 2025);
        assert_eq!(years[1]["reservation_count"], 0);
    }

    #[tokio::test]
    async fn year_counts_per_month() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        book(&ctx, at(6, 9, 0), at(6, 10, 0), "a").await;
        let page = rendered(year(&ctx, 2024).await.unwrap());
        assert_eq!(page.context["months"][4]["reservation_count"], 1);
        assert_eq!(page.context["months"][5]["reservation_count"], 0);
        assert_eq!(page.context["next_year_link"], "/lyra/date/2025/");
    }

    #[tokio::test]
    async fn month_wraps_around_the_year() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        let page = rendered(month(&ctx, 2024, 1).await.unwrap());
        assert_eq!(page.context["prev_month_link"], "/lyra/date/2023/12/");
        assert_eq!(page.context["next_month_link"], "/lyra/date/2024/2/");
        let first = &page.context["weeks"][0];
        assert_eq!(first["link"], "/lyra/date/2024/week/1/");
        assert!(month(&ctx, 2024, 13).await.is_err());
    }

    #[tokio::test]
    async fn day_view_links_neighbours() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        book(&ctx, at(6, 22, 0), at(8, 2, 0), "trip").await;
        let page = rendered(day(&ctx, 2024, 5, 7).await.unwrap());
        assert_eq!(page.template, "lyra/browse_day.html");
        assert_eq!(page.context["next_day_link"], "/lyra/date/2024/5/8/");
        let event = &page.context["days"][0]["event_columns"][0][0];
        assert_eq!(event["start"], "2024-05-07T00:00:00");
        assert_eq!(event["one_day"], false);
        assert!(day(&ctx, 2024, 2, 30).await.is_err());
    }

    #[tokio::test]
    async fn edges_of_the_calendar_are_invalid_dates() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        let (max, min) = (NaiveDate::MAX, NaiveDate::MIN);

        assert!(matches!(
            day(&ctx, max.year(), max.month(), max.day()).await,
            Err(Error::InvalidDate(_))
        ));
        assert!(matches!(
            day(&ctx, min.year(), min.month(), min.day()).await,
            Err(Error::InvalidDate(_))
        ));
        assert!(matches!(
            month(&ctx, min.year(), min.month()).await,
            Err(Error::InvalidDate(_))
        ));
        assert!(matches!(
            month(&ctx, max.year(), max.month()).await,
            Err(Error::InvalidDate(_))
        ));
    }

    #[tokio::test]
    async fn upcoming_is_capped() {
        let site = site(&[AppKind::Lyra]);
        let ctx = ctx(&site, "lyra", None);
        for d in 9..15 {
            book(&ctx, at(d, 9, 0), at(d, 10, 0), "later").await;
        }
        match upcoming(&ctx).await.unwrap() {
            Page::Data(data) => {
                assert_eq!(data["reservations"].as_array().unwrap().len(), UPCOMING_LIMIT)
            }
            other => panic!("expected data, got {other:?}"),
        }
    }
}
