//! Cafeteria menus.
//!
//! Meals are ordinary reservations at fixed times, so a week of menus is
//! edited in one form and shown on the week grid. Breakfast is not stored;
//! it is added to every weekday that has a menu.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use serde_json::{json, Value};

use crate::app::{Page, Route};
use crate::calendar::{week_days, DayEvent};
use crate::error::{Error, Result};
use crate::forms::{value, FormData};
use crate::model::{Reservation, Style, User};
use crate::permissions::{Capability, Denied, DEFAULT_REASON};
use crate::store::ReservationStore;
use crate::views::RequestContext;

/// A meal served at fixed times.
#[derive(Debug, Clone, Copy)]
pub struct Meal {
    pub name: &'static str,
    pub start: (u32, u32),
    pub stop: (u32, u32),
}

impl Meal {
    fn time(hm: (u32, u32)) -> NaiveTime {
        NaiveTime::from_hms_opt(hm.0, hm.1, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn start(&self) -> NaiveTime {
        Self::time(self.start)
    }

    pub fn stop(&self) -> NaiveTime {
        Self::time(self.stop)
    }
}

const LUNCH: Meal = Meal {
    name: "lunch",
    start: (11, 0),
    stop: (12, 45),
};
const DINNER: Meal = Meal {
    name: "dinner",
    start: (16, 0),
    stop: (17, 0),
};
const FRIDAY_LUNCH: Meal = Meal {
    name: "lunch",
    start: (11, 15),
    stop: (12, 0),
};

/// Monday to Thursday serve lunch and dinner, Friday only lunch.
pub fn meals(weekday_index: usize) -> &'static [Meal] {
    if weekday_index < 4 {
        &[LUNCH, DINNER]
    } else {
        &[FRIDAY_LUNCH]
    }
}

const BREAKFAST_START: (u32, u32) = (7, 0);
const BREAKFAST_STOP: (u32, u32) = (8, 30);
const BREAKFAST_DRINKS: &str = "Coffee, tea";
const BREAKFASTS: [&str; 5] = [
    "Oatmeal porridge",
    "Rye flake porridge",
    "Four-grain porridge",
    "Barley flake porridge",
    "Semolina porridge",
];

const ROW_LABELS: [((u32, u32), (u32, u32), &str); 3] = [
    ((7, 0), (8, 45), "Breakfast"),
    ((11, 0), (12, 45), "Lunch"),
    ((16, 0), (17, 0), "Dinner"),
];
const EMPTY_DAY: &str = "(Day left empty)";

/// One meal of the weekly form; inputs are `<prefix>_main` and `<prefix>_other`.
#[derive(Debug, Clone, Serialize)]
pub struct MealField {
    pub prefix: String,
    pub meal: &'static str,
    pub start: chrono::NaiveDateTime,
    pub stop: chrono::NaiveDateTime,
    pub main: String,
    pub other: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayMenu {
    pub date: NaiveDate,
    pub meals: Vec<MealField>,
}

/// Monday to Friday of the week, with the stored menus as initial values.
pub async fn menu_week(
    store: &dyn ReservationStore,
    namespace: &str,
    year: i32,
    week: u32,
) -> Result<Vec<DayMenu>> {
    let mut days = Vec::with_capacity(5);
    for (index, date) in week_days(year, week)?.into_iter().take(5).enumerate() {
        let mut fields = Vec::new();
        for meal in meals(index) {
            let start = date.and_time(meal.start());
            let existing = store.find_starting_at(namespace, start).await?;
            fields.push(MealField {
                prefix: format!("{index}-{}", meal.name),
                meal: meal.name,
                start,
                stop: date.and_time(meal.stop()),
                main: existing.as_ref().map(|r| r.description.clone()).unwrap_or_default(),
                other: existing.map(|r| r.long_description).unwrap_or_default(),
            });
        }
        days.push(DayMenu { date, meals: fields });
    }
    Ok(days)
}

/// Overwrite the initial values with the submitted ones.
pub fn bind_menu(days: &mut [DayMenu], data: &FormData) {
    for field in days.iter_mut().flat_map(|day| day.meals.iter_mut()) {
        field.main = value(data, &format!("{}_main", field.prefix))
            .unwrap_or_default()
            .to_string();
        field.other = value(data, &format!("{}_other", field.prefix))
            .unwrap_or_default()
            .to_string();
    }
}

/// Update the meal starting at each slot, or create it.
pub async fn save_menu(
    store: &dyn ReservationStore,
    namespace: &str,
    owner: &User,
    days: &[DayMenu],
) -> Result<()> {
    for field in days.iter().flat_map(|day| day.meals.iter()) {
        match store.find_starting_at(namespace, field.start).await? {
            Some(mut res) => {
                res.description = field.main.clone();
                res.long_description = field.other.clone();
                store.update(res).await?;
            }
            None => {
                let mut res = Reservation::draft(namespace, owner, field.start, field.stop)
                    .with_description(field.main.clone());
                res.long_description = field.other.clone();
                store.insert(res).await?;
            }
        }
    }
    Ok(())
}

fn render_menu(ctx: &RequestContext, year: i32, week: u32, days: &[DayMenu]) -> Result<Page> {
    ctx.render(
        "reserve_week",
        json!({
            "forms": days,
            "year": year,
            "week": week,
            "week_link": ctx.app.reverse(Route::BrowseWeek { year, week }),
            "app_name": ctx.app.description,
        }),
    )
}

pub async fn reserve_week_form(ctx: &RequestContext, year: i32, week: u32) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Create], None)? {
        return Ok(page);
    }
    let days = menu_week(ctx.store(), ctx.namespace(), year, week).await?;
    render_menu(ctx, year, week, &days)
}

pub async fn reserve_week(
    ctx: &RequestContext,
    year: i32,
    week: u32,
    data: FormData,
) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Create], None)? {
        return Ok(page);
    }
    let Some(owner) = ctx.actor.as_user() else {
        let denied = Denied {
            capability: Capability::Create,
            reason: DEFAULT_REASON.to_string(),
        };
        return ctx.app.forbidden(&ctx.site.templates, denied);
    };

    let mut days = menu_week(ctx.store(), ctx.namespace(), year, week).await?;
    bind_menu(&mut days, &data);
    save_menu(ctx.store(), ctx.namespace(), owner, &days).await?;
    tracing::info!(namespace = ctx.namespace(), year, week, "menu saved");

    Ok(ctx.redirect(Route::BrowseWeek { year, week }))
}

/// Keep the events that say something and open the day with breakfast.
/// Days without a menu stay empty.
pub fn with_breakfast(date: NaiveDate, events: Vec<DayEvent>) -> Vec<DayEvent> {
    let meaningful: Vec<DayEvent> = events.into_iter().filter(DayEvent::is_meaningful).collect();
    if meaningful.is_empty() {
        return meaningful;
    }
    let Some(porridge) = BREAKFASTS.get(date.weekday().num_days_from_monday() as usize) else {
        return meaningful;
    };

    let breakfast = DayEvent::synthetic(
        date.and_time(Meal::time(BREAKFAST_START)),
        date.and_time(Meal::time(BREAKFAST_STOP)),
        *porridge,
        BREAKFAST_DRINKS,
        Style::Yellow,
    );
    std::iter::once(breakfast).chain(meaningful).collect()
}

fn minutes(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// The printable menu: one row per meal, one column per weekday, with a
/// leading label column and a leading date row.
pub async fn week_table_rows(ctx: &RequestContext, year: i32, week: u32) -> Result<Value> {
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(6);
    columns.push(
        std::iter::once(Value::Null)
            .chain(ROW_LABELS.iter().map(|(start, stop, label)| {
                json!({
                    "start": Meal::time(*start),
                    "stop": Meal::time(*stop),
                    "label": label,
                })
            }))
            .collect(),
    );

    for date in week_days(year, week)?.into_iter().take(5) {
        let events = ctx.week_events(date).await?;
        let mut column = vec![json!({ "date": date })];
        for (start, stop, _) in ROW_LABELS {
            let (start, stop) = (minutes(Meal::time(start)), minutes(Meal::time(stop)));
            let cell = events
                .iter()
                .find(|e| minutes(e.start.time()) >= start && minutes(e.stop.time()) <= stop)
                .map(serde_json::to_value)
                .transpose()
                .map_err(Error::Serialization)?
                .unwrap_or(Value::Null);
            column.push(cell);
        }
        if column[1..].iter().all(Value::is_null) {
            column[2] = json!({ "description": EMPTY_DAY });
        }
        columns.push(column);
    }

    let rows: Vec<Value> = (0..=ROW_LABELS.len())
        .map(|row| Value::Array(columns.iter().map(|column| column[row].clone()).collect()))
        .collect();
    Ok(Value::Array(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppKind;
    use crate::views::browse;
    use crate::views::testing::{ctx, rendered, site};

    fn data(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn menu_form_has_dinner_until_thursday() {
        let site = site(&[AppKind::Food]);
        let days = menu_week(site.store.as_ref(), "food", 2024, 19).await.unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(days[3].meals.len(), 2);
        assert_eq!(days[4].meals.len(), 1);
        assert_eq!(days[4].meals[0].prefix, "4-lunch");
        assert_eq!(days[4].meals[0].start.to_string(), "2024-05-10 11:15:00");
        assert_eq!(days[0].meals[1].stop.to_string(), "2024-05-06 17:00:00");
    }

    #[tokio::test]
    async fn saving_twice_updates_in_place() {
        let site = site(&[AppKind::Food]);
        let ctx = ctx(&site, "food", Some("alice"));
        let submitted = data(&[("0-lunch_main", "Pea soup"), ("0-lunch_other", "Pancakes")]);

        let page = reserve_week(&ctx, 2024, 19, submitted).await.unwrap();
        assert!(matches!(page, Page::Redirect(ref to) if to == "/food/date/2024/week/19/"));
        // four days of two meals and Friday's lunch
        assert_eq!(site.store.list("food").await.unwrap().len(), 9);

        reserve_week(&ctx, 2024, 19, data(&[("0-lunch_main", "Fish soup")]))
            .await
            .unwrap();
        let stored = site.store.list("food").await.unwrap();
        assert_eq!(stored.len(), 9);
        assert_eq!(stored[0].description, "Fish soup");
        assert_eq!(stored[0].long_description, "");
    }

    #[tokio::test]
    async fn week_hides_weekends_and_adds_breakfast() {
        let site = site(&[AppKind::Food]);
        let ctx = ctx(&site, "food", Some("alice"));
        reserve_week(&ctx, 2024, 19, data(&[("1-dinner_main", "Stew")]))
            .await
            .unwrap();

        let page = rendered(browse::week(&ctx, 2024, 19, false).await.unwrap());
        let days = page.context["days"].as_array().unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(page.context["reserve_week_link"], "/food/reservation/week-menu/2024/week/19/");

        let tuesday = &days[1]["events"];
        assert_eq!(tuesday.as_array().unwrap().len(), 2);
        assert_eq!(tuesday[0]["description"], "Rye flake porridge");
        assert_eq!(tuesday[0]["long_description"], BREAKFAST_DRINKS);
        assert_eq!(tuesday[1]["description"], "Stew");
        assert_eq!(days[0]["events"], json!([]));
    }

    #[tokio::test]
    async fn month_and_day_show_stored_meals_only() {
        let site = site(&[AppKind::Food]);
        let ctx = ctx(&site, "food", Some("alice"));
        reserve_week(&ctx, 2024, 19, data(&[("1-dinner_main", "Stew")]))
            .await
            .unwrap();

        let page = rendered(browse::month(&ctx, 2024, 5).await.unwrap());
        let tuesday = &page.context["weeks"][1]["days"][1];
        assert_eq!(tuesday["date"], "2024-05-07");
        let events = tuesday["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["description"], "");
        assert_eq!(events[1]["description"], "Stew");

        let page = rendered(browse::day(&ctx, 2024, 5, 7).await.unwrap());
        let events = page.context["days"][0]["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e["description"] != "Rye flake porridge"));
    }

    #[tokio::test]
    async fn print_view_builds_meal_rows() {
        let site = site(&[AppKind::Food]);
        let ctx = ctx(&site, "food", Some("alice"));
        reserve_week(&ctx, 2024, 19, data(&[("0-lunch_main", "Pea soup")]))
            .await
            .unwrap();

        let page = rendered(browse::week(&ctx, 2024, 19, true).await.unwrap());
        assert_eq!(page.template, "food/week_print.html");
        let rows = page.context["table_rows"].as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][1]["date"], "2024-05-06");
        assert_eq!(rows[1][0]["label"], "Breakfast");
        assert_eq!(rows[1][1]["description"], "Oatmeal porridge");
        assert_eq!(rows[2][1]["description"], "Pea soup");
        assert_eq!(rows[3][1], Value::Null);
        assert_eq!(rows[2][2]["description"], EMPTY_DAY);
    }
}
