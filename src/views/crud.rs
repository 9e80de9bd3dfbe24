//! Create, show, edit and delete single reservations.

use serde::Deserialize;
use serde_json::json;

use super::RequestContext;
use crate::app::{AppKind, Page, Route};
use crate::contrib::duty;
use crate::error::Result;
use crate::forms::{self, FormData, ReservationFields, ReservationForm};
use crate::model::{Reservation, ReservationId, Style};
use crate::permissions::{Capability, Denied, DEFAULT_REASON};

#[derive(Debug, Default, Deserialize)]
pub struct ReserveQuery {
    pub day: Option<String>,
}

fn render_form(ctx: &RequestContext, template: &str, form: &ReservationForm) -> Result<Page> {
    ctx.render(
        template,
        json!({
            "form": form,
            "styles": Style::ALL,
            "app_name": ctx.app.description,
        }),
    )
}

async fn fetch(ctx: &RequestContext, pk: ReservationId) -> Result<Reservation> {
    let mut res = ctx.store().get(ctx.namespace(), pk).await?;
    if res.person_name.is_empty() {
        res.person_name = ctx.site.display_name(&res.person).to_string();
    }
    Ok(res)
}

pub async fn create_form(ctx: &RequestContext, query: ReserveQuery) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Create], None)? {
        return Ok(page);
    }
    if ctx.app.kind == AppKind::Duty {
        return duty::roster_form(ctx);
    }

    let fields = ReservationFields::initial(query.day.as_deref(), ctx.app.kind.exclusive_by_default());
    render_form(ctx, "reserve", &ReservationForm::unbound(fields))
}

pub async fn create(ctx: &RequestContext, data: FormData) -> Result<Page> {
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Create], None)? {
        return Ok(page);
    }
    let Some(owner) = ctx.actor.as_user().cloned() else {
        let denied = Denied {
            capability: Capability::Create,
            reason: DEFAULT_REASON.to_string(),
        };
        return ctx.app.forbidden(&ctx.site.templates, denied);
    };
    if ctx.app.kind == AppKind::Duty {
        return duty::roster_save(ctx, &owner, &data).await;
    }

    let mut form = ReservationForm::bind(&data);
    form.clean(ctx.store(), ctx.namespace(), None).await?;
    let (Some(start), Some(stop)) = (form.fields.start, form.fields.stop) else {
        return render_form(ctx, "reserve", &form);
    };
    if !form.is_valid() {
        return render_form(ctx, "reserve", &form);
    }

    let mut res = Reservation::draft(ctx.namespace(), &owner, start, stop);
    form.fields.apply(&mut res);
    let res = ctx.store().insert(res).await?;
    tracing::info!(namespace = ctx.namespace(), id = res.id, user = %owner.username, "reservation created");
    Ok(ctx.redirect(Route::Details { pk: res.id }))
}

pub async fn detail(ctx: &RequestContext, pk: ReservationId) -> Result<Page> {
    let res = fetch(ctx, pk).await?;
    if let Some(page) = ctx.gate(&[Capability::View], Some(&res))? {
        return Ok(page);
    }

    let week = res.week();
    ctx.render(
        "details",
        json!({
            "object": res,
            "creator_name": res.creator_name(),
            "one_day": res.one_day(),
            "can_update": ctx.allows(Capability::Edit, Some(&res)),
            "can_remove": ctx.allows(Capability::Delete, Some(&res)),
            "update_link": ctx.app.reverse(Route::Update { pk }),
            "remove_link": ctx.app.reverse(Route::Remove { pk }),
            "week_link": ctx.app.reverse(Route::BrowseWeek { year: week.year, week: week.week }),
            "app_name": ctx.app.description,
        }),
    )
}

pub async fn update_form(ctx: &RequestContext, pk: ReservationId) -> Result<Page> {
    let res = fetch(ctx, pk).await?;
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Edit], Some(&res))? {
        return Ok(page);
    }

    let fields = ReservationFields::from_reservation(&res, ctx.app.kind.exclusive_by_default());
    render_form(ctx, "update", &ReservationForm::unbound(fields))
}

pub async fn update(ctx: &RequestContext, pk: ReservationId, data: FormData) -> Result<Page> {
    let mut res = fetch(ctx, pk).await?;
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Edit], Some(&res))? {
        return Ok(page);
    }

    let mut form = ReservationForm::bind(&data);
    form.clean(ctx.store(), ctx.namespace(), Some(pk)).await?;
    if !form.is_valid() {
        return render_form(ctx, "update", &form);
    }

    form.fields.apply(&mut res);
    ctx.store().update(res).await?;
    tracing::info!(namespace = ctx.namespace(), id = pk, "reservation updated");
    Ok(ctx.redirect(Route::Details { pk }))
}

fn render_remove(ctx: &RequestContext, res: &Reservation, errors: &forms::FormErrors) -> Result<Page> {
    ctx.render(
        "remove",
        json!({
            "object": res,
            "errors": errors,
            "app_name": ctx.app.description,
        }),
    )
}

pub async fn delete_form(ctx: &RequestContext, pk: ReservationId) -> Result<Page> {
    let res = fetch(ctx, pk).await?;
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Delete], Some(&res))? {
        return Ok(page);
    }
    render_remove(ctx, &res, &forms::FormErrors::default())
}

pub async fn delete(ctx: &RequestContext, pk: ReservationId, data: FormData) -> Result<Page> {
    let res = fetch(ctx, pk).await?;
    if let Some(page) = ctx.gate(&[Capability::View, Capability::Delete], Some(&res))? {
        return Ok(page);
    }

    let errors = forms::confirm(&data);
    if !errors.is_empty() {
        return render_remove(ctx, &res, &errors);
    }

    ctx.store().delete(ctx.namespace(), pk).await?;
    tracing::info!(namespace = ctx.namespace(), id = pk, "reservation deleted");
    let week = res.week();
    Ok(ctx.redirect(Route::BrowseWeek {
        year: week.year,
        week: week.week,
    }))
}
