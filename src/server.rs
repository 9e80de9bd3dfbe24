//! HTTP routing. Each mounted application gets its own set of routes below
//! `/<namespace>/`; handlers only extract parameters and call the views.

use std::{convert::Infallible, io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{Form, FromRequestParts, Path, Query},
    http::request::Parts,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::{net::TcpListener, signal};

use crate::app::{App, AppKind, Page};
use crate::contrib::{duty, food};
use crate::error::Result;
use crate::forms::FormData;
use crate::model::ReservationId;
use crate::views::{browse, crud, RequestContext, Site};

/// Header a trusted front proxy puts the authenticated username in.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

#[derive(Clone)]
struct AppState {
    app: Arc<App>,
    site: Arc<Site>,
}

/// The request context, built from the app state and the remote user.
struct Ctx(RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|value| value.to_str().ok());
        let actor = state.site.actor(username);
        tracing::debug!(
            method = %parts.method,
            uri = %parts.uri,
            namespace = %state.app.namespace,
            user = username.unwrap_or("-"),
            "request"
        );
        Ok(Ctx(RequestContext::new(
            Arc::clone(&state.app),
            Arc::clone(&state.site),
            actor,
        )))
    }
}

#[derive(Deserialize)]
struct WeekQuery {
    print: Option<String>,
}

async fn landing(Ctx(ctx): Ctx) -> Result<Page> {
    browse::landing(&ctx).await
}

async fn browse_index(Ctx(ctx): Ctx) -> Result<Page> {
    browse::index(&ctx).await
}

async fn browse_year(Ctx(ctx): Ctx, Path(year): Path<i32>) -> Result<Page> {
    browse::year(&ctx, year).await
}

async fn browse_month(Ctx(ctx): Ctx, Path((year, month)): Path<(i32, u32)>) -> Result<Page> {
    browse::month(&ctx, year, month).await
}

async fn browse_week(
    Ctx(ctx): Ctx,
    Path((year, week)): Path<(i32, u32)>,
    Query(query): Query<WeekQuery>,
) -> Result<Page> {
    browse::week(&ctx, year, week, query.print.is_some()).await
}

async fn browse_day(
    Ctx(ctx): Ctx,
    Path((year, month, day)): Path<(i32, u32, u32)>,
) -> Result<Page> {
    browse::day(&ctx, year, month, day).await
}

async fn reserve_form(Ctx(ctx): Ctx, Query(query): Query<crud::ReserveQuery>) -> Result<Page> {
    crud::create_form(&ctx, query).await
}

async fn reserve(Ctx(ctx): Ctx, Form(data): Form<FormData>) -> Result<Page> {
    crud::create(&ctx, data).await
}

async fn details(Ctx(ctx): Ctx, Path(pk): Path<ReservationId>) -> Result<Page> {
    crud::detail(&ctx, pk).await
}

async fn update_form(Ctx(ctx): Ctx, Path(pk): Path<ReservationId>) -> Result<Page> {
    crud::update_form(&ctx, pk).await
}

async fn update(
    Ctx(ctx): Ctx,
    Path(pk): Path<ReservationId>,
    Form(data): Form<FormData>,
) -> Result<Page> {
    crud::update(&ctx, pk, data).await
}

async fn remove_form(Ctx(ctx): Ctx, Path(pk): Path<ReservationId>) -> Result<Page> {
    crud::delete_form(&ctx, pk).await
}

async fn remove(
    Ctx(ctx): Ctx,
    Path(pk): Path<ReservationId>,
    Form(data): Form<FormData>,
) -> Result<Page> {
    crud::delete(&ctx, pk, data).await
}

async fn upcoming(Ctx(ctx): Ctx) -> Result<Page> {
    browse::upcoming(&ctx).await
}

async fn feed(Ctx(ctx): Ctx) -> Result<Response> {
    browse::feed(&ctx).await
}

async fn month_report(Ctx(ctx): Ctx, Path((year, month)): Path<(i32, u32)>) -> Result<Page> {
    duty::month_report(&ctx, year, month).await
}

async fn reserve_week_form(Ctx(ctx): Ctx, Path((year, week)): Path<(i32, u32)>) -> Result<Page> {
    food::reserve_week_form(&ctx, year, week).await
}

async fn reserve_week(
    Ctx(ctx): Ctx,
    Path((year, week)): Path<(i32, u32)>,
    Form(data): Form<FormData>,
) -> Result<Page> {
    food::reserve_week(&ctx, year, week, data).await
}

fn app_router(app: Arc<App>, site: Arc<Site>) -> Router {
    // Mirrors `Route::path`, with captures in place of the values.
    let namespace = app.namespace.clone();
    let at = |path: &str| format!("/{namespace}/{path}");

    let mut router = Router::new()
        .route(&format!("/{namespace}"), get(landing))
        .route(&at(""), get(landing))
        .route(&at("date/"), get(browse_index))
        .route(&at("date/:year/"), get(browse_year))
        .route(&at("date/:year/:month/"), get(browse_month))
        .route(&at("date/:year/week/:week/"), get(browse_week))
        .route(&at("date/:year/:month/:day/"), get(browse_day))
        .route(&at("reservation/"), get(reserve_form).post(reserve))
        .route(&at("reservation/:pk/"), get(details))
        .route(&at("reservation/:pk/edit/"), get(update_form).post(update))
        .route(&at("reservation/:pk/remove/"), get(remove_form).post(remove))
        .route(&at("upcoming/"), get(upcoming))
        .route(&at("feed.ics"), get(feed));

    match app.kind {
        AppKind::Duty => {
            router = router.route(&at("reservation/hours/:year/:month/"), get(month_report));
        }
        AppKind::Food => {
            router = router.route(
                &at("reservation/week-menu/:year/week/:week/"),
                get(reserve_week_form).post(reserve_week),
            );
        }
        AppKind::Lyra | AppKind::Drive => {}
    }

    router.with_state(AppState { app, site })
}

/// Routes of every registered application plus a directory at `/`.
pub fn router(site: Arc<Site>) -> Router {
    let directory = Arc::clone(&site);
    let mut router = Router::new().route(
        "/",
        get(move || {
            let directory = Arc::clone(&directory);
            async move { Json(directory.registry.all_namespaces().clone()) }
        }),
    );

    for app in site.registry.apps() {
        tracing::info!(namespace = %app.namespace, kind = %app.kind, "mounting application");
        router = router.merge(app_router(Arc::clone(app), Arc::clone(&site)));
    }

    router.fallback(|| async { crate::error::Error::NotFound.into_response() })
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
    }
    tracing::info!("Shutting down");
}

pub async fn serve(site: Arc<Site>, addr: SocketAddr) -> io::Result<()> {
    let router = router(site);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening at http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
