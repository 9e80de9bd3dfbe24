//! Scheduling application instances and their namespaces.
//!
//! An [`App`] is one mounted calendar: it knows its kind, its namespace
//! (which is also its URL prefix and the scope of its reservations), how to
//! build links to its own views and where to look for its templates.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calendar::DayPlanner;
use crate::error::{ConfigError, Error, Result};
use crate::model::ReservationId;
use crate::permissions::{AccessPolicy, CalendarPolicy, Denied, DrivePolicy, DutyPolicy};
use crate::templates::{Rendered, TemplateSet};

/// The four kinds of scheduling application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    /// Generic reservation calendar.
    Lyra,
    /// Vehicle booking.
    Drive,
    /// On-call duty roster.
    Duty,
    /// Cafeteria menu.
    Food,
}

impl AppKind {
    pub fn name(&self) -> &'static str {
        match self {
            AppKind::Lyra => "lyra",
            AppKind::Drive => "drive",
            AppKind::Duty => "duty",
            AppKind::Food => "food",
        }
    }

    /// Template prefixes contributed by the kind and the kinds it extends,
    /// most specific first.
    pub fn lineage(&self) -> &'static [&'static str] {
        match self {
            AppKind::Lyra => &["lyra"],
            AppKind::Drive => &["drive", "lyra"],
            AppKind::Duty => &["duty", "drive", "lyra"],
            AppKind::Food => &["food", "lyra"],
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            AppKind::Lyra => "Calendar",
            AppKind::Drive => "Drive bookings",
            AppKind::Duty => "On-call duty",
            AppKind::Food => "Menu",
        }
    }

    pub fn policy(&self) -> Box<dyn AccessPolicy> {
        match self {
            AppKind::Lyra | AppKind::Food => Box::new(CalendarPolicy),
            AppKind::Drive => Box::<DrivePolicy>::default(),
            AppKind::Duty => Box::<DutyPolicy>::default(),
        }
    }

    /// Whether the reservation form starts with "no overlap" ticked.
    pub fn exclusive_by_default(&self) -> bool {
        matches!(self, AppKind::Drive | AppKind::Duty)
    }

    pub fn display_weekends(&self) -> bool {
        !matches!(self, AppKind::Food)
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A view of an application, with the values its URL needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    BrowseIndex,
    BrowseYear { year: i32 },
    BrowseMonth { year: i32, month: u32 },
    BrowseWeek { year: i32, week: u32 },
    BrowseDay { year: i32, month: u32, day: u32 },
    Reserve,
    Update { pk: ReservationId },
    Details { pk: ReservationId },
    Remove { pk: ReservationId },
    Upcoming,
    Feed,
    MonthReport { year: i32, month: u32 },
    ReserveWeek { year: i32, week: u32 },
}

impl Route {
    /// Path below the application prefix.
    pub fn path(&self) -> String {
        match *self {
            Route::Landing => String::new(),
            Route::BrowseIndex => "date/".into(),
            Route::BrowseYear { year } => format!("date/{year}/"),
            Route::BrowseMonth { year, month } => format!("date/{year}/{month}/"),
            Route::BrowseWeek { year, week } => format!("date/{year}/week/{week}/"),
            Route::BrowseDay { year, month, day } => format!("date/{year}/{month}/{day}/"),
            Route::Reserve => "reservation/".into(),
            Route::Update { pk } => format!("reservation/{pk}/edit/"),
            Route::Details { pk } => format!("reservation/{pk}/"),
            Route::Remove { pk } => format!("reservation/{pk}/remove/"),
            Route::Upcoming => "upcoming/".into(),
            Route::Feed => "feed.ics".into(),
            Route::MonthReport { year, month } => format!("reservation/hours/{year}/{month}/"),
            Route::ReserveWeek { year, week } => {
                format!("reservation/week-menu/{year}/week/{week}/")
            }
        }
    }
}

/// Settings an application is created from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    pub namespace: Option<String>,
    pub app_name: Option<String>,
    pub app_namespace: Option<String>,
    pub template_prefix: Option<String>,
    pub description: Option<String>,
    pub base_template: Option<String>,
    pub extra_context: Map<String, Value>,
}

/// A mounted scheduling application.
pub struct App {
    pub kind: AppKind,
    pub app_name: String,
    pub namespace: String,
    pub app_namespace: String,
    pub template_prefix: String,
    pub description: String,
    pub base_template: String,
    pub extra_context: Map<String, Value>,
    policy: Box<dyn AccessPolicy>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("kind", &self.kind)
            .field("app_name", &self.app_name)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(kind: AppKind, options: AppOptions) -> Result<Self> {
        let app_name = options
            .app_name
            .unwrap_or_else(|| kind.name().to_string());
        if app_name.is_empty() {
            return Err(ConfigError::MissingField("app_name".into()).into());
        }

        let namespace = options.namespace.unwrap_or_else(|| app_name.clone());
        if namespace.is_empty() || namespace.contains('/') {
            return Err(ConfigError::Invalid(format!("bad namespace `{namespace}`")).into());
        }

        Ok(Self {
            kind,
            app_namespace: options.app_namespace.unwrap_or_else(|| namespace.clone()),
            template_prefix: options
                .template_prefix
                .unwrap_or_else(|| app_name.clone()),
            description: options
                .description
                .unwrap_or_else(|| kind.default_description().to_string()),
            base_template: options.base_template.unwrap_or_else(|| "base".to_string()),
            extra_context: options.extra_context,
            policy: kind.policy(),
            app_name,
            namespace,
        })
    }

    pub fn policy(&self) -> &dyn AccessPolicy {
        self.policy.as_ref()
    }

    pub fn planner(&self, quarter_height: u32) -> DayPlanner {
        let planner = DayPlanner::new(quarter_height);
        if self.kind.display_weekends() {
            planner
        } else {
            planner.hide_weekends()
        }
    }

    /// Absolute path of a view of this application.
    pub fn reverse(&self, route: Route) -> String {
        format!("/{}/{}", self.namespace, route.path())
    }

    /// Template search path, most specific first.
    ///
    /// For every prefix (the instance prefix, then the kind lineage), every
    /// template and every extension: the denominator-specific
    /// `prefix/custom/denominator/name.ext` when a denominator is given,
    /// then `prefix/name.ext`. Bare `name.ext` entries close the list.
    pub fn template_names(
        &self,
        select: &[&str],
        denominator: Option<&str>,
        extensions: &[&str],
    ) -> Vec<String> {
        let prefixes = std::iter::once(self.template_prefix.as_str())
            .chain(self.kind.lineage().iter().copied());

        let mut candidates = Vec::new();
        for prefix in prefixes {
            for template in select {
                for ext in extensions {
                    if let Some(denominator) = denominator {
                        candidates.push(format!("{prefix}/custom/{denominator}/{template}.{ext}"));
                    }
                    candidates.push(format!("{prefix}/{template}.{ext}"));
                }
            }
        }
        for template in select {
            for ext in extensions {
                candidates.push(format!("{template}.{ext}"));
            }
        }
        candidates
    }

    /// Resolve `template` and the base template and wrap the context.
    pub fn get_response(
        &self,
        templates: &TemplateSet,
        template: &str,
        context: Value,
    ) -> Result<Rendered> {
        self.render(templates, &[template], None, context)
    }

    pub fn render(
        &self,
        templates: &TemplateSet,
        select: &[&str],
        denominator: Option<&str>,
        context: Value,
    ) -> Result<Rendered> {
        let template = templates.select(&self.template_names(select, denominator, &["html"]))?;
        let base = templates.select(&self.template_names(
            &[self.base_template.as_str()],
            denominator,
            &["html"],
        ))?;

        let mut merged = self.extra_context.clone();
        match context {
            Value::Object(map) => merged.extend(map),
            Value::Null => {}
            other => {
                return Err(Error::App(format!(
                    "context must be an object, got {other}"
                )))
            }
        }

        Ok(Rendered {
            template,
            base,
            current_app: self.app_namespace.clone(),
            context: Value::Object(merged),
        })
    }

    /// The page shown when the permission gate refuses.
    pub fn forbidden(&self, templates: &TemplateSet, denied: Denied) -> Result<Page> {
        tracing::info!(
            namespace = %self.namespace,
            capability = %denied.capability,
            reason = %denied.reason,
            "permission denied"
        );
        let rendered = self.get_response(
            templates,
            "forbidden",
            serde_json::json!({ "reason": denied.reason }),
        )?;
        Ok(Page::Forbidden(rendered))
    }
}

/// Namespace → application lookup, plus the descriptions of every
/// namespace grouped by application name.
#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: Vec<Arc<App>>,
    by_namespace: HashMap<String, Arc<App>>,
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, app: App) -> Result<Arc<App>> {
        if self.by_namespace.contains_key(&app.namespace) {
            return Err(ConfigError::Invalid(format!(
                "namespace `{}` registered twice",
                app.namespace
            ))
            .into());
        }

        let app = Arc::new(app);
        self.namespaces
            .entry(app.app_name.clone())
            .or_default()
            .insert(app.namespace.clone(), app.description.clone());
        self.by_namespace
            .insert(app.namespace.clone(), Arc::clone(&app));
        self.apps.push(Arc::clone(&app));
        tracing::debug!(namespace = %app.namespace, kind = %app.kind, "registered application");
        Ok(app)
    }

    pub fn get_by_namespace(&self, namespace: &str) -> Option<Arc<App>> {
        self.by_namespace.get(namespace).cloned()
    }

    pub fn apps(&self) -> &[Arc<App>] {
        &self.apps
    }

    /// `{app_name: {namespace: description}}`.
    pub fn all_namespaces(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.namespaces
    }
}

/// What a view hands back to the HTTP layer.
#[derive(Debug)]
pub enum Page {
    Render(Rendered),
    Forbidden(Rendered),
    /// Bare data for views that have no template.
    Data(Value),
    Redirect(String),
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        match self {
            Page::Render(rendered) => Json(rendered).into_response(),
            Page::Forbidden(rendered) => (StatusCode::FORBIDDEN, Json(rendered)).into_response(),
            Page::Data(value) => Json(value).into_response(),
            Page::Redirect(location) => {
                (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
            }
        }
    }
}
