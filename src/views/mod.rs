//! Request handling for mounted applications.
//!
//! Views are plain async functions over a [`RequestContext`]; the HTTP
//! layer only extracts parameters and turns the resulting [`Page`] into a
//! response.

pub mod browse;
pub mod crud;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::app::{App, AppKind, AppRegistry, Page, Route};
use crate::calendar::{DayEvent, DayPlanner};
use crate::config::Config;
use crate::contrib::food;
use crate::error::Result;
use crate::model::{DutyPerson, Reservation, User};
use crate::permissions::{check_forbidden, AccessPolicy, Actor, Capability};
use crate::store::ReservationStore;
use crate::templates::TemplateSet;

/// Everything shared by all mounted applications.
pub struct Site {
    pub store: Arc<dyn ReservationStore>,
    pub templates: TemplateSet,
    pub registry: AppRegistry,
    pub users: HashMap<String, User>,
    pub duty_persons: Vec<DutyPerson>,
    pub quarter_height: u32,
}

impl Site {
    pub fn from_config(config: &Config, store: Arc<dyn ReservationStore>) -> Result<Self> {
        let templates = match &config.server.templates_dir {
            Some(dir) => TemplateSet::from_dir(dir)?,
            None => TemplateSet::builtin(),
        };

        let mut registry = AppRegistry::new();
        for app in &config.apps {
            registry.register(App::new(app.kind, app.options.clone())?)?;
        }

        Ok(Self {
            store,
            templates,
            registry,
            users: config
                .users
                .iter()
                .map(|user| (user.username.clone(), user.clone()))
                .collect(),
            duty_persons: config.duty_persons.clone(),
            quarter_height: config.server.quarter_height,
        })
    }

    /// Resolve the user named by the front proxy. Unknown names are anonymous.
    pub fn actor(&self, username: Option<&str>) -> Actor {
        match username.map(|name| (name, self.users.get(name))) {
            Some((_, Some(user))) => Actor::user(user.clone()),
            Some((name, None)) => {
                tracing::debug!(username = name, "unknown user, treating as anonymous");
                Actor::anonymous()
            }
            None => Actor::anonymous(),
        }
    }

    pub fn duty_person(&self, id: i64) -> Option<&DutyPerson> {
        self.duty_persons.iter().find(|person| person.id == id)
    }

    /// Display name of a configured user, or the username itself.
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.users
            .get(username)
            .map(User::display_name)
            .unwrap_or(username)
    }
}

/// One request against one application.
pub struct RequestContext {
    pub app: Arc<App>,
    pub site: Arc<Site>,
    pub actor: Actor,
    pub now: NaiveDateTime,
}

impl RequestContext {
    pub fn new(app: Arc<App>, site: Arc<Site>, actor: Actor) -> Self {
        Self {
            app,
            site,
            actor,
            now: Local::now().naive_local(),
        }
    }

    /// Pin the clock.
    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn store(&self) -> &dyn ReservationStore {
        self.site.store.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.app.namespace
    }

    pub fn planner(&self) -> DayPlanner {
        self.app.planner(self.site.quarter_height)
    }

    /// The forbidden page if any of `capabilities` is refused.
    pub fn gate(
        &self,
        capabilities: &[Capability],
        target: Option<&Reservation>,
    ) -> Result<Option<Page>> {
        match check_forbidden(self.app.policy(), &self.actor, capabilities, target) {
            Ok(()) => Ok(None),
            Err(denied) => self.app.forbidden(&self.site.templates, denied).map(Some),
        }
    }

    /// Whether a single capability is granted, for links and buttons.
    pub fn allows(&self, capability: Capability, target: Option<&Reservation>) -> bool {
        matches!(
            self.app.policy().check(capability, &self.actor, target),
            Ok(true)
        )
    }

    pub fn render(&self, template: &str, context: Value) -> Result<Page> {
        self.app
            .get_response(&self.site.templates, template, context)
            .map(Page::Render)
    }

    pub fn redirect(&self, route: Route) -> Page {
        Page::Redirect(self.app.reverse(route))
    }

    /// Reservations touching `date`, projected onto that day.
    pub async fn day_events(&self, date: NaiveDate) -> Result<Vec<DayEvent>> {
        let reservations = self.store().for_date(self.namespace(), date).await?;
        Ok(browse::process_day_events(self, date, &reservations))
    }

    /// One column of the week grid. Menus show their filled meals after
    /// breakfast; other kinds show the plain day.
    pub async fn week_events(&self, date: NaiveDate) -> Result<Vec<DayEvent>> {
        let events = self.day_events(date).await?;
        Ok(match self.app.kind {
            AppKind::Food => food::with_breakfast(date, events),
            _ => events,
        })
    }
}

/// Unwrap a `json!` object literal.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
