//! Namespaced reservation calendars served over HTTP.
//!
//! Several scheduling applications (plain calendars, vehicle bookings, duty
//! rosters and cafeteria menus) share one server and one reservation store.
//! Each lives under its own namespace with its own access rules and
//! templates. The week and day grids are laid out by [`calendar`].

pub mod app;
pub mod calendar;
pub mod config;
pub mod contrib;
pub mod error;
pub mod forms;
pub mod ics;
pub mod model;
pub mod permissions;
pub mod server;
pub mod store;
pub mod templates;
pub mod views;

pub use error::{Error, Result};
