//! Reservation storage.
//!
//! The store is reached only through [`ReservationStore`]; every query is
//! scoped to one application namespace. Results come back ordered by
//! `(start, id)`, which is the order the layout engine packs columns in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result, StoreError};
use crate::model::{Reservation, ReservationId};

/// First and last second of a day.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (
        date.and_time(NaiveTime::MIN),
        date.and_hms_opt(23, 59, 59).unwrap_or(date.and_time(NaiveTime::MIN)),
    )
}

/// Whether `res` lies within `[start, stop]` or straddles either bound.
pub fn in_range(res: &Reservation, start: NaiveDateTime, stop: NaiveDateTime) -> bool {
    (res.start >= start && res.stop <= stop)
        || (res.start < start && res.stop > start)
        || (res.start < stop && res.stop > stop)
}

/// First and last second of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("{year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::InvalidDate(format!("{year}-{month}")))?;
    let last = next.pred_opt().unwrap_or(first);
    Ok((day_bounds(first).0, day_bounds(last).1))
}

/// Trait for reservation storage backends.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Get a reservation by id within a namespace.
    async fn get(&self, namespace: &str, id: ReservationId) -> Result<Reservation>;

    /// Store a new reservation and return it with its id assigned.
    async fn insert(&self, reservation: Reservation) -> Result<Reservation>;

    /// Replace an existing reservation.
    async fn update(&self, reservation: Reservation) -> Result<Reservation>;

    /// Delete a reservation.
    async fn delete(&self, namespace: &str, id: ReservationId) -> Result<()>;

    /// All reservations of a namespace.
    async fn list(&self, namespace: &str) -> Result<Vec<Reservation>>;

    /// Reservations touching any part of `date`.
    async fn for_date(&self, namespace: &str, date: NaiveDate) -> Result<Vec<Reservation>> {
        let (start, stop) = day_bounds(date);
        Ok(self
            .list(namespace)
            .await?
            .into_iter()
            .filter(|res| res.touches(start, stop))
            .collect())
    }

    /// Reservations inside `[start, stop]` or straddling one of its bounds.
    async fn date_range(
        &self,
        namespace: &str,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<Reservation>> {
        Ok(self
            .list(namespace)
            .await?
            .into_iter()
            .filter(|res| in_range(res, start, stop))
            .collect())
    }

    /// Number of reservations a new `[start, stop]` booking would overlap.
    async fn would_conflict(
        &self,
        namespace: &str,
        start: NaiveDateTime,
        stop: NaiveDateTime,
        exclude: Option<ReservationId>,
    ) -> Result<usize> {
        Ok(self
            .date_range(namespace, start, stop)
            .await?
            .iter()
            .filter(|res| Some(res.id) != exclude)
            .count())
    }

    async fn month(&self, namespace: &str, year: i32, month: u32) -> Result<Vec<Reservation>> {
        let (start, stop) = month_bounds(year, month)?;
        self.date_range(namespace, start, stop).await
    }

    async fn year(&self, namespace: &str, year: i32) -> Result<Vec<Reservation>> {
        let (start, _) = month_bounds(year, 1)?;
        let (_, stop) = month_bounds(year, 12)?;
        self.date_range(namespace, start, stop).await
    }

    /// Distinct years in which reservations start, ascending.
    async fn years(&self, namespace: &str) -> Result<Vec<i32>> {
        let mut years: Vec<i32> = self
            .list(namespace)
            .await?
            .iter()
            .map(|res| res.start.year())
            .collect();
        years.dedup();
        Ok(years)
    }

    async fn find_starting_at(
        &self,
        namespace: &str,
        start: NaiveDateTime,
    ) -> Result<Option<Reservation>> {
        Ok(self
            .list(namespace)
            .await?
            .into_iter()
            .find(|res| res.start == start))
    }

    /// Reservations running at `now` or starting later, earliest first.
    async fn upcoming(
        &self,
        namespace: &str,
        now: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<Reservation>> {
        Ok(self
            .list(namespace)
            .await?
            .into_iter()
            .filter(|res| res.stop >= now)
            .take(limit)
            .collect())
    }
}

/// In-memory store for tests and single-process deployments.
pub struct MemoryStore {
    reservations: RwLock<BTreeMap<ReservationId, Reservation>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            reservations: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn get(&self, namespace: &str, id: ReservationId) -> Result<Reservation> {
        let reservations = self.reservations.read().map_err(|_| StoreError::Poisoned)?;
        match reservations.get(&id) {
            Some(res) if res.namespace == namespace => Ok(res.clone()),
            Some(res) => Err(StoreError::WrongNamespace {
                id,
                namespace: res.namespace.clone(),
            }
            .into()),
            None => Err(StoreError::NotFound(id).into()),
        }
    }

    async fn insert(&self, mut reservation: Reservation) -> Result<Reservation> {
        reservation.validate()?;
        reservation.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut reservations = self.reservations.write().map_err(|_| StoreError::Poisoned)?;
        reservations.insert(reservation.id, reservation.clone());
        tracing::debug!(id = reservation.id, namespace = %reservation.namespace, "reservation created");
        Ok(reservation)
    }

    async fn update(&self, reservation: Reservation) -> Result<Reservation> {
        reservation.validate()?;
        let mut reservations = self.reservations.write().map_err(|_| StoreError::Poisoned)?;
        match reservations.get_mut(&reservation.id) {
            Some(existing) if existing.namespace == reservation.namespace => {
                *existing = reservation.clone();
                tracing::debug!(id = reservation.id, "reservation updated");
                Ok(reservation)
            }
            Some(_) | None => Err(StoreError::NotFound(reservation.id).into()),
        }
    }

    async fn delete(&self, namespace: &str, id: ReservationId) -> Result<()> {
        let mut reservations = self.reservations.write().map_err(|_| StoreError::Poisoned)?;
        match reservations.get(&id) {
            Some(res) if res.namespace == namespace => {
                reservations.remove(&id);
                tracing::debug!(id, namespace, "reservation deleted");
                Ok(())
            }
            _ => Err(StoreError::NotFound(id).into()),
        }
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Reservation>> {
        let reservations = self.reservations.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<Reservation> = reservations
            .values()
            .filter(|res| res.namespace == namespace)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}
