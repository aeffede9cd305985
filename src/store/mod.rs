pub mod memory;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ulid::Ulid;

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    Journal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Journal(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Outcome of a compare-and-insert reservation attempt. A code collision is
/// deliberately distinct from a slot conflict: the caller retries the former
/// with a fresh code and surfaces the latter to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Booking),
    SlotTaken,
    CodeTaken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendOutcome {
    Spent(Customer),
    Insufficient { have: i64 },
    NotFound,
}

pub use crate::model::CustomerPatch;

/// The storage interface the engine is written against. Implementations must
/// make `insert_booking_if_slot_free` and `transition_booking` atomic — the
/// engine never does check-then-act around them.
#[async_trait]
pub trait BookingStore: Send + Sync {
    // ── Bookings ─────────────────────────────────────────

    /// True when an active (pending/confirmed) booking holds the slot.
    async fn slot_taken(&self, date: NaiveDate, time: NaiveTime) -> Result<bool, StoreError>;

    /// Compare-and-insert: commits the booking only if its `(date, start_time)`
    /// slot is free of active bookings and its code is unused. Exactly one of
    /// any set of concurrent attempts for the same slot wins.
    async fn insert_booking_if_slot_free(
        &self,
        booking: Booking,
    ) -> Result<InsertOutcome, StoreError>;

    /// Conditional status update: applies only while the current status is in
    /// `expected`, stamping the transition timestamp. Returns `None` (and
    /// changes nothing) otherwise.
    async fn transition_booking(
        &self,
        id: Ulid,
        expected: &[BookingStatus],
        next: BookingStatus,
        at: NaiveDateTime,
    ) -> Result<Option<Booking>, StoreError>;

    async fn find_booking(&self, code: &str) -> Result<Option<Booking>, StoreError>;

    async fn bookings_for_customer(
        &self,
        customer_id: CustomerId,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError>;

    /// Confirmed bookings whose end has passed — today's ended ones plus any
    /// backlog from earlier days.
    async fn bookings_due_for_completion(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Confirmed bookings in the reminder window whose "sent" flag is still
    /// clear: tomorrow's bookings for `DayBefore`, bookings starting within
    /// the next hour for `OneHour`.
    async fn bookings_due_for_reminder(
        &self,
        kind: ReminderKind,
        now: NaiveDateTime,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Flips the reminder flag; returns false when it was already set, which
    /// makes rerunning a partially-failed sweep safe.
    async fn mark_reminder_sent(&self, id: Ulid, kind: ReminderKind)
        -> Result<bool, StoreError>;

    async fn mark_deposit_paid(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;

    // ── Customers ────────────────────────────────────────

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn get_or_create_customer(
        &self,
        id: CustomerId,
        handle: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Customer, StoreError>;

    /// Applies the patch under the per-customer lock; `None` for an unknown
    /// customer.
    async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StoreError>;

    /// Deducts spendable points only when the balance suffices.
    async fn spend_points(&self, id: CustomerId, points: i64) -> Result<SpendOutcome, StoreError>;

    async fn customers_with_birthday(
        &self,
        day: u32,
        month: u32,
    ) -> Result<Vec<Customer>, StoreError>;

    // ── Payments ─────────────────────────────────────────

    async fn record_payment(&self, payment: Payment) -> Result<(), StoreError>;

    // ── Service catalog ──────────────────────────────────

    async fn find_service(&self, slug: &str) -> Result<Option<Service>, StoreError>;

    async fn service_by_id(&self, id: Ulid) -> Result<Option<Service>, StoreError>;

    /// Active services in display order.
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;

    /// Slug-stable upsert: reseeding an existing slug updates its fields but
    /// keeps the original id, so bookings never dangle.
    async fn upsert_service(&self, service: Service) -> Result<Service, StoreError>;
}
