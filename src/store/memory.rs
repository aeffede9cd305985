use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::journal::Journal;
use crate::model::*;
use crate::store::{
    BookingStore, CustomerPatch, InsertOutcome, SpendOutcome, StoreError,
};

/// In-process store over sharded maps, durable via a write-behind event
/// journal. Mutations commit to the maps first and are journalled after;
/// map guards are never held across an await.
///
/// Lock order where two maps are touched: `slots` before `codes`. No other
/// path acquires both.
pub struct MemStore {
    bookings: DashMap<Ulid, Booking>,
    codes: DashMap<String, Ulid>,
    /// Slot index: one entry per active booking. Terminal transitions remove
    /// the entry, which is what frees the slot for rebooking.
    slots: DashMap<(NaiveDate, NaiveTime), Ulid>,
    customers: DashMap<CustomerId, Customer>,
    services: DashMap<Ulid, Service>,
    slugs: DashMap<String, Ulid>,
    payments: DashMap<Ulid, Payment>,
    journal: Option<Mutex<Journal>>,
}

impl MemStore {
    /// Journal-less store for tests.
    pub fn ephemeral() -> Self {
        Self::empty(None)
    }

    /// Open a store backed by the journal at `path`, replaying any prior
    /// events to rebuild state.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Journal::replay(path)?;
        let store = Self::empty(Some(Mutex::new(Journal::open(path)?)));
        for event in events {
            store.apply(event);
        }
        Ok(store)
    }

    fn empty(journal: Option<Mutex<Journal>>) -> Self {
        Self {
            bookings: DashMap::new(),
            codes: DashMap::new(),
            slots: DashMap::new(),
            customers: DashMap::new(),
            services: DashMap::new(),
            slugs: DashMap::new(),
            payments: DashMap::new(),
            journal,
        }
    }

    /// Apply one replayed event to the maps. Shares nothing with the live
    /// mutation paths on purpose: replay is single-threaded and must not
    /// re-journal.
    fn apply(&self, event: Event) {
        match event {
            Event::CustomerCreated(c) => match self.customers.entry(c.id) {
                Entry::Vacant(v) => {
                    v.insert(c);
                }
                // A patch append can slip in ahead of the creation append;
                // the placeholder made for it keeps its counters, creation
                // only fills in identity.
                Entry::Occupied(mut e) => {
                    let placeholder = e.get_mut();
                    placeholder.handle = c.handle;
                    placeholder.created_at = c.created_at;
                }
            },
            Event::CustomerPatched { id, patch } => {
                let mut c = self
                    .customers
                    .entry(id)
                    .or_insert_with(|| Customer::new(id, None, NaiveDateTime::default()));
                patch.apply(&mut c);
            }
            Event::ServiceUpserted(s) => {
                self.slugs.insert(s.slug.clone(), s.id);
                self.services.insert(s.id, s);
            }
            Event::BookingCreated(b) => {
                self.codes.insert(b.code.clone(), b.id);
                if b.status.is_active() {
                    self.slots.insert((b.date, b.start_time), b.id);
                }
                self.bookings.insert(b.id, b);
            }
            Event::BookingTransitioned { id, status, at } => {
                if let Some(mut b) = self.bookings.get_mut(&id) {
                    b.status = status;
                    match status {
                        BookingStatus::Cancelled => b.cancelled_at = Some(at),
                        BookingStatus::Completed => b.completed_at = Some(at),
                        _ => {}
                    }
                    let key = (b.date, b.start_time);
                    drop(b);
                    if status.is_terminal() {
                        self.slots.remove_if(&key, |_, bid| *bid == id);
                    }
                }
            }
            Event::ReminderMarked { id, kind } => {
                if let Some(mut b) = self.bookings.get_mut(&id) {
                    match kind {
                        ReminderKind::DayBefore => b.day_before_reminder_sent = true,
                        ReminderKind::OneHour => b.one_hour_reminder_sent = true,
                    }
                }
            }
            Event::DepositPaid { id } => {
                if let Some(mut b) = self.bookings.get_mut(&id) {
                    b.deposit_paid = true;
                }
            }
            Event::PaymentRecorded(p) => {
                self.payments.insert(p.id, p);
            }
        }
    }

    async fn log(&self, event: Event) -> Result<(), StoreError> {
        if let Some(journal) = &self.journal {
            let mut j = journal.lock().await;
            j.append(&event)
                .map_err(|e| StoreError::Journal(e.to_string()))?;
        }
        Ok(())
    }

    /// Synchronous half of the reservation CAS; no journalling here so the
    /// entry guards drop before any await.
    fn try_insert(&self, booking: Booking) -> InsertOutcome {
        match self.slots.entry((booking.date, booking.start_time)) {
            Entry::Occupied(_) => InsertOutcome::SlotTaken,
            Entry::Vacant(slot) => match self.codes.entry(booking.code.clone()) {
                // Leave the slot entry vacant: the caller retries with a
                // fresh code and must not find the slot burned.
                Entry::Occupied(_) => InsertOutcome::CodeTaken,
                Entry::Vacant(code) => {
                    code.insert(booking.id);
                    slot.insert(booking.id);
                    self.bookings.insert(booking.id, booking.clone());
                    InsertOutcome::Inserted(booking)
                }
            },
        }
    }
}

#[async_trait]
impl BookingStore for MemStore {
    async fn slot_taken(&self, date: NaiveDate, time: NaiveTime) -> Result<bool, StoreError> {
        Ok(self.slots.contains_key(&(date, time)))
    }

    async fn insert_booking_if_slot_free(
        &self,
        booking: Booking,
    ) -> Result<InsertOutcome, StoreError> {
        let outcome = self.try_insert(booking);
        if let InsertOutcome::Inserted(b) = &outcome {
            self.log(Event::BookingCreated(b.clone())).await?;
        }
        Ok(outcome)
    }

    async fn transition_booking(
        &self,
        id: Ulid,
        expected: &[BookingStatus],
        next: BookingStatus,
        at: NaiveDateTime,
    ) -> Result<Option<Booking>, StoreError> {
        let updated = {
            let Some(mut b) = self.bookings.get_mut(&id) else {
                return Ok(None);
            };
            if !expected.contains(&b.status) {
                return Ok(None);
            }
            b.status = next;
            match next {
                BookingStatus::Cancelled => b.cancelled_at = Some(at),
                BookingStatus::Completed => b.completed_at = Some(at),
                _ => {}
            }
            b.clone()
        };
        if next.is_terminal() {
            self.slots
                .remove_if(&(updated.date, updated.start_time), |_, bid| *bid == id);
        }
        self.log(Event::BookingTransitioned { id, status: next, at })
            .await?;
        Ok(Some(updated))
    }

    async fn find_booking(&self, code: &str) -> Result<Option<Booking>, StoreError> {
        let Some(id) = self.codes.get(code).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn bookings_for_customer(
        &self,
        customer_id: CustomerId,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        let mut out: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.customer_id == customer_id && statuses.contains(&b.status))
            .map(|b| b.clone())
            .collect();
        out.sort_by_key(|b| b.start_dt());
        Ok(out)
    }

    async fn bookings_due_for_completion(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut out: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed && b.end_dt() < now)
            .map(|b| b.clone())
            .collect();
        out.sort_by_key(|b| b.end_dt());
        Ok(out)
    }

    async fn bookings_due_for_reminder(
        &self,
        kind: ReminderKind,
        now: NaiveDateTime,
    ) -> Result<Vec<Booking>, StoreError> {
        let due = |b: &Booking| -> bool {
            if b.status != BookingStatus::Confirmed || b.reminder_sent(kind) {
                return false;
            }
            match kind {
                ReminderKind::DayBefore => now
                    .date()
                    .succ_opt()
                    .is_some_and(|tomorrow| b.date == tomorrow),
                ReminderKind::OneHour => {
                    let start = b.start_dt();
                    b.date == now.date() && start > now && start <= now + Duration::hours(1)
                }
            }
        };
        let mut out: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| due(b))
            .map(|b| b.clone())
            .collect();
        out.sort_by_key(|b| b.start_dt());
        Ok(out)
    }

    async fn mark_reminder_sent(
        &self,
        id: Ulid,
        kind: ReminderKind,
    ) -> Result<bool, StoreError> {
        let flipped = {
            let Some(mut b) = self.bookings.get_mut(&id) else {
                return Ok(false);
            };
            if b.reminder_sent(kind) {
                false
            } else {
                match kind {
                    ReminderKind::DayBefore => b.day_before_reminder_sent = true,
                    ReminderKind::OneHour => b.one_hour_reminder_sent = true,
                }
                true
            }
        };
        if flipped {
            self.log(Event::ReminderMarked { id, kind }).await?;
        }
        Ok(flipped)
    }

    async fn mark_deposit_paid(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        let updated = {
            let Some(mut b) = self.bookings.get_mut(&id) else {
                return Ok(None);
            };
            b.deposit_paid = true;
            b.clone()
        };
        self.log(Event::DepositPaid { id }).await?;
        Ok(Some(updated))
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.get(&id).map(|c| c.clone()))
    }

    async fn get_or_create_customer(
        &self,
        id: CustomerId,
        handle: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Customer, StoreError> {
        let (customer, created) = match self.customers.entry(id) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(v) => {
                let c = Customer::new(id, handle, now);
                v.insert(c.clone());
                (c, true)
            }
        };
        if created {
            self.log(Event::CustomerCreated(customer.clone())).await?;
        }
        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StoreError> {
        let updated = {
            let Some(mut c) = self.customers.get_mut(&id) else {
                return Ok(None);
            };
            patch.apply(&mut c);
            c.clone()
        };
        // Journalled as the delta, not a snapshot: appends from concurrent
        // updates may land in either order, and patches commute under replay
        // while snapshots would resurrect whichever one appended last.
        self.log(Event::CustomerPatched { id, patch }).await?;
        Ok(Some(updated))
    }

    async fn spend_points(
        &self,
        id: CustomerId,
        points: i64,
    ) -> Result<SpendOutcome, StoreError> {
        let patch = CustomerPatch::SpendPoints { points };
        let outcome = {
            let Some(mut c) = self.customers.get_mut(&id) else {
                return Ok(SpendOutcome::NotFound);
            };
            if c.points < points {
                SpendOutcome::Insufficient { have: c.points }
            } else {
                patch.apply(&mut c);
                SpendOutcome::Spent(c.clone())
            }
        };
        if let SpendOutcome::Spent(_) = &outcome {
            self.log(Event::CustomerPatched { id, patch }).await?;
        }
        Ok(outcome)
    }

    async fn customers_with_birthday(
        &self,
        day: u32,
        month: u32,
    ) -> Result<Vec<Customer>, StoreError> {
        let mut out: Vec<Customer> = self
            .customers
            .iter()
            .filter(|c| c.birthday == Some(Birthday { day, month }))
            .map(|c| c.clone())
            .collect();
        out.sort_by_key(|c| c.id);
        Ok(out)
    }

    async fn record_payment(&self, payment: Payment) -> Result<(), StoreError> {
        self.payments.insert(payment.id, payment.clone());
        self.log(Event::PaymentRecorded(payment)).await
    }

    async fn find_service(&self, slug: &str) -> Result<Option<Service>, StoreError> {
        let Some(id) = self.slugs.get(slug).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.services.get(&id).map(|s| s.clone()))
    }

    async fn service_by_id(&self, id: Ulid) -> Result<Option<Service>, StoreError> {
        Ok(self.services.get(&id).map(|s| s.clone()))
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let mut out: Vec<Service> = self
            .services
            .iter()
            .filter(|s| s.active)
            .map(|s| s.clone())
            .collect();
        out.sort_by(|a, b| a.display_order.cmp(&b.display_order).then(a.slug.cmp(&b.slug)));
        Ok(out)
    }

    async fn upsert_service(&self, service: Service) -> Result<Service, StoreError> {
        let stored = match self.slugs.entry(service.slug.clone()) {
            Entry::Occupied(e) => {
                let id = *e.get();
                match self.services.get_mut(&id) {
                    Some(mut existing) => {
                        existing.name = service.name;
                        existing.price = service.price;
                        existing.duration_min = service.duration_min;
                        existing.active = service.active;
                        existing.display_order = service.display_order;
                        existing.clone()
                    }
                    // Slug entry without a row only happens on a half-applied
                    // replay tail; repair by reinserting under the mapped id.
                    None => {
                        let repaired = Service { id, ..service };
                        self.services.insert(id, repaired.clone());
                        repaired
                    }
                }
            }
            Entry::Vacant(v) => {
                v.insert(service.id);
                self.services.insert(service.id, service.clone());
                service
            }
        };
        self.log(Event::ServiceUpserted(stored.clone())).await?;
        Ok(stored)
    }
}
