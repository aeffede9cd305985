use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::store::{CustomerPatch, InsertOutcome};

impl Engine {
    /// Reserve a slot for a customer. Validation order: service, then date,
    /// then time, then the atomic insert — so a caller with several mistakes
    /// hears about them in a stable order. Exactly one of any set of
    /// concurrent reservations for the same slot succeeds.
    pub async fn reserve(
        &self,
        customer_id: CustomerId,
        handle: Option<&str>,
        service_slug: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<Booking, EngineError> {
        let service = self
            .store()
            .find_service(service_slug)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| EngineError::UnknownService(service_slug.to_string()))?;

        if date < now.date() {
            return Err(EngineError::PastDate(date));
        }
        if date == now.date() && start_time < now.time() {
            return Err(EngineError::PastTime(start_time));
        }

        self.store()
            .get_or_create_customer(customer_id, handle.map(String::from), now)
            .await?;

        let (deposit, balance) = deposit_split(service.price, self.config().deposit_percent);
        let duration = Duration::minutes(service.duration_min as i64);
        // A booking never crosses midnight; clamp the pathological case.
        let end_time = match start_time.overflowing_add_signed(duration) {
            (_, days) if days > 0 => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(start_time),
            (t, _) => t,
        };

        let booking = loop {
            let candidate = Booking {
                id: Ulid::new(),
                code: new_booking_code(),
                customer_id,
                service_id: service.id,
                date,
                start_time,
                end_time,
                status: self.config().creation_status.initial(),
                deposit,
                deposit_paid: false,
                balance,
                day_before_reminder_sent: false,
                one_hour_reminder_sent: false,
                created_at: now,
                cancelled_at: None,
                completed_at: None,
            };
            match self.store().insert_booking_if_slot_free(candidate).await? {
                InsertOutcome::Inserted(b) => break b,
                InsertOutcome::SlotTaken => {
                    metrics::counter!(observability::SLOT_CONFLICTS).increment(1);
                    return Err(EngineError::SlotConflict {
                        date,
                        time: start_time,
                    });
                }
                InsertOutcome::CodeTaken => {
                    debug!("booking code collision, retrying");
                    metrics::counter!(observability::CODE_RETRIES).increment(1);
                }
            }
        };

        self.store()
            .update_customer(customer_id, CustomerPatch::IncrementTotal)
            .await?;
        self.store()
            .update_customer(customer_id, CustomerPatch::SetPreferredService(service.id))
            .await?;

        metrics::counter!(observability::RESERVATIONS).increment(1);
        Ok(booking)
    }

    /// Cancel an active booking by code. Only the owner may cancel; a foreign
    /// code resolves as if it didn't exist. The slot is free again as soon as
    /// this returns.
    pub async fn cancel(
        &self,
        customer_id: CustomerId,
        code: &str,
        now: NaiveDateTime,
    ) -> Result<Booking, EngineError> {
        let booking = self.owned_booking(customer_id, code).await?;
        match self
            .store()
            .transition_booking(
                booking.id,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
                BookingStatus::Cancelled,
                now,
            )
            .await?
        {
            Some(cancelled) => {
                self.store()
                    .update_customer(customer_id, CustomerPatch::IncrementCancelled)
                    .await?;
                metrics::counter!(observability::CANCELLATIONS).increment(1);
                Ok(cancelled)
            }
            None => Err(self.rejected(&booking).await),
        }
    }

    /// Complete a confirmed booking whose end time has passed. The same path
    /// the completion sweep takes, exposed for operators.
    pub async fn complete(&self, code: &str, now: NaiveDateTime) -> Result<Booking, EngineError> {
        let booking = self.booking_by_code(code).await?;
        if booking.end_dt() >= now {
            return Err(EngineError::NotYetEnded(booking.code));
        }
        match self.complete_due(&booking, now).await? {
            Some(completed) => Ok(completed),
            None => Err(self.rejected(&booking).await),
        }
    }

    /// Transition a due booking to completed and settle loyalty: base points,
    /// first-completion bonus, milestone reward. `None` when the booking was
    /// no longer confirmed (raced with a cancel or an earlier sweep).
    pub(crate) async fn complete_due(
        &self,
        booking: &Booking,
        now: NaiveDateTime,
    ) -> Result<Option<Booking>, EngineError> {
        let Some(completed) = self
            .store()
            .transition_booking(booking.id, &[BookingStatus::Confirmed], BookingStatus::Completed, now)
            .await?
        else {
            return Ok(None);
        };

        let customer = self
            .store()
            .update_customer(booking.customer_id, CustomerPatch::IncrementCompleted)
            .await?;
        // Judged from the post-increment count: the increment is the atomic
        // step, so concurrent completions see 1 exactly once and the bonus
        // can't be awarded twice.
        let is_first = customer.as_ref().is_some_and(|c| c.completed_bookings == 1);

        self.award_booking_points(booking.customer_id, is_first)
            .await?;
        if let Some(customer) = customer {
            self.maybe_award_milestone(&customer).await?;
        }

        metrics::counter!(observability::COMPLETIONS).increment(1);
        Ok(Some(completed))
    }

    /// Mark a confirmed, ended booking as a no-show. Operator-triggered: the
    /// engine never infers absence on its own, so a no-show always reflects a
    /// human judgement.
    pub async fn mark_no_show(
        &self,
        code: &str,
        now: NaiveDateTime,
    ) -> Result<Booking, EngineError> {
        let booking = self.booking_by_code(code).await?;
        if booking.end_dt() >= now {
            return Err(EngineError::NotYetEnded(booking.code));
        }
        match self
            .store()
            .transition_booking(booking.id, &[BookingStatus::Confirmed], BookingStatus::NoShow, now)
            .await?
        {
            Some(updated) => {
                self.store()
                    .update_customer(booking.customer_id, CustomerPatch::IncrementNoShow)
                    .await?;
                metrics::counter!(observability::NO_SHOWS).increment(1);
                Ok(updated)
            }
            None => Err(self.rejected(&booking).await),
        }
    }

    /// Record a deposit payment attempt against a booking. A completed
    /// payment marks the deposit paid and promotes a pending booking to
    /// confirmed; any other payment status only leaves the payment record.
    pub async fn record_deposit(
        &self,
        code: &str,
        status: PaymentStatus,
        now: NaiveDateTime,
    ) -> Result<Booking, EngineError> {
        let booking = self.booking_by_code(code).await?;
        let payment = Payment {
            id: Ulid::new(),
            booking_id: booking.id,
            customer_id: booking.customer_id,
            amount: booking.deposit,
            kind: PaymentKind::Deposit,
            status,
            created_at: now,
        };
        self.store().record_payment(payment).await?;
        if status != PaymentStatus::Completed {
            return Ok(booking);
        }

        let updated = self
            .store()
            .mark_deposit_paid(booking.id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {code}")))?;
        metrics::counter!(observability::DEPOSITS_CAPTURED).increment(1);

        if updated.status == BookingStatus::Pending {
            if let Some(confirmed) = self
                .store()
                .transition_booking(booking.id, &[BookingStatus::Pending], BookingStatus::Confirmed, now)
                .await?
            {
                return Ok(confirmed);
            }
        }
        Ok(updated)
    }

    /// A customer's active bookings, soonest first.
    pub async fn active_bookings(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Booking>, EngineError> {
        Ok(self
            .store()
            .bookings_for_customer(
                customer_id,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
            )
            .await?)
    }

    pub async fn services(&self) -> Result<Vec<Service>, EngineError> {
        Ok(self.store().list_services().await?)
    }

    pub async fn customer(&self, id: CustomerId) -> Result<Customer, EngineError> {
        self.store()
            .get_customer(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("customer {id}")))
    }

    /// Record a birthday, once. Day/month only; no year is ever stored.
    pub async fn set_birthday(
        &self,
        customer_id: CustomerId,
        day: u32,
        month: u32,
    ) -> Result<Customer, EngineError> {
        let birthday = Birthday { day, month };
        if !birthday.is_valid() {
            return Err(EngineError::InvalidBirthday { day, month });
        }
        let customer = self.customer(customer_id).await?;
        if customer.birthday.is_some() {
            return Err(EngineError::BirthdayAlreadySet(customer_id));
        }
        self.store()
            .update_customer(customer_id, CustomerPatch::SetBirthday(birthday))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("customer {customer_id}")))
    }

    /// Note that the birthday prompt was shown, so it is never shown again.
    pub async fn mark_birthday_prompted(
        &self,
        customer_id: CustomerId,
    ) -> Result<Customer, EngineError> {
        self.store()
            .update_customer(customer_id, CustomerPatch::MarkBirthdayPrompted)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("customer {customer_id}")))
    }

    async fn booking_by_code(&self, code: &str) -> Result<Booking, EngineError> {
        self.store()
            .find_booking(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {code}")))
    }

    async fn owned_booking(
        &self,
        customer_id: CustomerId,
        code: &str,
    ) -> Result<Booking, EngineError> {
        let booking = self.booking_by_code(code).await?;
        if booking.customer_id != customer_id {
            return Err(EngineError::NotFound(format!("booking {code}")));
        }
        Ok(booking)
    }

    /// Build the rejection error from the booking's current status, re-read
    /// so a raced transition reports what actually won.
    async fn rejected(&self, booking: &Booking) -> EngineError {
        let from = match self.store().find_booking(&booking.code).await {
            Ok(Some(current)) => current.status,
            _ => booking.status,
        };
        EngineError::TransitionRejected {
            code: booking.code.clone(),
            from,
        }
    }
}
