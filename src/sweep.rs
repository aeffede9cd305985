//! Time-driven sweeps: completion, reminders, birthday rewards. Each sweep
//! is a pass function the loops (and tests) call directly; passes are
//! idempotent, so overlapping or rerun sweeps never double-act.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDateTime};
use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::engine::Engine;
use crate::messages;
use crate::model::ReminderKind;
use crate::observability;

/// Wall-clock time in the shop's timezone (the process-local one).
pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Complete every confirmed booking whose end has passed, settling loyalty
/// per booking. One failing booking is logged and skipped, never aborting
/// the rest of the pass. Returns the number completed.
pub async fn completion_pass(engine: &Engine, now: NaiveDateTime) -> usize {
    let due = match engine.store().bookings_due_for_completion(now).await {
        Ok(due) => due,
        Err(e) => {
            error!("completion sweep: listing due bookings failed: {e}");
            return 0;
        }
    };
    let mut completed = 0;
    for booking in due {
        match engine.complete_due(&booking, now).await {
            Ok(Some(_)) => {
                info!("completed booking {}", booking.code);
                completed += 1;
            }
            Ok(None) => {} // raced with a cancel or an earlier sweep
            Err(e) => error!("completing booking {} failed: {e}", booking.code),
        }
    }
    completed
}

/// Send due reminders of one kind and mark them sent. Notify-then-mark: a
/// crash between the two resends the reminder on the next pass rather than
/// losing it. Returns the number sent.
pub async fn reminder_pass(engine: &Engine, kind: ReminderKind, now: NaiveDateTime) -> usize {
    let due = match engine.store().bookings_due_for_reminder(kind, now).await {
        Ok(due) => due,
        Err(e) => {
            error!("{} sweep: listing due bookings failed: {e}", kind.as_str());
            return 0;
        }
    };
    let mut sent = 0;
    for booking in due {
        let service_name = match engine.store().service_by_id(booking.service_id).await {
            Ok(Some(service)) => service.name,
            _ => "upcoming".to_string(),
        };
        let text = match kind {
            ReminderKind::DayBefore => {
                messages::day_before_reminder(engine.config(), &service_name, &booking)
            }
            ReminderKind::OneHour => {
                messages::one_hour_reminder(engine.config(), &service_name, &booking)
            }
        };
        engine.notify().send(booking.customer_id, text);
        match engine.store().mark_reminder_sent(booking.id, kind).await {
            Ok(true) => {
                metrics::counter!(observability::REMINDERS_SENT, "kind" => kind.as_str())
                    .increment(1);
                sent += 1;
            }
            Ok(false) => {}
            Err(e) => error!("marking reminder for {} failed: {e}", booking.code),
        }
    }
    sent
}

/// Greet and reward customers whose birthday is today, at most once per
/// calendar year. Returns the number rewarded.
pub async fn birthday_pass(engine: &Engine, now: NaiveDateTime) -> usize {
    let today = now.date();
    let celebrants = match engine
        .store()
        .customers_with_birthday(today.day(), today.month())
        .await
    {
        Ok(celebrants) => celebrants,
        Err(e) => {
            error!("birthday sweep: listing celebrants failed: {e}");
            return 0;
        }
    };
    let mut rewarded = 0;
    for customer in celebrants {
        if customer
            .last_birthday_reward_year
            .is_some_and(|y| y >= today.year())
        {
            continue;
        }
        engine.notify().send(
            customer.id,
            messages::birthday_greeting(&customer, engine.config()),
        );
        match engine.award_birthday_reward(&customer, today).await {
            Ok(Some(_)) => {
                info!("birthday reward for customer {}", customer.id);
                rewarded += 1;
            }
            Ok(None) => {}
            Err(e) => error!("birthday reward for customer {} failed: {e}", customer.id),
        }
    }
    rewarded
}

// ── Loops ────────────────────────────────────────────────

pub async fn run_completion(engine: Arc<Engine>) {
    let mut ticker = interval(Duration::from_secs(engine.config().completion_sweep_secs));
    loop {
        ticker.tick().await;
        timed("completion", || completion_pass(&engine, now_local())).await;
    }
}

pub async fn run_reminders(engine: Arc<Engine>, kind: ReminderKind) {
    let secs = match kind {
        ReminderKind::DayBefore => engine.config().day_before_sweep_secs,
        ReminderKind::OneHour => engine.config().one_hour_sweep_secs,
    };
    let mut ticker = interval(Duration::from_secs(secs));
    loop {
        ticker.tick().await;
        timed(kind.as_str(), || reminder_pass(&engine, kind, now_local())).await;
    }
}

pub async fn run_birthdays(engine: Arc<Engine>) {
    let mut ticker = interval(Duration::from_secs(engine.config().birthday_sweep_secs));
    loop {
        ticker.tick().await;
        timed("birthday", || birthday_pass(&engine, now_local())).await;
    }
}

async fn timed<F, Fut>(name: &'static str, pass: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = usize>,
{
    let started = Instant::now();
    let acted = pass().await;
    metrics::histogram!(observability::SWEEP_SECONDS, "sweep" => name)
        .record(started.elapsed().as_secs_f64());
    if acted > 0 {
        info!("{name} sweep acted on {acted} item(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};
    use ulid::Ulid;

    use crate::config::ShopConfig;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::store::BookingStore;
    use crate::store::memory::MemStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn engine() -> Engine {
        let store = Arc::new(MemStore::ephemeral());
        store
            .upsert_service(Service {
                id: Ulid::new(),
                slug: "haircut".into(),
                name: "Haircut".into(),
                price: 2000,
                duration_min: 30,
                active: true,
                display_order: 1,
            })
            .await
            .unwrap();
        Engine::new(store, ShopConfig::default(), Arc::new(NotifyHub::new()))
    }

    // 2026-09-09 is a Wednesday; the default config closes on Sundays.
    const BOOKING_DAY: (i32, u32, u32) = (2026, 9, 9);

    async fn reserve(engine: &Engine, customer: CustomerId, start: NaiveTime) -> Booking {
        let (y, m, day) = BOOKING_DAY;
        let now = d(2026, 9, 8).and_time(t(12, 0));
        engine
            .reserve(customer, None, "haircut", d(y, m, day), start, now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn completion_pass_is_idempotent() {
        let engine = engine().await;
        let booking = reserve(&engine, 1, t(10, 0)).await;
        let after = d(2026, 9, 9).and_time(t(18, 0));

        assert_eq!(completion_pass(&engine, after).await, 1);
        assert_eq!(completion_pass(&engine, after).await, 0);

        let b = engine
            .store()
            .find_booking(&booking.code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.status, BookingStatus::Completed);

        // Base points plus the first-completion bonus, exactly once
        let c = engine.customer(1).await.unwrap();
        assert_eq!(c.points, 30);
        assert_eq!(c.completed_bookings, 1);
    }

    #[tokio::test]
    async fn completion_pass_skips_bookings_still_running() {
        let engine = engine().await;
        reserve(&engine, 1, t(10, 0)).await;
        // 10:15 is mid-appointment
        let mid = d(2026, 9, 9).and_time(t(10, 15));
        assert_eq!(completion_pass(&engine, mid).await, 0);
    }

    #[tokio::test]
    async fn completion_pass_catches_backlog_from_prior_days() {
        let engine = engine().await;
        reserve(&engine, 1, t(10, 0)).await;
        // Two days later, long past the end time
        let later = d(2026, 9, 11).and_time(t(9, 0));
        assert_eq!(completion_pass(&engine, later).await, 1);
    }

    #[tokio::test]
    async fn day_before_reminder_sent_once() {
        let engine = engine().await;
        let booking = reserve(&engine, 1, t(10, 0)).await;
        let mut rx = engine.notify().subscribe(1);

        let eve = d(2026, 9, 8).and_time(t(18, 0));
        assert_eq!(reminder_pass(&engine, ReminderKind::DayBefore, eve).await, 1);
        let note = rx.recv().await.unwrap();
        assert!(note.text.contains("tomorrow"));
        assert!(note.text.contains(&booking.code));

        assert_eq!(reminder_pass(&engine, ReminderKind::DayBefore, eve).await, 0);
    }

    #[tokio::test]
    async fn one_hour_reminder_only_in_window() {
        let engine = engine().await;
        reserve(&engine, 1, t(14, 0)).await;

        // Too early: 14:00 is more than an hour from 12:30
        let early = d(2026, 9, 9).and_time(t(12, 30));
        assert_eq!(reminder_pass(&engine, ReminderKind::OneHour, early).await, 0);

        let in_window = d(2026, 9, 9).and_time(t(13, 10));
        assert_eq!(reminder_pass(&engine, ReminderKind::OneHour, in_window).await, 1);
        assert_eq!(reminder_pass(&engine, ReminderKind::OneHour, in_window).await, 0);
    }

    #[tokio::test]
    async fn reminder_flags_are_independent() {
        let engine = engine().await;
        reserve(&engine, 1, t(10, 0)).await;

        let eve = d(2026, 9, 8).and_time(t(18, 0));
        assert_eq!(reminder_pass(&engine, ReminderKind::DayBefore, eve).await, 1);

        let morning = d(2026, 9, 9).and_time(t(9, 10));
        assert_eq!(reminder_pass(&engine, ReminderKind::OneHour, morning).await, 1);
    }

    #[tokio::test]
    async fn cancelled_booking_gets_no_reminder() {
        let engine = engine().await;
        let booking = reserve(&engine, 1, t(10, 0)).await;
        let now = d(2026, 9, 8).and_time(t(13, 0));
        engine.cancel(1, &booking.code, now).await.unwrap();

        let eve = d(2026, 9, 8).and_time(t(18, 0));
        assert_eq!(reminder_pass(&engine, ReminderKind::DayBefore, eve).await, 0);
    }

    #[tokio::test]
    async fn birthday_reward_once_per_year() {
        let engine = engine().await;
        let now = d(2026, 9, 1).and_time(t(8, 0));
        engine
            .store()
            .get_or_create_customer(1, Some("ada".into()), now)
            .await
            .unwrap();
        engine.set_birthday(1, 4, 9).await.unwrap();
        let mut rx = engine.notify().subscribe(1);

        let birthday = d(2026, 9, 4).and_time(t(8, 0));
        assert_eq!(birthday_pass(&engine, birthday).await, 1);
        assert!(rx.recv().await.unwrap().text.contains("Happy birthday"));

        let c = engine.customer(1).await.unwrap();
        assert_eq!(c.points, 50);
        assert_eq!(c.last_birthday_reward_year, Some(2026));

        // Rerun the same day, and again later the same year: nothing
        assert_eq!(birthday_pass(&engine, birthday).await, 0);

        // Next year it fires again
        let next_year = d(2027, 9, 4).and_time(t(8, 0));
        assert_eq!(birthday_pass(&engine, next_year).await, 1);
        let c = engine.customer(1).await.unwrap();
        assert_eq!(c.points, 100);
        assert_eq!(c.last_birthday_reward_year, Some(2027));
    }

    #[tokio::test]
    async fn birthday_pass_ignores_other_dates() {
        let engine = engine().await;
        let now = d(2026, 9, 1).and_time(t(8, 0));
        engine
            .store()
            .get_or_create_customer(1, None, now)
            .await
            .unwrap();
        engine.set_birthday(1, 4, 9).await.unwrap();

        let not_birthday = d(2026, 9, 5).and_time(t(8, 0));
        assert_eq!(birthday_pass(&engine, not_birthday).await, 0);
    }
}
