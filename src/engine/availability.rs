use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::ShopConfig;
use crate::engine::{Engine, EngineError};

const SECS_PER_DAY: i64 = 86_400;

/// Round `time` up to the next slot boundary on the grid anchored at
/// `opening` with `interval_min` spacing. Times at or before opening map to
/// opening itself; a boundary hit stays put. `None` when rounding would run
/// past midnight.
pub fn round_up_to_slot(time: NaiveTime, opening: NaiveTime, interval_min: u32) -> Option<NaiveTime> {
    use chrono::Timelike;

    if time <= opening {
        return Some(opening);
    }
    let interval_secs = interval_min as i64 * 60;
    let since_opening = (time - opening).num_seconds();
    let slots = (since_opening + interval_secs - 1) / interval_secs;
    let total = opening.num_seconds_from_midnight() as i64 + slots * interval_secs;
    if total >= SECS_PER_DAY {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(total as u32, 0)
}

/// Earliest bookable slot start on `date`, honoring the minimum-advance
/// window. The window is applied date-aware: when `now + min_advance` lands
/// on a later day than `date`, the day has no slots at all rather than
/// wrapping back to its morning.
pub fn first_slot(date: NaiveDate, now: NaiveDateTime, cfg: &ShopConfig) -> Option<NaiveTime> {
    if date < now.date() {
        return None;
    }
    let earliest = now.checked_add_signed(Duration::hours(cfg.min_advance_hours))?;
    if earliest.date() > date {
        return None;
    }
    let start = if earliest.date() == date {
        round_up_to_slot(earliest.time(), cfg.opening_time, cfg.slot_interval_min)?
    } else {
        cfg.opening_time
    };
    (start < cfg.closing_time).then_some(start)
}

/// All slot starts on `date` still inside the booking rules, ignoring
/// occupancy. Empty for past dates, the closed weekday, and days the
/// minimum-advance window has exhausted.
pub fn slot_starts(date: NaiveDate, now: NaiveDateTime, cfg: &ShopConfig) -> Vec<NaiveTime> {
    use chrono::{Datelike, Timelike};

    if date.weekday() == cfg.closed_weekday {
        return Vec::new();
    }
    let Some(first) = first_slot(date, now, cfg) else {
        return Vec::new();
    };
    let interval_secs = cfg.slot_interval_min as i64 * 60;
    let mut out = Vec::new();
    let mut total = first.num_seconds_from_midnight() as i64;
    let closing = cfg.closing_time.num_seconds_from_midnight() as i64;
    while total < closing {
        match NaiveTime::from_num_seconds_from_midnight_opt(total as u32, 0) {
            Some(t) => out.push(t),
            None => break,
        }
        total += interval_secs;
    }
    out
}

impl Engine {
    /// Dates in the booking window with at least one free slot, ascending.
    pub async fn available_dates(&self, now: NaiveDateTime) -> Result<Vec<NaiveDate>, EngineError> {
        let mut out = Vec::new();
        for offset in 0..self.config.booking_window_days {
            let Some(date) = now
                .date()
                .checked_add_signed(Duration::days(offset as i64))
            else {
                break;
            };
            if !self.available_slots(date, now).await?.is_empty() {
                out.push(date);
            }
        }
        Ok(out)
    }

    /// Free slot starts on `date`, ascending. A slot held by any active
    /// booking — pending included — is not offered.
    pub async fn available_slots(
        &self,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<NaiveTime>, EngineError> {
        let mut out = Vec::new();
        for start in slot_starts(date, now, &self.config) {
            if !self.store.slot_taken(date, start).await? {
                out.push(start);
            }
        }
        Ok(out)
    }
}
