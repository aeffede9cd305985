//! Plain-text message builders for notifications and chat replies. No
//! transport formatting here — whatever delivers these decides about
//! markup and localization.

use chrono::NaiveDate;

use crate::config::ShopConfig;
use crate::model::{Booking, Cents, Customer};

/// Cents to a euro string: 750 → "€7.50".
pub fn fmt_eur(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{sign}€{}.{:02}", cents / 100, cents % 100)
}

/// "Friday, 4 September" — weekday first so a glance catches a wrong day.
pub fn fmt_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B").to_string()
}

pub fn day_before_reminder(cfg: &ShopConfig, service_name: &str, booking: &Booking) -> String {
    format!(
        "Reminder: your {service_name} appointment at {} is tomorrow, {} at {}. \
         Find us at {}. Balance due: {}. Reply with your code {} to cancel.",
        cfg.name,
        fmt_date(booking.date),
        booking.start_time.format("%H:%M"),
        cfg.address,
        fmt_eur(booking.balance),
        booking.code,
    )
}

pub fn one_hour_reminder(cfg: &ShopConfig, service_name: &str, booking: &Booking) -> String {
    format!(
        "See you soon! Your {service_name} appointment at {} starts at {} — \
         that's in less than an hour. {}.",
        cfg.name,
        booking.start_time.format("%H:%M"),
        cfg.address,
    )
}

pub fn birthday_greeting(customer: &Customer, cfg: &ShopConfig) -> String {
    let name = customer.handle.as_deref().unwrap_or("friend");
    format!(
        "Happy birthday, {name}! 🎉 {} has a gift for you: {} points on your \
         balance and {}% off your next visit with code {}.",
        cfg.name,
        cfg.loyalty.birthday_bonus_points,
        cfg.loyalty.birthday_discount_percent,
        cfg.loyalty.birthday_discount_code,
    )
}

pub fn milestone_reached(completed: u32) -> String {
    let reward = match completed {
        5 => "a free beard trim on your next visit",
        10 => "20% off your next appointment",
        25 => "a free haircut",
        50 => "a free premium grooming session",
        _ => "a loyalty reward — ask at the counter",
    };
    format!("That's {completed} visits with us! You've earned {reward}.")
}

pub fn points_awarded(points: i64, total: i64, is_first: bool) -> String {
    if is_first {
        format!(
            "Welcome to the club! You earned {points} points (including your \
             first-visit bonus). Balance: {total} points."
        )
    } else {
        format!("You earned {points} points. Balance: {total} points.")
    }
}

pub fn loyalty_status(customer: &Customer, next_milestone: Option<u32>) -> String {
    let mut text = format!(
        "You have {} points ({} lifetime) and {} completed visits.",
        customer.points, customer.lifetime_points, customer.completed_bookings
    );
    if let Some(next) = next_milestone {
        let to_go = next - customer.completed_bookings;
        text.push_str(&format!(" {to_go} more to your next reward at {next} visits."));
    }
    text
}
