use chrono::{NaiveTime, Weekday};

use crate::model::BookingStatus;

/// Which status a fresh reservation is created in. `Confirmed` books the slot
/// outright (deposit collected out-of-band); `Pending` gates confirmation on
/// deposit capture. A deployment choice, not a runtime one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStatus {
    Confirmed,
    Pending,
}

impl CreationStatus {
    pub fn initial(&self) -> BookingStatus {
        match self {
            CreationStatus::Confirmed => BookingStatus::Confirmed,
            CreationStatus::Pending => BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoyaltyConfig {
    pub points_per_booking: i64,
    pub first_booking_bonus: i64,
    pub birthday_bonus_points: i64,
    pub birthday_discount_code: String,
    pub birthday_discount_percent: u32,
    /// Ascending completed-booking counts that trigger a reward exactly once.
    pub milestones: Vec<u32>,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            points_per_booking: 10,
            first_booking_bonus: 20,
            birthday_bonus_points: 50,
            birthday_discount_code: "BDAY20".into(),
            birthday_discount_percent: 20,
            milestones: vec![5, 10, 25, 50, 100],
        }
    }
}

/// All business rules, supplied at process start and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub name: String,
    pub address: String,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub closed_weekday: Weekday,
    pub slot_interval_min: u32,
    pub min_advance_hours: i64,
    pub booking_window_days: u32,
    pub deposit_percent: u32,
    pub creation_status: CreationStatus,
    pub completion_sweep_secs: u64,
    pub one_hour_sweep_secs: u64,
    pub day_before_sweep_secs: u64,
    pub birthday_sweep_secs: u64,
    pub loyalty: LoyaltyConfig,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            name: "Trimtab Barbers".into(),
            address: "12 Quay Street".into(),
            opening_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            closed_weekday: Weekday::Sun,
            slot_interval_min: 30,
            min_advance_hours: 2,
            booking_window_days: 14,
            deposit_percent: 25,
            creation_status: CreationStatus::Confirmed,
            completion_sweep_secs: 1800,
            one_hour_sweep_secs: 600,
            day_before_sweep_secs: 3600,
            birthday_sweep_secs: 3600,
            loyalty: LoyaltyConfig::default(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_time(key: &str, default: NaiveTime) -> NaiveTime {
    std::env::var(key)
        .ok()
        .and_then(|s| NaiveTime::parse_from_str(&s, "%H:%M").ok())
        .unwrap_or(default)
}

impl ShopConfig {
    /// Read configuration from `TRIMTAB_*` env vars, falling back to defaults
    /// per key. Times use "HH:MM"; the closed weekday accepts chrono's names
    /// ("sunday", "sun", ...); milestones are a comma-separated list.
    pub fn from_env() -> Self {
        let d = Self::default();
        let ld = d.loyalty;

        let milestones = std::env::var("TRIMTAB_MILESTONES")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|p| p.trim().parse().ok())
                    .collect::<Vec<u32>>()
            })
            .filter(|m| !m.is_empty())
            .unwrap_or(ld.milestones);

        let creation_status = match std::env::var("TRIMTAB_CREATE_AS").as_deref() {
            Ok("pending") => CreationStatus::Pending,
            _ => CreationStatus::Confirmed,
        };

        Self {
            name: std::env::var("TRIMTAB_SHOP_NAME").unwrap_or(d.name),
            address: std::env::var("TRIMTAB_SHOP_ADDRESS").unwrap_or(d.address),
            opening_time: env_time("TRIMTAB_OPENING", d.opening_time),
            closing_time: env_time("TRIMTAB_CLOSING", d.closing_time),
            closed_weekday: env_parsed("TRIMTAB_CLOSED_WEEKDAY", d.closed_weekday),
            slot_interval_min: env_parsed("TRIMTAB_SLOT_INTERVAL_MIN", d.slot_interval_min),
            min_advance_hours: env_parsed("TRIMTAB_MIN_ADVANCE_HOURS", d.min_advance_hours),
            booking_window_days: env_parsed("TRIMTAB_BOOKING_WINDOW_DAYS", d.booking_window_days),
            deposit_percent: env_parsed("TRIMTAB_DEPOSIT_PERCENT", d.deposit_percent),
            creation_status,
            completion_sweep_secs: env_parsed("TRIMTAB_COMPLETION_SWEEP_SECS", d.completion_sweep_secs),
            one_hour_sweep_secs: env_parsed("TRIMTAB_ONE_HOUR_SWEEP_SECS", d.one_hour_sweep_secs),
            day_before_sweep_secs: env_parsed("TRIMTAB_DAY_BEFORE_SWEEP_SECS", d.day_before_sweep_secs),
            birthday_sweep_secs: env_parsed("TRIMTAB_BIRTHDAY_SWEEP_SECS", d.birthday_sweep_secs),
            loyalty: LoyaltyConfig {
                points_per_booking: env_parsed("TRIMTAB_POINTS_PER_BOOKING", ld.points_per_booking),
                first_booking_bonus: env_parsed("TRIMTAB_FIRST_BOOKING_BONUS", ld.first_booking_bonus),
                birthday_bonus_points: env_parsed("TRIMTAB_BIRTHDAY_BONUS", ld.birthday_bonus_points),
                birthday_discount_code: std::env::var("TRIMTAB_BIRTHDAY_CODE")
                    .unwrap_or(ld.birthday_discount_code),
                birthday_discount_percent: env_parsed(
                    "TRIMTAB_BIRTHDAY_DISCOUNT_PERCENT",
                    ld.birthday_discount_percent,
                ),
                milestones,
            },
        }
    }

    /// Sanity checks that would otherwise surface as confusing availability
    /// output. Called once at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.opening_time >= self.closing_time {
            return Err("opening_time must be before closing_time".into());
        }
        if self.slot_interval_min == 0 {
            return Err("slot_interval_min must be positive".into());
        }
        if self.deposit_percent > 100 {
            return Err("deposit_percent must be <= 100".into());
        }
        if !self.loyalty.milestones.is_sorted() {
            return Err("milestones must be ascending".into());
        }
        Ok(())
    }
}
