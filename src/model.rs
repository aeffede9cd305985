use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Euro cents — the only money type.
pub type Cents = i64;

/// Stable chat identity of a customer.
pub type CustomerId = i64;

/// Split a price into (deposit, remaining balance) for a given deposit
/// percentage, rounding the deposit half-up to the cent.
pub fn deposit_split(price: Cents, percent: u32) -> (Cents, Cents) {
    let deposit = (price * percent as i64 + 50) / 100;
    (deposit, price - deposit)
}

/// Short human-readable booking code: "BK-" plus the random tail of a fresh
/// ulid (Crockford base32, no ambiguous characters). Uniqueness is enforced
/// by the store on insert, not here.
pub fn new_booking_code() -> String {
    let u = Ulid::new().to_string();
    format!("BK-{}", &u[u.len() - 6..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Active bookings hold their slot; terminal ones release it.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderKind {
    DayBefore,
    OneHour,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "day_before",
            ReminderKind::OneHour => "one_hour",
        }
    }
}

/// A bookable offering. `slug` is the stable external key; money and duration
/// are snapshotted onto each booking at creation, so editing a service never
/// rewrites existing bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub slug: String,
    pub name: String,
    pub price: Cents,
    pub duration_min: u32,
    pub active: bool,
    pub display_order: u32,
}

/// Day + month, no year. Set together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birthday {
    pub day: u32,
    pub month: u32,
}

impl Birthday {
    /// Valid when the day/month combination exists in some year
    /// (checked against a leap year so Feb 29 is accepted).
    pub fn is_valid(&self) -> bool {
        NaiveDate::from_ymd_opt(2000, self.month, self.day).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub handle: Option<String>,
    pub birthday: Option<Birthday>,
    pub birthday_prompted: bool,
    pub points: i64,
    pub lifetime_points: i64,
    pub total_bookings: u32,
    pub completed_bookings: u32,
    pub cancelled_bookings: u32,
    pub no_show_bookings: u32,
    /// Only ever advances; gates one birthday reward per calendar year.
    pub last_birthday_reward_year: Option<i32>,
    pub preferred_service_id: Option<Ulid>,
    pub created_at: NaiveDateTime,
}

impl Customer {
    pub fn new(id: CustomerId, handle: Option<String>, created_at: NaiveDateTime) -> Self {
        Self {
            id,
            handle,
            birthday: None,
            birthday_prompted: false,
            points: 0,
            lifetime_points: 0,
            total_bookings: 0,
            completed_bookings: 0,
            cancelled_bookings: 0,
            no_show_bookings: 0,
            last_birthday_reward_year: None,
            preferred_service_id: None,
            created_at,
        }
    }

    /// The birthday prompt is shown at most once, and never after a
    /// birthday has been recorded.
    pub fn needs_birthday_prompt(&self) -> bool {
        self.birthday.is_none() && !self.birthday_prompted
    }
}

/// The central entity. Never physically deleted — cancellation and no-show
/// are terminal states, not deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub code: String,
    pub customer_id: CustomerId,
    pub service_id: Ulid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub deposit: Cents,
    pub deposit_paid: bool,
    pub balance: Cents,
    pub day_before_reminder_sent: bool,
    pub one_hour_reminder_sent: bool,
    pub created_at: NaiveDateTime,
    pub cancelled_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl Booking {
    pub fn start_dt(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end_dt(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    pub fn reminder_sent(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::DayBefore => self.day_before_reminder_sent,
            ReminderKind::OneHour => self.one_hour_reminder_sent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Deposit,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// One record per deposit/refund attempt. The engine only reads the status
/// to gate `deposit_paid`; gateway protocol details live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub customer_id: CustomerId,
    pub amount: Cents,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub created_at: NaiveDateTime,
}

/// A single read-modify-write step on a customer row. Patches are applied
/// under the store's per-customer lock, so concurrent sweeps and user
/// operations never lose counter updates. Every patch commutes with every
/// other, which lets the journal record customer mutations as deltas and
/// replay them in whatever order they were appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerPatch {
    IncrementTotal,
    IncrementCancelled,
    IncrementCompleted,
    IncrementNoShow,
    /// Adds to both spendable and lifetime points.
    AddPoints { points: i64 },
    /// Deducts spendable points only; the balance check lives in the store's
    /// `spend_points`, not here.
    SpendPoints { points: i64 },
    /// Adds bonus points and advances the reward-year stamp (never backwards).
    BirthdayReward { points: i64, year: i32 },
    /// Write-once: a no-op when a birthday is already recorded.
    SetBirthday(Birthday),
    MarkBirthdayPrompted,
    SetPreferredService(Ulid),
}

impl CustomerPatch {
    pub fn apply(&self, c: &mut Customer) {
        match self {
            CustomerPatch::IncrementTotal => c.total_bookings += 1,
            CustomerPatch::IncrementCancelled => c.cancelled_bookings += 1,
            CustomerPatch::IncrementCompleted => c.completed_bookings += 1,
            CustomerPatch::IncrementNoShow => c.no_show_bookings += 1,
            CustomerPatch::AddPoints { points } => {
                c.points += points;
                c.lifetime_points += points;
            }
            CustomerPatch::SpendPoints { points } => c.points -= points,
            CustomerPatch::BirthdayReward { points, year } => {
                c.points += points;
                c.lifetime_points += points;
                c.last_birthday_reward_year =
                    Some(c.last_birthday_reward_year.map_or(*year, |y| y.max(*year)));
            }
            CustomerPatch::SetBirthday(bd) => {
                if c.birthday.is_none() {
                    c.birthday = Some(*bd);
                }
            }
            CustomerPatch::MarkBirthdayPrompted => c.birthday_prompted = true,
            CustomerPatch::SetPreferredService(id) => c.preferred_service_id = Some(*id),
        }
    }
}

/// The journal record format. Customer mutations are journalled as deltas
/// (`CustomerPatched`), never as snapshots: map commits and journal appends
/// are not ordered relative to each other once the map guard drops, and a
/// snapshot replayed last-write-wins would resurrect stale state. Deltas
/// commute, so append order cannot lose an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CustomerCreated(Customer),
    CustomerPatched {
        id: CustomerId,
        patch: CustomerPatch,
    },
    ServiceUpserted(Service),
    BookingCreated(Booking),
    BookingTransitioned {
        id: Ulid,
        status: BookingStatus,
        at: NaiveDateTime,
    },
    ReminderMarked {
        id: Ulid,
        kind: ReminderKind,
    },
    DepositPaid {
        id: Ulid,
    },
    PaymentRecorded(Payment),
}
