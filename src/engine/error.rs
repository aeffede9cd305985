use chrono::{NaiveDate, NaiveTime};

use crate::model::{BookingStatus, CustomerId};
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// No active service under that slug.
    UnknownService(String),
    /// Booking code or customer id that doesn't resolve (for the caller).
    NotFound(String),
    PastDate(NaiveDate),
    PastTime(NaiveTime),
    /// Another active booking already holds the slot.
    SlotConflict { date: NaiveDate, time: NaiveTime },
    /// The booking was not in a status the operation accepts.
    TransitionRejected { code: String, from: BookingStatus },
    /// Completion/no-show attempted before the booking has ended.
    NotYetEnded(String),
    InsufficientPoints { have: i64, need: i64 },
    BirthdayAlreadySet(CustomerId),
    InvalidBirthday { day: u32, month: u32 },
    Storage(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownService(slug) => write!(f, "unknown service: {slug}"),
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::PastDate(date) => write!(f, "date is in the past: {date}"),
            EngineError::PastTime(time) => write!(f, "time is in the past: {time}"),
            EngineError::SlotConflict { date, time } => {
                write!(f, "slot {date} {time} is already booked")
            }
            EngineError::TransitionRejected { code, from } => {
                write!(f, "booking {code} is {from}, operation not allowed")
            }
            EngineError::NotYetEnded(code) => {
                write!(f, "booking {code} has not ended yet")
            }
            EngineError::InsufficientPoints { have, need } => {
                write!(f, "insufficient points: have {have}, need {need}")
            }
            EngineError::BirthdayAlreadySet(id) => {
                write!(f, "customer {id} already has a birthday on file")
            }
            EngineError::InvalidBirthday { day, month } => {
                write!(f, "invalid birthday: day {day}, month {month}")
            }
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e)
    }
}
