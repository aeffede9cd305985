//! Booking and availability engine for a single-location barbershop:
//! derived availability, race-safe slot reservation, a booking lifecycle
//! state machine, time-driven sweeps and a loyalty ledger.

pub mod config;
pub mod engine;
pub mod journal;
pub mod messages;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod sweep;
