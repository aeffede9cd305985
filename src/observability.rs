use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const RESERVATIONS: &str = "trimtab_reservations_total";
pub const SLOT_CONFLICTS: &str = "trimtab_slot_conflicts_total";
pub const CODE_RETRIES: &str = "trimtab_code_retries_total";
pub const CANCELLATIONS: &str = "trimtab_cancellations_total";
pub const COMPLETIONS: &str = "trimtab_completions_total";
pub const NO_SHOWS: &str = "trimtab_no_shows_total";
pub const DEPOSITS_CAPTURED: &str = "trimtab_deposits_captured_total";
pub const POINTS_AWARDED: &str = "trimtab_points_awarded_total";
pub const POINTS_REDEEMED: &str = "trimtab_points_redeemed_total";
pub const MILESTONES_HIT: &str = "trimtab_milestones_hit_total";
pub const BIRTHDAY_REWARDS: &str = "trimtab_birthday_rewards_total";
pub const REMINDERS_SENT: &str = "trimtab_reminders_sent_total";
pub const NOTIFICATIONS_SENT: &str = "trimtab_notifications_sent_total";
pub const SWEEP_SECONDS: &str = "trimtab_sweep_duration_seconds";

/// Install the Prometheus exporter on the given port. Call once at startup;
/// metric macros elsewhere degrade to no-ops if this never runs (tests).
pub fn init(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}
