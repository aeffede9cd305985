use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};
use ulid::Ulid;

use trimtab::config::ShopConfig;
use trimtab::engine::Engine;
use trimtab::model::{Cents, ReminderKind, Service};
use trimtab::notify::NotifyHub;
use trimtab::observability;
use trimtab::store::memory::MemStore;
use trimtab::sweep;

/// Catalog entry as seeded from `TRIMTAB_SERVICES` (a JSON file path) or the
/// built-in defaults. Slugs are the stable key: reseeding updates prices and
/// names in place without touching existing bookings.
#[derive(Debug, Deserialize)]
struct ServiceSeed {
    slug: String,
    name: String,
    price: Cents,
    duration_min: u32,
    #[serde(default)]
    display_order: u32,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

fn default_catalog() -> Vec<ServiceSeed> {
    vec![
        ServiceSeed {
            slug: "haircut".into(),
            name: "Haircut".into(),
            price: 2000,
            duration_min: 30,
            display_order: 1,
            active: true,
        },
        ServiceSeed {
            slug: "beard-trim".into(),
            name: "Beard Trim".into(),
            price: 1200,
            duration_min: 20,
            display_order: 2,
            active: true,
        },
        ServiceSeed {
            slug: "cut-and-beard".into(),
            name: "Haircut + Beard".into(),
            price: 2800,
            duration_min: 50,
            display_order: 3,
            active: true,
        },
        ServiceSeed {
            slug: "shave".into(),
            name: "Hot Towel Shave".into(),
            price: 1500,
            duration_min: 45,
            display_order: 4,
            active: true,
        },
    ]
}

fn load_catalog() -> Result<Vec<ServiceSeed>, Box<dyn std::error::Error>> {
    match std::env::var("TRIMTAB_SERVICES") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        Err(_) => Ok(default_catalog()),
    }
}

async fn seed_services(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    for seed in load_catalog()? {
        let service = engine
            .store()
            .upsert_service(Service {
                id: Ulid::new(),
                slug: seed.slug,
                name: seed.name,
                price: seed.price,
                duration_min: seed.duration_min,
                active: seed.active,
                display_order: seed.display_order,
            })
            .await?;
        info!("service ready: {} ({})", service.slug, service.name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: u16 = std::env::var("TRIMTAB_METRICS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9187);
    observability::init(metrics_port)?;

    let config = ShopConfig::from_env();
    config.validate().map_err(std::io::Error::other)?;

    let data_dir: PathBuf = std::env::var("TRIMTAB_DATA_DIR")
        .unwrap_or_else(|_| "./data".into())
        .into();
    std::fs::create_dir_all(&data_dir)?;
    let journal_path = data_dir.join("trimtab.journal");

    let store = Arc::new(MemStore::open(&journal_path)?);
    let engine = Arc::new(Engine::new(
        store,
        config.clone(),
        Arc::new(NotifyHub::new()),
    ));
    seed_services(&engine).await?;

    info!(
        "{} open {}-{} every day but {:?}, journal at {}",
        config.name,
        config.opening_time,
        config.closing_time,
        config.closed_weekday,
        journal_path.display()
    );

    tokio::spawn(sweep::run_completion(engine.clone()));
    tokio::spawn(sweep::run_reminders(engine.clone(), ReminderKind::DayBefore));
    tokio::spawn(sweep::run_reminders(engine.clone(), ReminderKind::OneHour));
    tokio::spawn(sweep::run_birthdays(engine.clone()));

    shutdown_signal().await;
    info!("trimtab stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
