mod cli;
mod server;

use std::{env, error::Error, fs, sync::Arc};

use tokio::{net::TcpListener, signal, task, time};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eios_schedule::cache::{self, Cache};
use eios_schedule::portal::{HttpPortal, PlanDirectory, PortalConfig};
use eios_schedule::recurrence::ValidationOptions;
use eios_schedule::store::MemoryRuleStore;
use eios_schedule::ScheduleService;

use crate::server::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "eios_schedule=info,eios_parser=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::parse(env::args().skip(1).collect());

    let options = ValidationOptions {
        reject_overlaps: args.reject_overlaps,
        ..Default::default()
    };

    let rules = match &args.rules {
        Some(path) => MemoryRuleStore::from_json(&fs::read_to_string(path)?, &options)?,
        None => MemoryRuleStore::default(),
    };

    let portal = PortalConfig {
        origin: args.portal,
        timeout: args.timeout,
        ..Default::default()
    };

    let config = cache::Config {
        enabled: args.enable_cache,
        ttl: args.cache_ttl,
        coalesce: args.coalesce,
    };
    let cache = Cache::new(config);
    let plans = PlanDirectory::new(portal.clone(), Cache::new(config));

    if args.enable_cache && !args.cache_ttl.is_zero() {
        let cache = Arc::clone(&cache);
        let period = args.cache_ttl;
        task::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    info!(purged, "purged expired schedules");
                }
            }
        });
    }

    let service = ScheduleService::new(
        Arc::new(HttpPortal::new(portal)),
        Arc::new(rules),
        cache,
    );

    let router = router(Arc::new(AppState { service, plans }));

    let listener = TcpListener::bind(args.address).await?;
    info!("listening at http://{}", args.address);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
