use award_tally::config::{Config, SourceConfig};
use award_tally::db::Database;
use award_tally::models::Granularity;
use award_tally::service::{DashboardService, RefreshEvent};
use award_tally::source::{JsonFileSource, VoteSource};
use award_tally::tasks::refresh::RefreshScheduler;
use log::{debug, error, info, warn};
use std::sync::{Arc, Weak};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    let source: Arc<dyn VoteSource> = match &config.source {
        SourceConfig::Database(url) => match Database::connect(url).await {
            Ok(db) => Arc::new(db),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                return;
            }
        },
        SourceConfig::SnapshotFile(path) => {
            info!("Reading snapshots from {}", path.display());
            Arc::new(JsonFileSource::new(path.clone()))
        }
    };

    let service = Arc::new(DashboardService::new(config.tally.clone()));

    // Log a short digest of every cycle
    let digest_service: Weak<DashboardService> = Arc::downgrade(&service);
    service.subscribe(move |event| match event {
        RefreshEvent::Published { generation, .. } => {
            let Some(service) = digest_service.upgrade() else {
                return;
            };
            for standing in service.category_standings(None) {
                match standing.leader() {
                    Some(leader) => info!(
                        "[gen {}] {}: {} leads with {} of {} votes ({}%, {})",
                        generation,
                        standing.category_name,
                        leader.nominee_name.as_deref().unwrap_or(&leader.nominee_id),
                        leader.vote_count,
                        standing.total_votes,
                        leader.percentage_of_category,
                        leader.trend
                    ),
                    None => info!("[gen {}] {}: no votes yet", generation, standing.category_name),
                }
            }
            if let Some(overview) = service.overview() {
                match serde_json::to_string(&overview) {
                    Ok(json) => info!("[gen {}] overview {}", generation, json),
                    Err(e) => warn!("Could not serialize overview: {}", e),
                }
            }
            let locations = service.default_location_breakdown();
            debug!("[gen {}] locations {:?}", generation, locations);
            let hourly = service.trend_series(Granularity::HourOfDay, None);
            debug!("[gen {}] votes by hour {:?}", generation, hourly.counts);
        }
        RefreshEvent::Failed { error, .. } => {
            warn!("Showing last known good data; latest refresh failed: {}", error);
        }
    });

    let scheduler = RefreshScheduler::new(source, Arc::clone(&service), config.fetch_timeout);
    scheduler.start(config.refresh_interval);

    if let Err(why) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {:?}", why);
    }
    info!("Shutting down");
    scheduler.stop();
}
