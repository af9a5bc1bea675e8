use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use fundscope::{
    portfolio::{totals_by_symbol, CampaignSummary},
    FundingSource, Settings, ValuationEngine,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .context("Failed to initialize logger")?;

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let engine = Arc::new(
        ValuationEngine::from_settings(&settings).context("Failed to build valuation engine")?,
    );

    engine.start();

    let cancellation_token = CancellationToken::new();

    let monitor_token = cancellation_token.child_token();
    let monitor_engine = engine.clone();
    let monitor_settings = settings.clone();
    let monitor_handle = tokio::spawn(async move {
        run_monitor(monitor_engine, monitor_settings, monitor_token).await;
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Monitor running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    cancellation_token.cancel();

    info!("Waiting for monitor to stop...");
    let _ = monitor_handle.await;

    info!("Stopping price cache...");
    engine.stop().await;

    info!("Shutdown complete");
    Ok(())
}

async fn run_monitor(
    engine: Arc<ValuationEngine>,
    settings: Arc<Settings>,
    cancellation_token: CancellationToken,
) {
    let mut ticker =
        tokio::time::interval(Duration::from_secs(settings.monitor.poll_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {
                report_campaigns(&engine, &settings.monitor.campaign_ids).await;
            },
        }
    }
}

async fn report_campaigns(engine: &ValuationEngine, campaign_ids: &[u64]) {
    let campaigns: Vec<CampaignSummary> = match engine.list_campaigns().await {
        Ok(campaigns) => campaigns
            .into_iter()
            .filter(|c| campaign_ids.is_empty() || campaign_ids.contains(&c.id))
            .collect(),
        Err(e) => {
            error!("Failed to list campaigns: {}", e);
            return;
        },
    };

    if campaigns.is_empty() {
        warn!("No campaigns to value");
        return;
    }

    let prices = engine.current_prices();
    info!(
        "Valuing {} campaigns against {} prices ({:?})",
        campaigns.len(),
        prices.len(),
        prices.source()
    );

    for campaign in &campaigns {
        let progress = engine.campaign_progress(campaign).await;

        let source = match progress.source {
            FundingSource::Portfolio(status) => format!("portfolio/{status:?}"),
            FundingSource::Heuristic(guess) => {
                format!("heuristic/{}dp/{:?}", guess.decimals, guess.confidence)
            },
        };

        info!(
            "Campaign {} \"{}\": ${:.2} of ${:.2} ({:.1}%{}) via {}",
            campaign.id,
            campaign.title,
            progress.raised_usd,
            progress.goal_usd,
            progress.progress_pct,
            if progress.is_overfunded() { ", overfunded" } else { "" },
            source
        );

        for balance in &progress.portfolio.token_balances {
            info!(
                "  {} {} = ${:.2}",
                balance.balance_formatted, balance.symbol, balance.usd_value
            );
        }

        let donations = engine.match_donations(campaign.id).await;
        for total in totals_by_symbol(&donations) {
            info!(
                "  donated {} {} across {} donations",
                total.formatted(),
                total.symbol,
                total.count
            );
        }
    }
}
