use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use questline::{
    api::{
        create_actions_router, create_payouts_router, create_risk_router, ActionsApiState,
        PayoutsApiState, RiskApiState,
    },
    oracle::OracleClientConfig,
    BalanceLedger, BlacklistGuard, Config, DatabasePool, FixedVerdictOracle,
    HttpVerificationOracle, NotificationSender, PayoutManager, RewardIssuer, RiskEventLog,
    RiskScorer, SettlementManager, VerificationOracle,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        e
    })?);

    init_logging(&config)?;

    info!("Starting Questline settlement server");
    info!(
        "Oracle enabled: {}, PostgreSQL enabled: {}, payout minimum: {}",
        config.oracle.enabled, config.database.postgres_enabled, config.payout.min_amount
    );

    // Persistence (optional)
    let db = if config.database.postgres_enabled {
        let pool = DatabasePool::new(&config.database.postgres_url)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        pool.init_schema().await.map_err(|e| anyhow::anyhow!(e))?;
        Some(Arc::new(pool))
    } else {
        warn!("PostgreSQL disabled, settlement state is in-memory only");
        None
    };

    // Risk side
    let risk_log = {
        let log = RiskEventLog::new();
        Arc::new(match db.clone() {
            Some(db) => log.with_database(db),
            None => log,
        })
    };
    let risk_policy = config.risk.to_policy();
    let scorer = Arc::new(RiskScorer::new(risk_log.clone(), risk_policy.clone()));
    let blacklist = {
        let guard = BlacklistGuard::new(risk_log.clone());
        Arc::new(match db.clone() {
            Some(db) => guard.with_database(db),
            None => guard,
        })
    };

    // Settlement side
    let notifier = Arc::new(NotificationSender::new(config.notifier.webhook_url.clone()));
    let ledger = Arc::new(BalanceLedger::new());
    let issuer = {
        let issuer = RewardIssuer::new(ledger.clone(), notifier.clone());
        Arc::new(match db.clone() {
            Some(db) => issuer.with_database(db),
            None => issuer,
        })
    };

    let oracle: Arc<dyn VerificationOracle> = if config.oracle.enabled {
        Arc::new(HttpVerificationOracle::new(OracleClientConfig {
            base_url: config.oracle.base_url.clone(),
            api_key: config.oracle.api_key.clone(),
            timeout_secs: config.oracle.timeout_secs,
            require_https: config.oracle.require_https,
        })?)
    } else {
        warn!("Verification oracle disabled, auto-verifiable quests will wait for retry or review");
        Arc::new(FixedVerdictOracle::new(false))
    };

    let settlement = {
        let manager = SettlementManager::new(
            issuer.clone(),
            blacklist.clone(),
            risk_log.clone(),
            oracle,
        )
        .with_risk_policy(risk_policy);
        Arc::new(match db.clone() {
            Some(db) => manager.with_database(db),
            None => manager,
        })
    };

    let payouts = {
        let manager = PayoutManager::new(
            ledger,
            blacklist.clone(),
            scorer.clone(),
            risk_log.clone(),
            notifier,
        )
        .with_policy(config.payout.to_policy());
        Arc::new(match db {
            Some(db) => manager.with_database(db),
            None => manager,
        })
    };

    // Build the application with per-surface routers
    let app = Router::new()
        .nest(
            "/actions",
            create_actions_router(ActionsApiState {
                settlement: settlement.clone(),
            }),
        )
        .nest(
            "/payouts",
            create_payouts_router(PayoutsApiState {
                payouts: payouts.clone(),
            }),
        )
        .nest(
            "/risk",
            create_risk_router(RiskApiState {
                scorer,
                blacklist,
                risk_log,
                settlement,
                payouts,
            }),
        )
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Settlement server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
