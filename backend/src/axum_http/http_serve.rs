use crate::{
    auth::SupabaseJwt,
    axum_http::{default_routers, routers},
    config::config_model::{DotEnvyConfig, RateLimitBackend},
    usecases::{
        billing_webhook::BillingWebhookUseCase, retry::RetryPolicy,
        subscriptions::SubscriptionUseCase,
    },
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::infra::{
    db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{rate_limits::PostgresRateLimiter, subscriptions::SubscriptionPostgres},
    },
    rate_limit::in_memory::InMemoryRateLimiter,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let subscription_repo = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));

    if config.polar.webhook_secret.is_none() {
        warn!("POLAR_WEBHOOK_SECRET is not set; webhooks will be rejected with 500");
    }
    let billing_webhook_usecase = BillingWebhookUseCase::new(
        Arc::clone(&subscription_repo),
        config.polar.webhook_secret.clone(),
        RetryPolicy::new(config.polar.max_retries, config.polar.initial_backoff),
    );

    let jwt = Arc::new(SupabaseJwt::new(&config.supabase.jwt_secret));
    let rate_limit = &config.rate_limit;
    let subscription_routes = match rate_limit.backend {
        RateLimitBackend::Memory => routers::subscriptions::routes(
            Arc::new(SubscriptionUseCase::new(
                Arc::clone(&subscription_repo),
                Arc::new(InMemoryRateLimiter::new(
                    rate_limit.max_requests,
                    rate_limit.window,
                )),
            )),
            jwt,
        ),
        RateLimitBackend::Postgres => routers::subscriptions::routes(
            Arc::new(SubscriptionUseCase::new(
                Arc::clone(&subscription_repo),
                Arc::new(PostgresRateLimiter::new(
                    Arc::clone(&db_pool),
                    rate_limit.max_requests,
                    rate_limit.window,
                )),
            )),
            jwt,
        ),
    };
    info!(
        backend = ?rate_limit.backend,
        max_requests = rate_limit.max_requests,
        window_secs = rate_limit.window.as_secs(),
        "rate limiter configured"
    );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/webhooks",
            routers::billing_webhook::routes(Arc::new(billing_webhook_usecase)),
        )
        .nest("/api/v1/subscriptions", subscription_routes)
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            config.backend_server.body_limit_bytes()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
