use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::cache::{Cache, InMemoryCache, RedisConfig, RedisPool};
use common::database;
use identity::{
    AppState, IdentityService,
    jwt::{JwtConfig, JwtService},
    password::PasswordHasher,
    repositories::{CredentialStore, InMemoryCredentialStore, PgCredentialStore},
    routes, rpc,
    settings::{CacheBackend, ServiceSettings, StoreBackend},
    verification::DigitCodeGenerator,
};

async fn build_store(settings: &ServiceSettings) -> Result<Arc<dyn CredentialStore>> {
    match settings.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory credential store");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        StoreBackend::Postgres => {
            let db_config = database::DatabaseConfig::from_env()?;
            let pool = database::init_pool_with_retry(&db_config).await?;

            // Check database connectivity
            if database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            Ok(Arc::new(PgCredentialStore::new(pool)))
        }
    }
}

async fn build_cache(settings: &ServiceSettings) -> Result<Arc<dyn Cache>> {
    match settings.cache_backend {
        CacheBackend::Memory => {
            info!("Using in-memory cache");
            Ok(Arc::new(InMemoryCache::new()))
        }
        CacheBackend::Redis => {
            let redis_config = RedisConfig::from_env()?;
            let redis_pool = RedisPool::new(&redis_config).await?;

            // An unreachable cache only costs hit rate
            match redis_pool.health_check().await {
                Ok(true) => info!("Redis connection successful"),
                Ok(false) | Err(_) => warn!("Redis is unreachable; serving without cache"),
            }

            Ok(Arc::new(redis_pool))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting identity service");

    let settings = ServiceSettings::from_env()?;

    // Initialize JWT service
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let store = build_store(&settings).await?;
    let cache = build_cache(&settings).await?;

    let service = Arc::new(IdentityService::new(
        store,
        PasswordHasher::new()?,
        jwt_service.clone(),
        Arc::new(DigitCodeGenerator::new()),
    ));
    let app_state = AppState::new(service, cache, settings.cache_ttls(), jwt_service);

    info!("Identity service initialized successfully");

    let rpc_listener = TcpListener::bind(&settings.rpc_addr).await?;
    info!("RPC listener on {}", settings.rpc_addr);
    let rpc_app = rpc::create_rpc_router(app_state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(rpc_listener, rpc_app).await {
            error!("RPC listener stopped: {}", e);
        }
    });

    // Start the web server
    let app = routes::create_router(app_state);
    let listener = TcpListener::bind(&settings.http_addr).await?;
    info!("Identity service listening on {}", settings.http_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
