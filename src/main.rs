use std::{process, sync::Arc};

use folio::{
    application::{documents::DocumentService, error::AppError},
    cache::{CacheStore, CacheTrigger, MemoryStore, RedisStore},
    config,
    infra::{
        assets::AssetStorage,
        cache_warmer::CacheWarmer,
        db::PostgresDocuments,
        error::InfraError,
        http::{self, AppState, AuthKeys},
        signing::UrlSigner,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    PostgresDocuments::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!("migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    PostgresDocuments::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repo = Arc::new(PostgresDocuments::new(pool));
    let store = build_cache_store(&settings);
    let trigger = Arc::new(CacheTrigger::new(store.clone()));
    let signer = UrlSigner::new(settings.signing.secret.clone(), settings.signing.url_ttl);

    let documents = Arc::new(DocumentService::new(
        repo,
        store.clone(),
        trigger.clone(),
        signer,
        settings.cache.policy.clone(),
    ));

    let assets = Arc::new(
        AssetStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.public_base_url.clone(),
        )
        .map_err(|err| AppError::from(InfraError::from(err)))?,
    );

    let auth = Arc::new(AuthKeys::new(
        settings.auth.student_keys.clone(),
        settings.auth.academy_keys.clone(),
    ));

    let state = AppState {
        documents: documents.clone(),
        trigger,
        assets,
        auth,
        upload_limit_bytes: settings.uploads.max_request_bytes.get() as usize,
    };

    // Warm the cache off the request path; the listener never waits on it.
    let warmer = CacheWarmer::new(documents, store, settings.cache.policy.clone());
    tokio::spawn(async move {
        warmer.run().await;
    });

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn connect_database(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url is required; set it in folio.toml or FOLIO__DATABASE__URL",
        ))
    })?;
    PostgresDocuments::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

fn build_cache_store(settings: &config::Settings) -> Arc<dyn CacheStore> {
    match settings.cache.redis_url.as_deref() {
        Some(url) => match RedisStore::connect(url, settings.cache.op_timeout) {
            Ok(store) => {
                info!("using redis cache store");
                Arc::new(store)
            }
            Err(error) => {
                warn!(%error, "redis pool creation failed, falling back to in-memory store");
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            info!("no redis url configured, using in-memory cache store");
            Arc::new(MemoryStore::new())
        }
    }
}
