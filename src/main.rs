use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use anonboard::config::AppConfig;
use anonboard::openapi::ApiDoc;
use anonboard::password::Argon2Hasher;
use anonboard::rate_limit::RateLimiterFacade;
use anonboard::repo::Repo;
use anonboard::{routes, AppState, BoardStore, SecurityHeaders};

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable the `inmem-store` or `postgres-store` feature");

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use anonboard::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;
    let db_url = cfg.database_url.as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    let repo = PgRepo::new(pool);
    repo.migrate().await?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use anonboard::repo::inmem::InMemRepo;
    let repo = match &cfg.data_dir {
        Some(dir) => {
            info!("Using in-memory repository backend (snapshots in {})", dir.display());
            InMemRepo::with_snapshot_dir(dir)
        }
        None => {
            info!("Using in-memory repository backend (ephemeral)");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}

fn cors(origins: &[String]) -> Cors {
    let c = Cors::default()
        .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .max_age(3600);
    if origins.is_empty() {
        c.allow_any_origin()
    } else {
        origins.iter().fold(c, |c, o| c.allowed_origin(o))
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Bootstrapping message board server");
    let cfg = AppConfig::from_env()?;
    info!(hsts = cfg.enable_hsts, rate_limit = cfg.rate_limit.enabled, cors_origins = ?cfg.cors_origins, "configuration loaded");

    let repo = build_repo(&cfg).await?;
    let hasher = Arc::new(Argon2Hasher::new(cfg.hash)?);
    let state = AppState {
        board: BoardStore::new(repo, hasher),
        rate_limiter: cfg.rate_limit.enabled.then(|| RateLimiterFacade::from_config(cfg.rate_limit.clone())),
    };
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let openapi = ApiDoc::openapi();

    let origins = cfg.cors_origins.clone();
    let hsts = cfg.enable_hsts;
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::new(hsts))
            .wrap(cors(&origins))
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(prometheus.clone()))
            .configure(routes::config)
            .route("/metrics", web::get().to(routes::metrics))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.bind_addr.clone(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await?;
    Ok(())
}
