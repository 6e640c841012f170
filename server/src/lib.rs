#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]
#![cfg_attr(
    not(debug_assertions),
    deny(unused_imports, unused_mut, unused_variables,)
)]

pub mod access;
mod api;
pub mod config;
pub mod database;
mod error;
pub mod ingest;
mod middleware;
pub mod oobe;
mod storage;

#[cfg(test)]
mod testing;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::Extension, http::Uri, Router};
use sea_orm::{query::Statement, ConnectionTrait, Database, DatabaseConnection, DbBackend};
use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tokio::time;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use access::http::{apply_auth, AuthState};
use config::{Config, DatabaseConfig, StorageConfig};
use database::migration::{Migrator, MigratorTrait};
use error::{ServerError, ServerResult};
use ingest::{AssetExistenceCache, HttpAssetProbe, Ingestor, Reporter, TracingReporter};
use middleware::{init_request_state, restrict_host};
use storage::{LocalBackend, S3Backend, StorageBackend};

type State = Arc<StateInner>;
type RequestState = Arc<RequestStateInner>;

/// Global server state.
#[derive(Debug)]
pub struct StateInner {
    /// The Hatch Server configuration.
    config: Config,

    /// Handle to the database.
    database: OnceCell<DatabaseConnection>,

    /// Handle to the storage backend.
    storage: OnceCell<Arc<Box<dyn StorageBackend>>>,

    /// The ingestion pipeline.
    ingestor: OnceCell<Arc<Ingestor>>,
}

/// Request state.
#[derive(Debug)]
struct RequestStateInner {
    /// Auth state.
    auth: AuthState,
}

impl StateInner {
    async fn new(config: Config) -> State {
        Arc::new(Self {
            config,
            database: OnceCell::new(),
            storage: OnceCell::new(),
            ingestor: OnceCell::new(),
        })
    }

    /// Returns a handle to the database.
    async fn database(&self) -> ServerResult<&DatabaseConnection> {
        self.database
            .get_or_try_init(|| connect_database(&self.config.database))
            .await
    }

    /// Returns a handle to the storage backend.
    async fn storage(&self) -> ServerResult<&Arc<Box<dyn StorageBackend>>> {
        self.storage
            .get_or_try_init(|| async {
                match &self.config.storage {
                    StorageConfig::Local(local_config) => {
                        let local = LocalBackend::new(local_config.clone()).await?;
                        let boxed: Box<dyn StorageBackend> = Box::new(local);
                        Ok(Arc::new(boxed))
                    }
                    StorageConfig::S3(s3_config) => {
                        let s3 = S3Backend::new(s3_config.clone()).await?;
                        let boxed: Box<dyn StorageBackend> = Box::new(s3);
                        Ok(Arc::new(boxed))
                    }
                }
            })
            .await
    }

    /// Returns the ingestion pipeline.
    ///
    /// There is one pipeline per process, so the asset existence cache
    /// is shared by all uploads.
    async fn ingestor(&self) -> ServerResult<&Arc<Ingestor>> {
        self.ingestor
            .get_or_try_init(|| async {
                let database = self.database().await?.clone();
                let storage = self.storage().await?.clone();
                let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);

                let assets = if self.config.asset_service.enable {
                    let probe = HttpAssetProbe::new(self.config.asset_service.clone())?;
                    Some(Arc::new(AssetExistenceCache::new(
                        Arc::new(probe),
                        reporter.clone(),
                    )))
                } else {
                    None
                };

                Ok(Arc::new(Ingestor::new(
                    self.config.ingest.clone(),
                    database,
                    storage,
                    assets,
                    reporter,
                )))
            })
            .await
    }

    /// Sends periodic heartbeat queries to the database.
    async fn run_db_heartbeat(&self) -> ServerResult<()> {
        let db = self.database().await?;
        let stmt =
            Statement::from_string(db.get_database_backend(), "SELECT 'heartbeat';".to_string());

        loop {
            let _ = db.execute(stmt.clone()).await;
            time::sleep(Duration::from_secs(60)).await;
        }
    }
}

/// Connects to the database.
///
/// SQLite databases are switched to WAL mode, so uploads being indexed
/// don't block readers.
async fn connect_database(config: &DatabaseConfig) -> ServerResult<DatabaseConnection> {
    let db = Database::connect(&config.url)
        .await
        .map_err(ServerError::database_error)?;

    if db.get_database_backend() == DbBackend::Sqlite {
        let stmt = Statement::from_string(DbBackend::Sqlite, "PRAGMA journal_mode=WAL;".to_string());
        db.execute(stmt)
            .await
            .map_err(ServerError::database_error)?;
    }

    Ok(db)
}

/// The fallback route.
#[axum_macros::debug_handler]
async fn fallback(_: Uri) -> ServerResult<()> {
    Err(ServerError::NotFound)
}

/// Runs the API server.
pub async fn run_api_server(cli_listen: Option<SocketAddr>, config: Config) -> Result<()> {
    eprintln!("Starting API server...");

    let state = StateInner::new(config).await;

    let listen = if let Some(cli_listen) = cli_listen {
        cli_listen
    } else {
        state.config.listen.to_owned()
    };

    let rest = Router::new()
        .merge(api::get_router(&state.config.ingest))
        .fallback(fallback)
        // middlewares
        .layer(axum::middleware::from_fn(apply_auth))
        .layer(axum::middleware::from_fn(init_request_state))
        .layer(axum::middleware::from_fn(restrict_host))
        .layer(Extension(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    eprintln!("Listening on {:?}...", listen);

    let listener = TcpListener::bind(&listen).await?;

    let (server_ret, _) = tokio::join!(
        axum::serve(listener, rest.into_make_service()).into_future(),
        async {
            if state.config.database.heartbeat {
                let _ = state.run_db_heartbeat().await;
            }
        },
    );

    server_ret?;

    Ok(())
}

/// Runs database migrations.
pub async fn run_migrations(config: Config) -> Result<()> {
    eprintln!("Running migrations...");

    let state = StateInner::new(config).await;
    let db = state.database().await?;
    Migrator::up(db, None).await?;

    Ok(())
}
