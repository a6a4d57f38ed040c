pub mod db_push_token_driven_ports;
pub mod db_todo_driven_ports;
pub mod db_user_driven_ports;

use crate::external_connections;
use crate::external_connections::ConnectionHandle;
use anyhow::Context;
use reqwest_middleware::ClientBuilder;
use reqwest_tracing::TracingMiddleware;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgListener;
use sqlx::{Acquire, PgConnection, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

/// Postgres pool plus a tracing-aware HTTP client. Cloning is cheap, so each request
/// handler takes its own copy.
#[derive(Clone)]
pub struct ExternalConnectivity {
    db: PgPool,
    http_client: reqwest_middleware::ClientWithMiddleware,
}

/// Upper bound on any outgoing HTTP call, including push deliveries awaited inside a live feed
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

impl ExternalConnectivity {
    pub fn new(db: PgPool) -> Result<Self, anyhow::Error> {
        Self::with_http_timeout(db, HTTP_TIMEOUT)
    }

    pub fn with_http_timeout(db: PgPool, http_timeout: Duration) -> Result<Self, anyhow::Error> {
        let base_client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(http_timeout)
            .build()
            .context("building the HTTP client")?;
        let http_client = ClientBuilder::new(base_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(ExternalConnectivity { db, http_client })
    }
}

/// A connection checked out of the pool for the duration of one adapter call
pub struct PooledConnection(PoolConnection<Postgres>);

impl ConnectionHandle for PooledConnection {
    fn borrow_connection(&mut self) -> &mut PgConnection {
        &mut self.0
    }
}

async fn listen_on(db: &PgPool) -> Result<PgListener, anyhow::Error> {
    PgListener::connect_with(db)
        .await
        .context("opening a connection to listen for notifications")
}

impl external_connections::ExternalConnectivity for ExternalConnectivity {
    type DbHandle<'cxn_borrow> = PooledConnection;

    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error> {
        let connection = self
            .db
            .acquire()
            .await
            .context("acquiring a connection from the pool")?;

        Ok(PooledConnection(connection))
    }

    async fn database_listener(&self) -> Result<PgListener, anyhow::Error> {
        listen_on(&self.db).await
    }

    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
        &self.http_client
    }
}

impl external_connections::Transactable for ExternalConnectivity {
    type Handle = TransactionalConnectivity;

    async fn start_transaction(&self) -> Result<Self::Handle, anyhow::Error> {
        let txn = self
            .db
            .begin()
            .await
            .context("starting a database transaction")?;
        debug!("Opened database transaction");

        Ok(TransactionalConnectivity {
            txn,
            db: self.db.clone(),
            http_client: self.http_client.clone(),
        })
    }
}

/// Connectivity whose database work all happens on one open transaction. Dropping it
/// without [commit][external_connections::TransactionHandle::commit] rolls everything back.
/// Listeners still get their own pooled connection since NOTIFY only fires on commit.
pub struct TransactionalConnectivity {
    txn: Transaction<'static, Postgres>,
    db: PgPool,
    http_client: reqwest_middleware::ClientWithMiddleware,
}

/// Borrow of the open transaction's connection
pub struct TransactionConnection<'tx>(&'tx mut PgConnection);

impl ConnectionHandle for TransactionConnection<'_> {
    fn borrow_connection(&mut self) -> &mut PgConnection {
        &mut *self.0
    }
}

impl external_connections::ExternalConnectivity for TransactionalConnectivity {
    type DbHandle<'tx_borrow>
        = TransactionConnection<'tx_borrow>
    where
        Self: 'tx_borrow;

    async fn database_cxn(&mut self) -> Result<TransactionConnection<'_>, anyhow::Error> {
        let connection = self
            .txn
            .acquire()
            .await
            .context("borrowing the transaction's connection")?;

        Ok(TransactionConnection(connection))
    }

    async fn database_listener(&self) -> Result<PgListener, anyhow::Error> {
        listen_on(&self.db).await
    }

    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
        &self.http_client
    }
}

impl external_connections::TransactionHandle for TransactionalConnectivity {
    async fn commit(self) -> Result<(), anyhow::Error> {
        self.txn
            .commit()
            .await
            .context("committing the database transaction")?;
        debug!("Committed database transaction");

        Ok(())
    }
}

/// Row holding the ID Postgres generated for an insert
#[derive(sqlx::FromRow)]
struct NewId {
    id: String,
}
