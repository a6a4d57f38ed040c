use sqlx::PgConnection;
use sqlx::postgres::PgListener;

/// A handle which can lend out a database connection to a driven adapter
pub trait ConnectionHandle {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

/// Provides access to every external system the application talks to. Driven adapters
/// receive an implementation of this trait so business logic never has to know
/// how a connection was obtained.
pub trait ExternalConnectivity: Sync {
    type DbHandle<'cxn_borrow>: ConnectionHandle + Send
    where
        Self: 'cxn_borrow;

    /// Acquires a connection to the database
    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error>;

    /// Opens a dedicated connection which can LISTEN for database notifications.
    /// The listener owns its connection, so it may outlive the borrow of self.
    async fn database_listener(&self) -> Result<PgListener, anyhow::Error>;

    /// HTTP client instrumented for trace propagation
    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware;
}

/// External connectivity which can start a database transaction
pub trait Transactable: ExternalConnectivity {
    type Handle: TransactionHandle;

    async fn start_transaction(&self) -> Result<Self::Handle, anyhow::Error>;
}

/// External connectivity with an open transaction which can be committed. Dropping
/// the handle without committing rolls the transaction back.
pub trait TransactionHandle: ExternalConnectivity {
    async fn commit(self) -> Result<(), anyhow::Error>;
}
