use std::future::Future;

/// Errors surfaced by the progress engine. Validation and not-found failures
/// happen before any write, so a returned error means no partial state was
/// left behind.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("subject not found: {0}")]
    SubjectNotFound(String),
    #[error("review not found: {0}")]
    ReviewNotFound(String),
    #[error("review already completed: {0}")]
    ReviewAlreadyCompleted(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Attempts a conflicting transaction gets before its failure surfaces as
/// `StorageUnavailable`.
const MAX_ATTEMPTS: u32 = 3;

/// True for the transient SQLite errors worth a bounded retry (writer
/// contention under WAL), as opposed to real failures.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            matches!(code.as_deref(), Some("5") | Some("6")) // SQLITE_BUSY, SQLITE_LOCKED
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Runs a storage operation, re-running it a bounded number of times when it
/// fails with a transient lock conflict, then giving up with
/// `StorageUnavailable`. Validation, not-found and other engine errors pass
/// through untouched on the first occurrence; only transient SQL failures
/// are retried.
pub async fn retry_transient<T, F, Fut>(what: &str, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(EngineError::Sql(err)) if is_transient(&err) => {
                if attempt < MAX_ATTEMPTS {
                    log::warn!("{what}: transient storage conflict, attempt {attempt}: {err}");
                } else {
                    return Err(EngineError::StorageUnavailable(err.to_string()));
                }
            }
            outcome => return outcome,
        }
    }
}
