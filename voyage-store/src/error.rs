use voyage_core::CoreError;

/// SQLSTATE classes and codes worth retrying: connection exceptions,
/// serialization failures, deadlocks, admin shutdown, too many connections.
const TRANSIENT_SQLSTATES: [&str; 5] = ["08", "40001", "40P01", "57P01", "53300"];

pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| TRANSIENT_SQLSTATES.iter().any(|prefix| code.starts_with(prefix)))
            .unwrap_or(false),
        _ => false,
    }
}

pub fn map_sqlx(operation: &str, err: sqlx::Error) -> CoreError {
    if is_transient(&err) {
        CoreError::TransientStore(format!("{}: {}", operation, err))
    } else {
        CoreError::StoreRejected(format!("{}: {}", operation, err))
    }
}
