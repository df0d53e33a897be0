use sa_domain::error::Error;

/// Wrap any `sqlx` failure as `ErrorKind.storage` — callers never need to
/// know this crate's backing database.
pub fn storage_err(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{context}: {e}"))
}
