pub(crate) mod classifications;
#[cfg(test)]
pub(crate) mod memory;
pub(crate) mod metric_source;
pub(crate) mod store;

/// Pool exhaustion and broken connections, as opposed to query failures.
pub(crate) fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_))
}
