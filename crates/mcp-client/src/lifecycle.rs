//! Scoped connection-set lifecycle.
//!
//! `open_all` is all-or-nothing: either every descriptor yields a usable
//! connection, or the partial set is released before the error propagates.
//! `close_all` always completes, collecting recoverable teardown errors,
//! then pauses briefly so detached async cleanup can finish before the
//! slots are reused.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use sy_domain::backend::BackendDescriptor;
use sy_domain::error::Result;

use crate::connection::{Connection, Connector};

/// Open a connection per descriptor, in order. On the first failure, every
/// connection opened so far is closed, without the teardown pause, and
/// the error propagates.
pub async fn open_all(
    connector: &dyn Connector,
    descriptors: &[BackendDescriptor],
) -> Result<Vec<Arc<Connection>>> {
    let mut opened: Vec<Arc<Connection>> = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        match connector.connect(descriptor).await {
            Ok(conn) => opened.push(Arc::new(conn)),
            Err(e) => {
                tracing::warn!(
                    backend = %descriptor.name,
                    error = %e,
                    opened = opened.len(),
                    "open_all failed, unwinding partial connection set"
                );
                join_all(opened.iter().map(|c| c.close())).await;
                return Err(e);
            }
        }
    }

    Ok(opened)
}

/// Close every connection, tolerating teardown races. A connection whose
/// backend already went away closes trivially; nothing here raises.
pub async fn close_all(connections: Vec<Arc<Connection>>, teardown_delay: Duration) {
    if connections.is_empty() {
        return;
    }

    let count = connections.len();
    join_all(connections.iter().map(|c| c.close())).await;
    tracing::debug!(count, "closed connection set");

    // Bounded pause for detached async cleanup; not a retry loop.
    if !teardown_delay.is_zero() {
        tokio::time::sleep(teardown_delay).await;
    }
}
