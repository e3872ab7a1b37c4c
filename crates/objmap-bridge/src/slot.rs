use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use objmap_upstream::{Connector, UpstreamConnection, UpstreamError};

/// A live upstream connection plus the generation it was created in.
#[derive(Clone)]
pub struct ConnectionHandle {
    generation: u64,
    connection: Arc<dyn UpstreamConnection>,
}

impl ConnectionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection(&self) -> &Arc<dyn UpstreamConnection> {
        &self.connection
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("generation", &self.generation)
            .field("endpoint", &self.connection.endpoint())
            .finish()
    }
}

struct SlotInner {
    current: Option<ConnectionHandle>,
    generations: u64,
}

/// The upstream connection shared by every subscription loop.
///
/// All reads and replacements happen under one async lock, so loops that
/// find the slot empty at the same time produce exactly one new connection.
pub struct ConnectionSlot {
    connector: Arc<dyn Connector>,
    inner: Mutex<SlotInner>,
}

impl ConnectionSlot {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            inner: Mutex::new(SlotInner {
                current: None,
                generations: 0,
            }),
        }
    }

    /// Return the live connection, establishing one if the slot is empty.
    pub async fn acquire(&self) -> Result<ConnectionHandle, UpstreamError> {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = &inner.current {
            tracing::debug!(generation = handle.generation, "reusing upstream connection");
            return Ok(handle.clone());
        }

        let connection = self.connector.connect().await?;
        inner.generations += 1;
        let handle = ConnectionHandle {
            generation: inner.generations,
            connection,
        };
        tracing::info!(
            generation = handle.generation,
            endpoint = handle.connection.endpoint(),
            "upstream connection established"
        );
        inner.current = Some(handle.clone());
        Ok(handle)
    }

    /// Empty the slot if it still holds `handle`. A newer connection made by
    /// another loop is left alone. Returns whether the slot was cleared.
    pub async fn invalidate(&self, handle: &ConnectionHandle) -> bool {
        let mut inner = self.inner.lock().await;
        match &inner.current {
            Some(current) if current.generation == handle.generation => {
                inner.current = None;
                tracing::info!(generation = handle.generation, "upstream connection reset");
                true
            }
            _ => false,
        }
    }

    pub async fn current_generation(&self) -> Option<u64> {
        self.inner.lock().await.current.as_ref().map(|h| h.generation)
    }
}
