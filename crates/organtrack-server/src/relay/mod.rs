pub mod acceptor;
pub mod arbiter;
pub mod handler;
pub mod outbox;
pub mod registry;
pub mod worker;

use organtrack_protocol::ServerMessage;
use tokio::sync::RwLock;

/// Most recent Host transform; later writes replace earlier ones
#[derive(Debug, Default)]
pub struct TransformCache {
    latest: RwLock<Option<ServerMessage>>,
}

impl TransformCache {
    pub async fn store(&self, transform: ServerMessage) {
        *self.latest.write().await = Some(transform);
    }

    pub async fn latest(&self) -> Option<ServerMessage> {
        self.latest.read().await.clone()
    }
}
