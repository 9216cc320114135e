//! Single-Host monitoring.
//!
//! The registry accepts any number of Hosts. The arbiter watches the Host
//! count, tells every Host when a second one shows up and again once only one
//! is left. Frames are only processed while exactly one Host is registered.

use std::sync::atomic::{AtomicUsize, Ordering};

use organtrack_protocol::{Role, ServerMessage};

use super::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    NoHost,
    Single,
    Multiple(usize),
}

impl HostStatus {
    fn from_count(count: usize) -> Self {
        match count {
            0 => HostStatus::NoHost,
            1 => HostStatus::Single,
            n => HostStatus::Multiple(n),
        }
    }
}

#[derive(Debug, Default)]
pub struct HostArbiter {
    /// Host count seen by the previous check
    last_count: AtomicUsize,
}

impl HostArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-count the Hosts and notify them when the count crosses one.
    ///
    /// Notices go out once per change, whichever connection observes it first.
    pub async fn check(&self, registry: &SessionRegistry) -> HostStatus {
        let count = registry.count_by_role(Role::Host).await;
        let previous = self.last_count.swap(count, Ordering::SeqCst);

        if count > 1 && count != previous {
            tracing::warn!(hosts = count, "Multiple Hosts registered; suspending frame processing");
            registry
                .broadcast_to_role(Role::Host, &ServerMessage::MultipleHosts { count })
                .await;
        } else if count == 1 && previous > 1 {
            tracing::info!("Single Host restored; resuming frame processing");
            registry
                .broadcast_to_role(Role::Host, &ServerMessage::HostRecovered)
                .await;
        }

        HostStatus::from_count(count)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use super::*;
    use crate::relay::outbox::{outbox, Inbox, OUTBOUND_CAPACITY};
    use crate::relay::registry::Registration;

    async fn register_host(
        registry: &SessionRegistry,
        id: &str,
        port: u16,
    ) -> Inbox {
        let (sender, rx) = outbox(OUTBOUND_CAPACITY);
        registry
            .register(Registration {
                id: id.to_string(),
                role: Some(Role::Host),
                remote: SocketAddr::from(([127, 0, 0, 1], port)),
                connection_id: Uuid::new_v4(),
                sender,
                closer: CancellationToken::new(),
            })
            .await;
        rx
    }

    #[tokio::test]
    async fn test_duplicate_host_and_recovery() {
        let registry = SessionRegistry::new();
        let arbiter = HostArbiter::new();

        assert_eq!(arbiter.check(&registry).await, HostStatus::NoHost);

        let mut first = register_host(&registry, "h1", 5001).await;
        assert_eq!(arbiter.check(&registry).await, HostStatus::Single);
        assert!(first.try_recv().is_none());

        let mut second = register_host(&registry, "h2", 5002).await;
        assert_eq!(arbiter.check(&registry).await, HostStatus::Multiple(2));
        let notice = ServerMessage::MultipleHosts { count: 2 };
        assert_eq!(first.try_recv().unwrap(), notice);
        assert_eq!(second.try_recv().unwrap(), notice);

        // no repeat while nothing changes
        assert_eq!(arbiter.check(&registry).await, HostStatus::Multiple(2));
        assert!(first.try_recv().is_none());

        registry.remove("h2").await;
        assert_eq!(arbiter.check(&registry).await, HostStatus::Single);
        assert_eq!(first.try_recv().unwrap(), ServerMessage::HostRecovered);
        assert!(second.try_recv().is_none());
    }
}
