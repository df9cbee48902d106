//! Process-wide queue registry
//!
//! The registry owns the table store handle and mints transaction
//! participants bound to named queues. It replaces ambient global lookup:
//! state is initialized when the registry is constructed, torn down when the
//! last handle drops (the durable backend persists on drop), and always
//! passed by reference, which keeps the engine testable in isolation.

use crate::admin::QueueAdmin;
use crate::consumer::{ConsumerGroup, QueueConsumer};
use crate::entry::QueueName;
use crate::entry_store::EntryStore;
use crate::error::Result;
use crate::producer::QueueProducer;
use std::sync::Arc;
use strata_store::TableStore;

/// Factory for producers, consumers, and the admin surface over one store.
#[derive(Clone)]
pub struct QueueRegistry {
    store: Arc<dyn TableStore>,
}

impl QueueRegistry {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Lifecycle management for the queues in this store.
    pub fn admin(&self) -> QueueAdmin {
        QueueAdmin::new(self.store.clone())
    }

    /// A producer bound to an existing queue.
    pub fn producer(&self, queue: &QueueName) -> Result<QueueProducer> {
        // Validates existence up front so a dropped queue fails here, not at
        // commit time.
        self.admin().get_config(queue)?;
        Ok(QueueProducer::new(EntryStore::new(
            queue.clone(),
            self.store.clone(),
        )))
    }

    /// A consumer bound to an existing queue, partitioned per the queue's
    /// configuration.
    pub fn consumer(&self, queue: &QueueName, group: ConsumerGroup) -> Result<QueueConsumer> {
        let config = self.admin().get_config(queue)?;
        Ok(QueueConsumer::new(
            queue.clone(),
            self.store.clone(),
            group,
            config.partitioning,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::QueueConfig;
    use crate::error::QueueError;
    use strata_store::MemoryStore;

    #[test]
    fn participants_require_an_existing_queue() {
        let registry = QueueRegistry::new(Arc::new(MemoryStore::new()));
        let queue = QueueName::new("ns", "missing");

        assert!(matches!(
            registry.producer(&queue).unwrap_err(),
            QueueError::QueueNotFound(_)
        ));
        assert!(matches!(
            registry
                .consumer(&queue, ConsumerGroup::single(1))
                .unwrap_err(),
            QueueError::QueueNotFound(_)
        ));

        registry.admin().create(&queue, QueueConfig::default()).unwrap();
        assert!(registry.producer(&queue).is_ok());
        assert!(registry.consumer(&queue, ConsumerGroup::single(1)).is_ok());
    }
}
