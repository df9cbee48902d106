//! End-to-end transaction flows: coordinator, driver, and queue
//! participants working against one shared store.

use std::sync::Arc;
use strata_common::TransactionalResource;
use strata_coordinator::{ContextError, LocalCoordinator, TransactionContext, TransactionCoordinator};
use strata_queue::{ConsumerGroup, QueueConfig, QueueEntry, QueueName, QueueRegistry};
use strata_store::MemoryStore;

fn setup(queue: &QueueName) -> (QueueRegistry, LocalCoordinator) {
    let registry = QueueRegistry::new(Arc::new(MemoryStore::new()));
    registry.admin().create(queue, QueueConfig::default()).unwrap();
    (registry, LocalCoordinator::new())
}

fn produce(
    registry: &QueueRegistry,
    coordinator: &LocalCoordinator,
    queue: &QueueName,
    payloads: &[&[u8]],
) {
    let mut producer = registry.producer(queue).unwrap();
    let mut ctx = TransactionContext::new(coordinator);
    ctx.begin(&mut [&mut producer]).unwrap();
    for payload in payloads {
        producer.enqueue(QueueEntry::new(payload.to_vec())).unwrap();
    }
    ctx.commit(&mut [&mut producer]).unwrap();
}

#[test]
fn produced_batch_is_consumed_in_order() {
    let queue = QueueName::new("app", "orders");
    let (registry, coordinator) = setup(&queue);
    produce(&registry, &coordinator, &queue, &[b"x", b"y", b"z"]);

    let mut consumer = registry.consumer(&queue, ConsumerGroup::single(1)).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut consumer]).unwrap();
    let batch = consumer.dequeue(10).unwrap();
    let payloads: Vec<Vec<u8>> = batch.iter().map(|(_, e)| e.payload.clone()).collect();
    assert_eq!(payloads, vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()]);

    let pointers: Vec<_> = batch.iter().map(|(p, _)| *p).collect();
    consumer.ack(&pointers).unwrap();
    ctx.commit(&mut [&mut consumer]).unwrap();

    // Everything acknowledged; the next transaction drains nothing.
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut consumer]).unwrap();
    assert!(consumer.dequeue(10).unwrap().is_empty());
    ctx.abort(&mut [&mut consumer]).unwrap();
}

#[test]
fn concurrent_producers_commit_without_conflicting() {
    let queue = QueueName::new("app", "firehose");
    let (registry, coordinator) = setup(&queue);

    let mut first = registry.producer(&queue).unwrap();
    let mut second = registry.producer(&queue).unwrap();
    let mut ctx1 = TransactionContext::new(&coordinator);
    let mut ctx2 = TransactionContext::new(&coordinator);

    let tx1 = ctx1.begin(&mut [&mut first]).unwrap();
    let tx2 = ctx2.begin(&mut [&mut second]).unwrap();
    assert!(tx2.write_pointer() > tx1.write_pointer());

    first.enqueue(QueueEntry::new(b"one".to_vec())).unwrap();
    second.enqueue(QueueEntry::new(b"two".to_vec())).unwrap();

    // Commit in reverse begin order; appends never abort each other.
    ctx2.commit(&mut [&mut second]).unwrap();
    ctx1.commit(&mut [&mut first]).unwrap();

    let mut consumer = registry.consumer(&queue, ConsumerGroup::single(1)).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut consumer]).unwrap();
    let batch = consumer.dequeue(10).unwrap();
    assert_eq!(batch.len(), 2);
    // Relative order follows write pointers, not commit order.
    assert_eq!(batch[0].1.payload, b"one");
    assert_eq!(batch[1].1.payload, b"two");
    ctx.abort(&mut [&mut consumer]).unwrap();
}

#[test]
fn same_group_consumers_conflict_and_the_loser_retries() {
    let queue = QueueName::new("app", "claims");
    let (registry, coordinator) = setup(&queue);
    produce(&registry, &coordinator, &queue, &[b"a", b"b"]);

    let mut winner = registry.consumer(&queue, ConsumerGroup::single(1)).unwrap();
    let mut loser = registry.consumer(&queue, ConsumerGroup::single(1)).unwrap();
    let mut ctx_w = TransactionContext::new(&coordinator);
    let mut ctx_l = TransactionContext::new(&coordinator);

    ctx_w.begin(&mut [&mut winner]).unwrap();
    ctx_l.begin(&mut [&mut loser]).unwrap();

    let batch = winner.dequeue(1).unwrap();
    winner.ack(&[batch[0].0]).unwrap();
    let batch = loser.dequeue(1).unwrap();
    loser.ack(&[batch[0].0]).unwrap();

    ctx_w.commit(&mut [&mut winner]).unwrap();
    let err = ctx_l.commit(&mut [&mut loser]).unwrap_err();
    assert!(matches!(err, ContextError::Conflict));

    // The loser retries the whole transaction and observes the winner's
    // progress.
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut loser]).unwrap();
    let batch = loser.dequeue(10).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].1.payload, b"b");
    ctx.abort(&mut [&mut loser]).unwrap();
}

#[test]
fn different_instances_of_a_group_never_conflict() {
    let queue = QueueName::new("app", "sharded");
    let registry = QueueRegistry::new(Arc::new(MemoryStore::new()));
    registry
        .admin()
        .create(
            &queue,
            QueueConfig {
                partitioning: strata_queue::Partitioning::RoundRobin,
                ..QueueConfig::default()
            },
        )
        .unwrap();
    let coordinator = LocalCoordinator::new();
    produce(&registry, &coordinator, &queue, &[b"0", b"1", b"2", b"3"]);

    let mut left = registry
        .consumer(&queue, ConsumerGroup::new(1, 0, 2))
        .unwrap();
    let mut right = registry
        .consumer(&queue, ConsumerGroup::new(1, 1, 2))
        .unwrap();
    let mut ctx_left = TransactionContext::new(&coordinator);
    let mut ctx_right = TransactionContext::new(&coordinator);

    ctx_left.begin(&mut [&mut left]).unwrap();
    ctx_right.begin(&mut [&mut right]).unwrap();

    let batch = left.dequeue(10).unwrap();
    let pointers: Vec<_> = batch.iter().map(|(p, _)| *p).collect();
    assert_eq!(pointers.len(), 2);
    left.ack(&pointers).unwrap();

    let batch = right.dequeue(10).unwrap();
    let pointers: Vec<_> = batch.iter().map(|(p, _)| *p).collect();
    assert_eq!(pointers.len(), 2);
    right.ack(&pointers).unwrap();

    // Disjoint marker keys: both commit.
    ctx_left.commit(&mut [&mut left]).unwrap();
    ctx_right.commit(&mut [&mut right]).unwrap();
}

#[test]
fn aborted_work_never_becomes_visible() {
    let queue = QueueName::new("app", "abandoned");
    let (registry, coordinator) = setup(&queue);

    let mut producer = registry.producer(&queue).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut producer]).unwrap();
    producer.enqueue(QueueEntry::new(b"ghost".to_vec())).unwrap();
    ctx.abort(&mut [&mut producer]).unwrap();

    let mut consumer = registry.consumer(&queue, ConsumerGroup::single(1)).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut consumer]).unwrap();
    assert!(consumer.dequeue(10).unwrap().is_empty());
    ctx.abort(&mut [&mut consumer]).unwrap();
}

#[test]
fn crashed_transaction_stays_invisible_before_undo_lands() {
    let queue = QueueName::new("app", "crashed");
    let (registry, coordinator) = setup(&queue);

    // The participant flushes, but the coordinator never finalizes: the
    // process dies and the coordinator times the transaction out.
    let mut producer = registry.producer(&queue).unwrap();
    let tx = coordinator.begin_transaction();
    producer.start_transaction(tx.clone()).unwrap();
    producer.enqueue(QueueEntry::new(b"orphan".to_vec())).unwrap();
    assert!(producer.commit().unwrap());
    coordinator.abort(&tx);

    // Entries sit in the store without tombstones, yet the excluded pointer
    // keeps them invisible.
    let mut consumer = registry.consumer(&queue, ConsumerGroup::single(1)).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut consumer]).unwrap();
    assert!(consumer.dequeue(10).unwrap().is_empty());
    ctx.abort(&mut [&mut consumer]).unwrap();
}

#[test]
fn multi_participant_transactions_commit_atomically() {
    let source = QueueName::new("app", "in");
    let sink = QueueName::new("app", "out");
    let registry = QueueRegistry::new(Arc::new(MemoryStore::new()));
    registry.admin().create(&source, QueueConfig::default()).unwrap();
    registry.admin().create(&sink, QueueConfig::default()).unwrap();
    let coordinator = LocalCoordinator::new();
    produce(&registry, &coordinator, &source, &[b"job"]);

    // One transaction consumes from `source` and produces to `sink`.
    let mut consumer = registry.consumer(&source, ConsumerGroup::single(1)).unwrap();
    let mut producer = registry.producer(&sink).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut consumer, &mut producer]).unwrap();

    let batch = consumer.dequeue(1).unwrap();
    assert_eq!(batch[0].1.payload, b"job");
    consumer.ack(&[batch[0].0]).unwrap();
    producer.enqueue(QueueEntry::new(b"done".to_vec())).unwrap();

    ctx.commit(&mut [&mut consumer, &mut producer]).unwrap();

    let mut verify = registry.consumer(&sink, ConsumerGroup::single(1)).unwrap();
    let mut ctx = TransactionContext::new(&coordinator);
    ctx.begin(&mut [&mut verify]).unwrap();
    let batch = verify.dequeue(10).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].1.payload, b"done");
    ctx.abort(&mut [&mut verify]).unwrap();
}
