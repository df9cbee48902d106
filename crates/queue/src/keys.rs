//! Key layout for the table store
//!
//! Every key starts with a one-byte tag followed by the length-prefixed
//! queue name, so distinct queues never share a key prefix ("q1" cannot
//! shadow "q10"). Entry keys end with the big-endian pointer encoding,
//! marker keys with the big-endian consumer coordinates.
//!
//! ```text
//! c <queue>                        queue configuration document
//! e <queue> <wp:8> <seq:4>         one entry slot
//! m <queue> <group:8> <instance:4> one consumer progress marker
//! ```

use crate::entry::{EntryPointer, QueueName};
use crate::error::{QueueError, Result};

const TAG_CONFIG: u8 = b'c';
const TAG_ENTRY: u8 = b'e';
const TAG_MARKER: u8 = b'm';

/// Prefix under which all queue configuration documents live.
pub(crate) const CONFIG_SCAN_PREFIX: [u8; 1] = [TAG_CONFIG];

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn queue_prefix(tag: u8, queue: &QueueName) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 4 + queue.namespace().len() + queue.name().len());
    buf.push(tag);
    push_str(&mut buf, queue.namespace());
    push_str(&mut buf, queue.name());
    buf
}

pub(crate) fn config_key(queue: &QueueName) -> Vec<u8> {
    queue_prefix(TAG_CONFIG, queue)
}

pub(crate) fn entry_prefix(queue: &QueueName) -> Vec<u8> {
    queue_prefix(TAG_ENTRY, queue)
}

pub(crate) fn entry_key(queue: &QueueName, pointer: EntryPointer) -> Vec<u8> {
    let mut buf = queue_prefix(TAG_ENTRY, queue);
    buf.extend_from_slice(&pointer.encode());
    buf
}

pub(crate) fn marker_prefix(queue: &QueueName) -> Vec<u8> {
    queue_prefix(TAG_MARKER, queue)
}

pub(crate) fn marker_key(queue: &QueueName, group_id: u64, instance_id: u32) -> Vec<u8> {
    let mut buf = queue_prefix(TAG_MARKER, queue);
    buf.extend_from_slice(&group_id.to_be_bytes());
    buf.extend_from_slice(&instance_id.to_be_bytes());
    buf
}

/// Recover the pointer from the tail of an entry key.
pub(crate) fn pointer_from_entry_key(key: &[u8], prefix_len: usize) -> Result<EntryPointer> {
    if key.len() < prefix_len {
        return Err(QueueError::Codec("entry key shorter than prefix".into()));
    }
    EntryPointer::decode(&key[prefix_len..])
}

/// Recover the queue name from a configuration key, for store-wide sweeps.
pub(crate) fn queue_from_config_key(key: &[u8]) -> Result<QueueName> {
    let bad = || QueueError::Codec("malformed queue config key".into());
    if key.first() != Some(&TAG_CONFIG) {
        return Err(bad());
    }
    let mut at = 1;
    let mut read_str = |key: &[u8]| -> Result<String> {
        if key.len() < at + 2 {
            return Err(bad());
        }
        let len = u16::from_be_bytes([key[at], key[at + 1]]) as usize;
        at += 2;
        if key.len() < at + len {
            return Err(bad());
        }
        let s = std::str::from_utf8(&key[at..at + len]).map_err(|_| bad())?;
        at += len;
        Ok(s.to_string())
    };
    let namespace = read_str(key)?;
    let name = read_str(key)?;
    Ok(QueueName::new(namespace, name))
}
