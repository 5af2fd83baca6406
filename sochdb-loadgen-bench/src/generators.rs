//! Item generators (deterministic via ChaCha8Rng).
//!
//! Every generator owns its RNG; `split` seeds a child from the parent's
//! stream, so a run's writers draw independent, reproducible sequences.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sochdb_loadgen::{CodecError, Generator};

use crate::epoch_millis;

/// Payload length bounds: lengths are drawn uniformly from `[min, max)`,
/// or are exactly `min` when `max <= min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadBounds {
    pub min: usize,
    pub max: usize,
}

impl PayloadBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    fn sample_len(&self, rng: &mut ChaCha8Rng) -> usize {
        if self.max > self.min {
            rng.gen_range(self.min..self.max)
        } else {
            self.min
        }
    }
}

impl Default for PayloadBounds {
    fn default() -> Self {
        Self { min: 40, max: 120 }
    }
}

/// Printable ASCII string of `len` bytes.
fn printable(rng: &mut ChaCha8Rng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b' '..=b'~') as char).collect()
}

fn child_rng(rng: &mut ChaCha8Rng) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(rng.gen())
}

fn utf8(type_name: &'static str, bytes: &[u8]) -> Result<String, CodecError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Malformed {
        type_name,
        reason: e.to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────────
// Random strings
// ────────────────────────────────────────────────────────────────────────────────

pub struct StringGenerator {
    rng: ChaCha8Rng,
    bounds: PayloadBounds,
}

impl StringGenerator {
    pub fn new(seed: u64, bounds: PayloadBounds) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            bounds,
        }
    }
}

impl Generator for StringGenerator {
    type Item = String;

    fn next_item(&mut self) -> String {
        let len = self.bounds.sample_len(&mut self.rng);
        printable(&mut self.rng, len)
    }

    fn split(&mut self) -> Self {
        Self {
            rng: child_rng(&mut self.rng),
            bounds: self.bounds,
        }
    }

    fn serialize(item: &String) -> Vec<u8> {
        item.as_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Result<String, CodecError> {
        utf8("String", bytes)
    }

    fn generated_type(&self) -> &'static str {
        "String"
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Random big integers
// ────────────────────────────────────────────────────────────────────────────────

pub struct BigIntGenerator {
    rng: ChaCha8Rng,
}

impl BigIntGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Generator for BigIntGenerator {
    type Item = i64;

    fn next_item(&mut self) -> i64 {
        self.rng.gen()
    }

    fn split(&mut self) -> Self {
        Self {
            rng: child_rng(&mut self.rng),
        }
    }

    fn serialize(item: &i64) -> Vec<u8> {
        item.to_be_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Result<i64, CodecError> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| CodecError::Malformed {
            type_name: "BigInt",
            reason: format!("expected 8 bytes, got {}", bytes.len()),
        })?;
        Ok(i64::from_be_bytes(arr))
    }

    fn generated_type(&self) -> &'static str {
        "BigInt"
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Node URNs
// ────────────────────────────────────────────────────────────────────────────────

pub struct NodeUrnGenerator {
    rng: ChaCha8Rng,
}

impl NodeUrnGenerator {
    pub const PREFIX: &'static str = "urn:eval:0x";

    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Generator for NodeUrnGenerator {
    type Item = String;

    fn next_item(&mut self) -> String {
        format!("{}{:x}", Self::PREFIX, self.rng.gen::<u32>())
    }

    fn split(&mut self) -> Self {
        Self {
            rng: child_rng(&mut self.rng),
        }
    }

    fn serialize(item: &String) -> Vec<u8> {
        item.as_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Result<String, CodecError> {
        utf8("NodeUrn", bytes)
    }

    fn generated_type(&self) -> &'static str {
        "NodeUrn"
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Testbed log lines
// ────────────────────────────────────────────────────────────────────────────────

/// `urn:wisebed:uzl1:0x<node>,<timestamp ms>,<event id>,<type>,<payload>`
pub struct LogLineGenerator {
    rng: ChaCha8Rng,
    bounds: PayloadBounds,
}

impl LogLineGenerator {
    pub const NODE_PREFIX: &'static str = "urn:wisebed:uzl1:0x";

    pub fn new(seed: u64, bounds: PayloadBounds) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            bounds,
        }
    }
}

impl Generator for LogLineGenerator {
    type Item = String;

    fn next_item(&mut self) -> String {
        let len = self.bounds.sample_len(&mut self.rng);
        let node: u32 = self.rng.gen();
        let event_id: i64 = self.rng.gen();
        let message_type = self.rng.gen_range(0..99);
        let payload = printable(&mut self.rng, len);
        format!(
            "{}{:x},{},{},{},{}",
            Self::NODE_PREFIX,
            node,
            epoch_millis(),
            event_id,
            message_type,
            payload
        )
    }

    fn split(&mut self) -> Self {
        Self {
            rng: child_rng(&mut self.rng),
            bounds: self.bounds,
        }
    }

    fn serialize(item: &String) -> Vec<u8> {
        item.as_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Result<String, CodecError> {
        utf8("LogLine", bytes)
    }

    fn generated_type(&self) -> &'static str {
        "LogLine"
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Upstream message events
// ────────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    UpstreamMessage,
}

/// Message received from a sensor node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessageEvent {
    pub source_node_urn: String,
    pub timestamp_ms: u64,
    pub message_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub upstream_message: UpstreamMessageEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub event: Event,
}

pub struct MessageGenerator {
    rng: ChaCha8Rng,
    bounds: PayloadBounds,
}

impl MessageGenerator {
    pub fn new(seed: u64, bounds: PayloadBounds) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            bounds,
        }
    }
}

impl Generator for MessageGenerator {
    type Item = Message;

    fn next_item(&mut self) -> Message {
        let len = self.bounds.sample_len(&mut self.rng);
        let payload = printable(&mut self.rng, len);
        let node: u32 = self.rng.gen();
        Message {
            message_type: MessageType::Event,
            event: Event {
                event_id: self.rng.gen(),
                event_type: EventType::UpstreamMessage,
                upstream_message: UpstreamMessageEvent {
                    source_node_urn: format!("{}{:x}", LogLineGenerator::NODE_PREFIX, node),
                    timestamp_ms: epoch_millis(),
                    message_bytes: payload.into_bytes(),
                },
            },
        }
    }

    fn split(&mut self) -> Self {
        Self {
            rng: child_rng(&mut self.rng),
            bounds: self.bounds,
        }
    }

    fn serialize(item: &Message) -> Vec<u8> {
        // Plain data with string keys; encoding cannot fail.
        serde_json::to_vec(item).unwrap_or_default()
    }

    fn deserialize(bytes: &[u8]) -> Result<Message, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed {
            type_name: "Message",
            reason: e.to_string(),
        })
    }

    fn generated_type(&self) -> &'static str {
        "Message"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_lengths_within_bounds() {
        let mut gen = StringGenerator::new(1, PayloadBounds::new(5, 9));
        for _ in 0..200 {
            let s = gen.next_item();
            assert!((5..9).contains(&s.len()), "len {}", s.len());
            assert!(s.bytes().all(|b| (b' '..=b'~').contains(&b)));
        }
    }

    #[test]
    fn test_degenerate_bounds_use_min() {
        let mut gen = StringGenerator::new(1, PayloadBounds::new(7, 7));
        assert_eq!(gen.next_item().len(), 7);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = BigIntGenerator::new(99);
        let mut b = BigIntGenerator::new(99);
        assert_eq!(a.next_item(), b.next_item());

        let mut child_a = a.split();
        let mut child_b = b.split();
        assert_eq!(child_a.next_item(), child_b.next_item());
    }

    #[test]
    fn test_split_children_differ() {
        let mut parent = NodeUrnGenerator::new(5);
        let mut c1 = parent.split();
        let mut c2 = parent.split();
        assert_ne!(c1.next_item(), c2.next_item());
    }

    #[test]
    fn test_node_urn_format() {
        let urn = NodeUrnGenerator::new(3).next_item();
        let hex = urn.strip_prefix("urn:eval:0x").unwrap();
        assert!(u32::from_str_radix(hex, 16).is_ok());
    }

    #[test]
    fn test_log_line_fields() {
        let line = LogLineGenerator::new(4, PayloadBounds::new(10, 11)).next_item();
        let fields: Vec<&str> = line.splitn(5, ',').collect();
        assert_eq!(fields.len(), 5);
        assert!(fields[0].starts_with("urn:wisebed:uzl1:0x"));
        assert!(fields[1].parse::<u64>().is_ok());
        assert!(fields[2].parse::<i64>().is_ok());
        assert!(fields[3].parse::<u32>().unwrap() < 99);
        assert_eq!(fields[4].len(), 10);
    }

    #[test]
    fn test_message_codec_roundtrip() {
        let mut gen = MessageGenerator::new(8, PayloadBounds::default());
        let msg = gen.next_item();
        let codec = gen.codec();
        assert_eq!(codec.decode(&codec.encode(&msg)).unwrap(), msg);
        assert_eq!(codec.type_name(), "Message");
    }

    #[test]
    fn test_bigint_rejects_short_payload() {
        let err = BigIntGenerator::deserialize(&[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("expected 8 bytes, got 3"));
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        assert!(StringGenerator::deserialize(&[0xff, 0xfe]).is_err());
    }
}
