//! Wire protocol spoken by the metering simulator
//!
//! One TCP connection carries exactly one message, read with a single
//! `read()` of at most [`READ_BUFFER_SIZE`] bytes. There is no framing
//! beyond that: a message split across reads is truncated.
//!
//! | Request                | Response                          |
//! |------------------------|-----------------------------------|
//! | `Need object count`    | number of servers, decimal ASCII  |
//! | `Entitet_<id>:<value>` | none, the value is applied        |
//! | anything else          | none, silently dropped            |

use crate::entity::EntityId;

/// Port the simulator connects to
pub const DEFAULT_PORT: u16 = 25675;

/// Maximum bytes read per connection
pub const READ_BUFFER_SIZE: usize = 1024;

/// Exact text of the entity-count query
pub const COUNT_QUERY: &str = "Need object count";

/// Token preceding the server id in a value update
pub const UPDATE_PREFIX: &str = "Entitet_";

/// A decoded request
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Ask for the number of registered servers
    CountQuery,

    /// Report a new value for a server
    Update { entity_id: EntityId, value: f64 },

    /// Anything that is not a valid request
    Unrecognized,
}

/// Decode raw bytes as ASCII; bytes outside the ASCII range become `?`.
pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

/// Classify a decoded message.
pub fn parse(text: &str) -> Message {
    if text == COUNT_QUERY {
        return Message::CountQuery;
    }

    parse_update(text).unwrap_or(Message::Unrecognized)
}

fn parse_update(text: &str) -> Option<Message> {
    let (entity_part, value_part) = text.split_once(':')?;
    let id_part = entity_part.strip_prefix(UPDATE_PREFIX)?;

    let entity_id = id_part.trim_ascii().parse::<EntityId>().ok()?;
    let value = value_part.trim_ascii().parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(Message::Update { entity_id, value })
}

/// Response body for a count query
pub fn encode_count(count: usize) -> Vec<u8> {
    count.to_string().into_bytes()
}
