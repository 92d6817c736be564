//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Platform epoch (2020-01-01T00:00:00.000Z)
pub const EPOCH: u64 = 1577836800000;

/// Snowflake ID generator
///
/// Layout: 41 bits of milliseconds since [`EPOCH`], 5 bits machine,
/// 5 bits node, 12 bits sequence.
pub struct SnowflakeGenerator {
    machine_id: u64,
    node_id: u64,
    /// (last timestamp, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self {
            machine_id: machine_id & 0x1F, // 5 bits
            node_id: node_id & 0x1F,       // 5 bits
            state: Mutex::new((0, 0)),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        let mut timestamp = current_timestamp().max(state.0);

        if timestamp == state.0 {
            state.1 = (state.1 + 1) & 0xFFF;
            if state.1 == 0 {
                // Sequence exhausted for this millisecond; borrow the next one.
                timestamp += 1;
            }
        } else {
            state.1 = 0;
        }
        state.0 = timestamp;

        let id = ((timestamp - EPOCH) << 22) | (self.machine_id << 17) | (self.node_id << 12) | state.1;

        id as i64
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(EPOCH)
}

/// Extract timestamp from snowflake ID
pub fn extract_timestamp(snowflake: i64) -> u64 {
    ((snowflake as u64) >> 22) + EPOCH
}

/// Parse snowflake from string
pub fn from_string(s: &str) -> Result<i64, std::num::ParseIntError> {
    s.parse()
}
