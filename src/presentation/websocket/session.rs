//! WebSocket Session Management

use std::time::{Duration, Instant};

/// Per-socket state owned by the connection task.
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub user_id: Option<i64>,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            user_id: None,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }
}
