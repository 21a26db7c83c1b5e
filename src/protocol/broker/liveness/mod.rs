//! Liveness (auto-ping) engine: periodic ping waves over the
//! registered clients, missed-ping accounting, and the
//! online→offline transition scan.
//!
//! The engine itself never touches the bus; the broker drives it from
//! the poll loop, sends the frames, and reports inbound activity back
//! through [`note_activity`](LivenessEngine::note_activity).
use crate::core::MAX_CLIENT_MAPPINGS;

/// Validated auto-ping configuration, persisted as three scalar keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingConfig {
    pub enabled: bool,
    pub interval_ms: u32,
    pub max_missed: u8,
}

impl PingConfig {
    /// Interval bounds (ms): at least one, under an hour.
    pub const MIN_INTERVAL_MS: u32 = 1;
    pub const MAX_INTERVAL_MS: u32 = 3_600_000;
    /// Missed-ping threshold bounds.
    pub const MIN_MAX_MISSED: u8 = 1;
    pub const MAX_MAX_MISSED: u8 = 254;

    pub const fn valid_interval(interval_ms: u32) -> bool {
        interval_ms >= Self::MIN_INTERVAL_MS && interval_ms < Self::MAX_INTERVAL_MS
    }

    pub const fn valid_max_missed(max_missed: u8) -> bool {
        max_missed >= Self::MIN_MAX_MISSED && max_missed <= Self::MAX_MAX_MISSED
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 5000,
            max_missed: 2,
        }
    }
}

/// Per-client liveness accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingState {
    pub client_id: u8,
    pub last_pong_ms: u64,
    pub missed: u8,
}

/// Ping-wave scheduler plus the per-client state pool.
#[derive(Debug, Default)]
pub struct LivenessEngine {
    config: PingConfig,
    states: heapless::Vec<PingState, MAX_CLIENT_MAPPINGS>,
    last_wave_ms: u64,
}

impl LivenessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> PingConfig {
        self.config
    }

    pub fn set_config(&mut self, config: PingConfig) {
        self.config = config;
    }

    /// Create a state for a client unless one already exists.
    pub fn ensure_state(&mut self, client_id: u8, now_ms: u64) {
        if self.states.iter().any(|state| state.client_id == client_id) {
            return;
        }
        let _ = self.states.push(PingState {
            client_id,
            last_pong_ms: now_ms,
            missed: 0,
        });
    }

    /// Any inbound frame from a client proves it alive.
    pub fn note_activity(&mut self, client_id: u8, now_ms: u64) {
        self.ensure_state(client_id, now_ms);
        if let Some(state) = self
            .states
            .iter_mut()
            .find(|state| state.client_id == client_id)
        {
            state.last_pong_ms = now_ms;
            state.missed = 0;
        }
    }

    /// Whether a ping wave is due. Always false while disabled.
    pub fn wave_due(&self, now_ms: u64) -> bool {
        self.config.enabled
            && now_ms.saturating_sub(self.last_wave_ms) >= u64::from(self.config.interval_ms)
    }

    /// Record that a wave starts now.
    pub fn begin_wave(&mut self, now_ms: u64) {
        self.last_wave_ms = now_ms;
    }

    /// Account one broadcast ping against a client.
    pub fn mark_pinged(&mut self, client_id: u8) {
        if let Some(state) = self
            .states
            .iter_mut()
            .find(|state| state.client_id == client_id)
        {
            state.missed = state.missed.saturating_add(1);
        }
    }

    /// Clients past the missed-ping threshold. `missed` stays as-is
    /// until the client shows activity again.
    pub fn timed_out(&self) -> impl Iterator<Item = u8> + '_ {
        self.states
            .iter()
            .filter(|state| state.missed >= self.config.max_missed)
            .map(|state| state.client_id)
    }

    pub fn state_of(&self, client_id: u8) -> Option<&PingState> {
        self.states.iter().find(|state| state.client_id == client_id)
    }

    pub fn clear_states(&mut self) {
        self.states.clear();
    }
}
