//! # Protocol Configuration & Constants
//!
//! Every tunable of the commit protocol lives here. Per-instance settings
//! are grouped in [`FlowConfig`], which is handed to each protocol instance
//! through the [`ServiceHub`](crate::flow::ServiceHub).

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Wire and checkpoint format version.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Domain tag mixed into the canonical transaction encoding. Changing it
/// changes every transaction id, so treat it as part of the wire format.
pub const TX_ID_DOMAIN: &[u8] = b"accord/tx/v1";

// ---------------------------------------------------------------------------
// Flow Timing
// ---------------------------------------------------------------------------

/// How long an instance waits on any single session receive before the
/// counterparty is declared timed out.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Total notarisation attempts (first try included) when the notary is
/// unreachable.
pub const DEFAULT_NOTARY_MAX_ATTEMPTS: u32 = 3;

/// Pause between notarisation attempts.
pub const DEFAULT_NOTARY_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Buffer size of each direction of an in-memory session. A flow exchanges
/// at most three messages per session, so this never fills in practice.
pub const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Buffer size of a party's inbound-session queue.
pub const INBOX_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// FlowConfig
// ---------------------------------------------------------------------------

/// Settings shared by proposer and responder instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Per-receive timeout on every session.
    #[serde(with = "duration_ms", rename = "session_timeout_ms")]
    pub session_timeout: Duration,
    /// Upper bound on notarisation attempts while the notary is unavailable.
    pub notary_max_attempts: u32,
    /// Delay between notarisation attempts.
    #[serde(with = "duration_ms", rename = "notary_retry_backoff_ms")]
    pub notary_retry_backoff: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            notary_max_attempts: DEFAULT_NOTARY_MAX_ATTEMPTS,
            notary_retry_backoff: DEFAULT_NOTARY_RETRY_BACKOFF,
        }
    }
}

impl FlowConfig {
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Zero is clamped to one: the first attempt always happens.
    pub fn with_notary_attempts(mut self, attempts: u32) -> Self {
        self.notary_max_attempts = attempts.max(1);
        self
    }

    pub fn with_notary_backoff(mut self, backoff: Duration) -> Self {
        self.notary_retry_backoff = backoff;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
