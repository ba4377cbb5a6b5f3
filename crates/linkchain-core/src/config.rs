use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::constants::{DEFAULT_LOCK_TIMEOUT_MS, GENESIS_PAYLOAD};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Payload sealed into the genesis block of a new chain.
    pub genesis_payload: Value,
    /// Longest `propose` waits for the chain lock before giving up.
    #[serde(with = "millis")]
    pub lock_timeout: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_payload: Value::from(GENESIS_PAYLOAD),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl ChainConfig {
    pub fn with_genesis_payload(mut self, payload: Value) -> Self {
        self.genesis_payload = payload;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.genesis_payload, json!("Genesis Block"));
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ChainConfig = serde_json::from_str(r#"{"lock_timeout": 250}"#).unwrap();
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.genesis_payload, json!("Genesis Block"));

        let round = serde_json::to_value(&config).unwrap();
        assert_eq!(round["lock_timeout"], json!(250));
    }
}
