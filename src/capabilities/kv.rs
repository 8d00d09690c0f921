//! Minimal key-value blob cache capability. One JSON blob per key; the shell
//! decides where bytes actually live (UserDefaults, SharedPreferences, ...).

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 256;
pub const MAX_VALUE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("value is {size} bytes, maximum is {max}")]
    ValueTooLarge { size: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum KvOperation {
    Get { key: String },
    Set { key: String, value: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum KvOutput {
    Value(Option<Vec<u8>>),
    Written(bool),
}

impl Operation for KvOperation {
    type Output = KvOutput;
}

pub struct Kv<Ev> {
    context: CapabilityContext<KvOperation, Ev>,
}

impl<Ev> Capability<Ev> for Kv<Ev> {
    type Operation = KvOperation;
    type MappedSelf<MappedEv> = Kv<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Kv::new(self.context.map_event(f))
    }
}

impl<Ev> Kv<Ev>
where
    Ev: 'static,
{
    #[must_use]
    pub fn new(context: CapabilityContext<KvOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn get<F>(&self, key: &str, make_event: F) -> Result<(), KvError>
    where
        F: FnOnce(KvOutput) -> Ev + Send + 'static,
        Ev: Send,
    {
        validate_key(key)?;
        let operation = KvOperation::Get { key: key.to_string() };
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context.request_from_shell(operation).await;
            context.update_app(make_event(output));
        });
        Ok(())
    }

    pub fn set<F>(&self, key: &str, value: Vec<u8>, make_event: F) -> Result<(), KvError>
    where
        F: FnOnce(KvOutput) -> Ev + Send + 'static,
        Ev: Send,
    {
        validate_key(key)?;
        if value.len() > MAX_VALUE_BYTES {
            return Err(KvError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_BYTES,
            });
        }
        let operation = KvOperation::Set {
            key: key.to_string(),
            value,
        };
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context.request_from_shell(operation).await;
            context.update_app(make_event(output));
        });
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), KvError> {
    if key.trim().is_empty() {
        return Err(KvError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty".to_string(),
        });
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(KvError::InvalidKey {
            key: key.chars().take(50).collect(),
            reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
        });
    }
    if key.chars().any(|c| c.is_control() || c == '\0') {
        return Err(KvError::InvalidKey {
            key: key.replace(char::is_control, "?"),
            reason: "key contains control characters".to_string(),
        });
    }
    Ok(())
}
