use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::OrderSide;

/// Deterministic request id (BLAKE3 over the canonical request content).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// Hash arbitrary canonical bytes into a request id.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Hash any serializable value through its JSON form.
    ///
    /// Struct fields serialize in declaration order and maps used in requests
    /// are `BTreeMap`s, so the JSON is canonical.
    pub fn from_canonical<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(value)?;
        Ok(Self::from_bytes(json.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Idempotency key sent with every venue submission.
///
/// Identical across retries of the same order so the venue can dedupe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(pub String);

impl ClientOrderId {
    pub fn derive(request: &RequestId, symbol: &str, side: OrderSide, sequence: usize) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(request.as_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(side.to_string().as_bytes());
        hasher.update(&(sequence as u64).to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!("rb-{}", &hex[..24]))
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
