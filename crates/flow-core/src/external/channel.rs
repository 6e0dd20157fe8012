use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::PIPELINE_VERSION;
use crate::event::{CryptoResponse, ExternalEventResponse, PersistenceResponse, ResponsePayload};
use crate::hashing::hash_value;
use crate::identity::FlowId;

/// Subsistema destino de una petición externa; selecciona el slot del
/// checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalChannel {
    #[default]
    External,
    Crypto,
    Persistence,
}

impl ExternalChannel {
    pub const ALL: [ExternalChannel; 3] = [ExternalChannel::External, ExternalChannel::Crypto, ExternalChannel::Persistence];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalChannel::External => "external",
            ExternalChannel::Crypto => "crypto",
            ExternalChannel::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ExternalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Respuesta correlacionable por `request_id`.
pub trait CorrelatedResponse {
    fn request_id(&self) -> &str;
    fn response_payload(&self) -> &ResponsePayload;
}

impl CorrelatedResponse for ExternalEventResponse {
    fn request_id(&self) -> &str {
        &self.request_id
    }
    fn response_payload(&self) -> &ResponsePayload {
        &self.payload
    }
}

impl CorrelatedResponse for CryptoResponse {
    fn request_id(&self) -> &str {
        &self.request_id
    }
    fn response_payload(&self) -> &ResponsePayload {
        &self.result
    }
}

impl CorrelatedResponse for PersistenceResponse {
    fn request_id(&self) -> &str {
        &self.request_id
    }
    fn response_payload(&self) -> &ResponsePayload {
        &self.result
    }
}

/// `request_id` determinista: el replay de la misma suspensión vuelve a
/// derivar el mismo id, y una respuesta a una suspensión anterior no
/// coincide.
pub fn derive_request_id(flow_id: FlowId, suspend_count: u32, channel: ExternalChannel) -> String {
    let digest = hash_value(&json!({
        "pipeline_version": PIPELINE_VERSION,
        "flow_id": flow_id.to_string(),
        "suspend_count": suspend_count,
        "channel": channel.as_str(),
    }));
    format!("{flow_id}-{suspend_count}-{}", &digest[..16])
}
