//! Modelo del checkpoint.
//!
//! `Checkpoint` envuelve el `flow_id` y un `Option<CheckpointRecord>`: un
//! checkpoint que "no existe" es un resultado de consulta válido y distinto
//! de uno vacío. Toda mutación pasa por `record_mut`, que exige existencia y
//! devuelve `FlowFatalError::CheckpointRequired` en caso contrario.
//!
//! El fiber (bytes opacos de la computación suspendida) pertenece en
//! exclusiva a este registro y nunca se interpreta aquí.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::WaitingFor;
use crate::errors::FlowFatalError;
use crate::external::{ExternalChannel, ExternalEventState};
use crate::hashing::hash_value;
use crate::identity::{FlowId, HoldingIdentity};
use crate::session::SessionState;

/// Quién pidió arrancar el flujo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InitiatorKind {
    /// Cliente local (RPC/REST) con su id de petición.
    LocalClient { client_request_id: String },
    /// Par remoto, a través de la sesión que envió el `SessionInit`.
    RemotePeer { session_id: String },
}

/// Metadatos inmutables capturados al crear el flujo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartContext {
    /// Identidad que solicitó el flujo (el par iniciador si es remoto).
    pub requesting_identity: HoldingIdentity,
    /// Nodo virtual que ejecuta el flujo.
    pub holding_identity: HoldingIdentity,
    pub initiator: InitiatorKind,
    pub cpi_id: String,
    pub flow_class_name: String,
    pub start_args: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub suspend_count: u32,
    pub is_killed: bool,
    pub waiting_for: WaitingFor,
    /// Nombre del punto de suspensión (diagnóstico).
    pub suspended_on: Option<String>,
    pub fiber: Vec<u8>,
}

/// Marco de sub-flujo anidado. El marco iniciador más cercano da nombre al
/// `SessionInit` de cada sesión nueva.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStackItem {
    pub flow_name: String,
    pub is_initiating_flow: bool,
    pub session_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub flow_state: FlowState,
    pub start_context: StartContext,
    pub sessions: IndexMap<String, SessionState>,
    pub external_event_state: Option<ExternalEventState>,
    pub crypto_state: Option<ExternalEventState>,
    pub persistence_state: Option<ExternalEventState>,
    pub flow_stack_items: Vec<FlowStackItem>,
    pub last_event_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Slot de correlación de `channel`.
    pub fn external_slot(&self, channel: ExternalChannel) -> Option<&ExternalEventState> {
        match channel {
            ExternalChannel::External => self.external_event_state.as_ref(),
            ExternalChannel::Crypto => self.crypto_state.as_ref(),
            ExternalChannel::Persistence => self.persistence_state.as_ref(),
        }
    }

    pub fn external_slot_mut(&mut self, channel: ExternalChannel) -> &mut Option<ExternalEventState> {
        match channel {
            ExternalChannel::External => &mut self.external_event_state,
            ExternalChannel::Crypto => &mut self.crypto_state,
            ExternalChannel::Persistence => &mut self.persistence_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    flow_id: FlowId,
    record: Option<CheckpointRecord>,
}

impl Checkpoint {
    pub fn new(flow_id: FlowId, record: Option<CheckpointRecord>) -> Self {
        Self { flow_id, record }
    }

    /// Checkpoint inexistente para `flow_id`.
    pub fn absent(flow_id: FlowId) -> Self {
        Self { flow_id, record: None }
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn exists(&self) -> bool {
        self.record.is_some()
    }

    pub fn record(&self) -> Option<&CheckpointRecord> {
        self.record.as_ref()
    }

    pub fn into_record(self) -> Option<CheckpointRecord> {
        self.record
    }

    /// Acceso de lectura exigiendo existencia.
    pub fn require(&self, context: &str) -> Result<&CheckpointRecord, FlowFatalError> {
        let flow_id = self.flow_id;
        self.record.as_ref().ok_or_else(|| FlowFatalError::CheckpointRequired { flow_id,
                                                                                context: context.to_string() })
    }

    /// Acceso mutable exigiendo existencia. Único camino de mutación.
    pub fn record_mut(&mut self, context: &str) -> Result<&mut CheckpointRecord, FlowFatalError> {
        let flow_id = self.flow_id;
        self.record.as_mut().ok_or_else(|| FlowFatalError::CheckpointRequired { flow_id,
                                                                                context: context.to_string() })
    }

    /// Crea el registro. Falla si ya existe: un checkpoint se crea una vez.
    pub fn init_flow_state(&mut self,
                           start_context: StartContext,
                           waiting_for: WaitingFor,
                           now: DateTime<Utc>)
                           -> Result<(), FlowFatalError> {
        if self.record.is_some() {
            return Err(FlowFatalError::Internal(format!("checkpoint for flow {} already initialised", self.flow_id)));
        }
        self.record = Some(CheckpointRecord { flow_state: FlowState { suspend_count: 0,
                                                                      is_killed: false,
                                                                      waiting_for,
                                                                      suspended_on: None,
                                                                      fiber: Vec::new() },
                                              start_context,
                                              sessions: IndexMap::new(),
                                              external_event_state: None,
                                              crypto_state: None,
                                              persistence_state: None,
                                              flow_stack_items: Vec::new(),
                                              last_event_at: now });
        Ok(())
    }

    /// Borra el registro (terminación del flujo, decidida por la etapa de fiber).
    pub fn mark_deleted(&mut self) {
        self.record = None;
    }

    pub fn waiting_for(&self) -> Option<&WaitingFor> {
        self.record.as_ref().map(|r| &r.flow_state.waiting_for)
    }

    pub fn set_waiting_for(&mut self, waiting_for: WaitingFor) -> Result<(), FlowFatalError> {
        self.record_mut("set_waiting_for")?.flow_state.waiting_for = waiting_for;
        Ok(())
    }

    pub fn is_killed(&self) -> bool {
        self.record.as_ref().map(|r| r.flow_state.is_killed).unwrap_or(false)
    }

    pub fn mark_killed(&mut self) -> Result<(), FlowFatalError> {
        self.record_mut("mark_killed")?.flow_state.is_killed = true;
        Ok(())
    }

    pub fn suspend_count(&self) -> Option<u32> {
        self.record.as_ref().map(|r| r.flow_state.suspend_count)
    }

    /// Registra una suspensión: nuevo fiber, nuevo `waiting_for`,
    /// `suspend_count + 1`.
    pub fn suspend(&mut self,
                   waiting_for: WaitingFor,
                   suspended_on: impl Into<String>,
                   fiber: Vec<u8>)
                   -> Result<(), FlowFatalError> {
        let state = &mut self.record_mut("suspend")?.flow_state;
        state.suspend_count += 1;
        state.waiting_for = waiting_for;
        state.suspended_on = Some(suspended_on.into());
        state.fiber = fiber;
        Ok(())
    }

    pub fn get_session_state(&self, session_id: &str) -> Option<&SessionState> {
        self.record.as_ref().and_then(|r| r.sessions.get(session_id))
    }

    /// addOrReplace: inserta si no existe, reemplaza entero si existe.
    pub fn put_session_state(&mut self, state: SessionState) -> Result<(), FlowFatalError> {
        let record = self.record_mut("put_session_state")?;
        record.sessions.insert(state.session_id.clone(), state);
        Ok(())
    }

    pub fn external_state(&self, channel: ExternalChannel) -> Option<&ExternalEventState> {
        self.record.as_ref().and_then(|r| r.external_slot(channel))
    }

    pub fn set_external_state(&mut self,
                              channel: ExternalChannel,
                              state: Option<ExternalEventState>)
                              -> Result<(), FlowFatalError> {
        *self.record_mut("set_external_state")?.external_slot_mut(channel) = state;
        Ok(())
    }

    pub fn push_flow_stack_item(&mut self, item: FlowStackItem) -> Result<(), FlowFatalError> {
        self.record_mut("push_flow_stack_item")?.flow_stack_items.push(item);
        Ok(())
    }

    pub fn pop_flow_stack_item(&mut self) -> Result<Option<FlowStackItem>, FlowFatalError> {
        Ok(self.record_mut("pop_flow_stack_item")?.flow_stack_items.pop())
    }

    /// Marco iniciador más cercano a la cima de la pila.
    pub fn nearest_initiating_flow(&self) -> Option<&FlowStackItem> {
        self.record
            .as_ref()
            .and_then(|r| r.flow_stack_items.iter().rev().find(|item| item.is_initiating_flow))
    }

    pub fn touch(&mut self, now: DateTime<Utc>) -> Result<(), FlowFatalError> {
        self.record_mut("touch")?.last_event_at = now;
        Ok(())
    }

    /// Hash canónico del registro (o de su ausencia).
    pub fn fingerprint(&self) -> Result<String, FlowFatalError> {
        let value = serde_json::to_value(&self.record).map_err(|e| {
                                                          FlowFatalError::Internal(format!("checkpoint serialization: {e}"))
                                                      })?;
        Ok(hash_value(&value))
    }
}
