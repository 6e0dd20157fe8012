mod support;

use chrono::Duration;
use flow_core::checkpoint::{CheckpointStore, InitiatorKind};
use flow_core::event::SessionPayload;
use flow_core::session::{SessionManager, SessionStatus};
use flow_core::{FlowContinuation, FlowEvent, FlowEventError, FlowFatalError, OutputRecord, PipelineOutcome,
                WaitingFor};
use support::*;
use uuid::Uuid;

fn acks(outcome: &PipelineOutcome) -> Vec<u64> {
    outcome.output_records()
           .iter()
           .filter_map(|r| match r {
               OutputRecord::SessionMessage { event, .. } => match event.payload {
                   SessionPayload::Ack { received_sequence_num } => Some(received_sequence_num),
                   _ => None,
               },
               _ => None,
           })
           .collect()
}

#[test]
fn session_init_creates_checkpoint_for_counterparty() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();

    let outcome = h.deliver(session_init(flow_id)).expect("processed");

    let PipelineOutcome::Processed { context, continuation } = &outcome else {
        panic!("expected processed");
    };
    assert_eq!(*continuation, FlowContinuation::Run);
    let record = context.checkpoint.record().expect("checkpoint created");
    assert_eq!(record.flow_state.waiting_for,
               WaitingFor::SessionInit { session_id: SESSION.into() });
    assert_eq!(record.start_context.flow_class_name, "PingResponder");
    assert_eq!(record.start_context.requesting_identity, alice());
    assert_eq!(record.start_context.holding_identity, bob());
    assert_eq!(record.start_context.initiator,
               InitiatorKind::RemotePeer { session_id: SESSION.into() });
    assert_eq!(record.sessions.len(), 1);
    let session = &record.sessions[SESSION];
    assert_eq!(session.received.last_processed_sequence_num, Some(0));
    assert_eq!(session.status, SessionStatus::Confirmed);
    assert_eq!(session.counterparty, alice());
    assert!(SessionManager::new(8).next_received_event(session).is_some_and(|e| e.is_init()));
    assert_eq!(acks(&outcome), vec![0]);
    assert_eq!(h.observer.snapshot().checkpoints_created, 1);
}

#[test]
fn redelivered_session_init_is_fatal_and_keeps_checkpoint() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(session_init(flow_id)).expect("first delivery");
    let before = h.store.load(flow_id);

    let err = h.deliver(session_init(flow_id)).unwrap_err();

    assert!(matches!(err, FlowFatalError::DuplicateSessionInit { .. }));
    assert_eq!(h.store.load(flow_id), before);
}

#[test]
fn session_init_without_mapping_is_fatal() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    let mut event = session_init(flow_id);
    if let flow_core::FlowEventPayload::SessionEvent(ref mut e) = event.payload {
        if let SessionPayload::Init(ref mut init) = e.payload {
            init.flow_name = "Unknown".into();
        }
    }

    let err = h.deliver(event).unwrap_err();

    assert!(matches!(err, FlowFatalError::InitiatedFlowNotFound { ref initiating_flow, .. } if initiating_flow == "Unknown"));
    assert!(!h.store.load(flow_id).exists());
}

#[test]
fn data_for_unknown_flow_is_discarded() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();

    let outcome = h.deliver(session_data(flow_id, 0)).expect("not fatal");

    match outcome {
        PipelineOutcome::Discarded { checkpoint, error } => {
            assert!(!checkpoint.exists());
            assert!(matches!(error, FlowEventError::CheckpointMissing { .. }));
        }
        other => panic!("expected discard, got {other:?}"),
    }
}

#[test]
fn duplicate_session_message_leaves_state_unchanged() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(session_init(flow_id)).expect("init");
    for seq in 1..=3 {
        h.deliver(session_data(flow_id, seq)).expect("data");
    }
    let before = h.store.load(flow_id).get_session_state(SESSION).cloned().expect("session");
    assert_eq!(before.received.last_processed_sequence_num, Some(3));

    let outcome = h.deliver(session_data(flow_id, 3)).expect("duplicate");

    let after = outcome.checkpoint().get_session_state(SESSION).cloned().expect("session");
    assert_eq!(after, before);
    assert_eq!(after.received.undelivered.len(), 4);
    assert_eq!(acks(&outcome), vec![3]);
}

#[test]
fn replaying_any_processed_message_is_idempotent() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(session_init(flow_id)).expect("init");
    for seq in 1..=4 {
        h.deliver(session_data(flow_id, seq)).expect("data");
    }
    let before = h.store.load(flow_id).get_session_state(SESSION).cloned().expect("session");

    for seq in 1..=4 {
        h.deliver(session_data(flow_id, seq)).expect("replay");
        let now = h.store.load(flow_id).get_session_state(SESSION).cloned().expect("session");
        assert_eq!(now, before, "replay of {seq} changed the session");
    }
}

#[test]
fn out_of_order_messages_wait_for_the_gap() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(session_init(flow_id)).expect("init");
    let mut cp = h.store.load(flow_id);
    cp.set_waiting_for(WaitingFor::SessionData { session_ids: vec![SESSION.into()] })
      .expect("waiting");
    // la lógica del flujo ya consumió el init
    let state = cp.get_session_state(SESSION).cloned().expect("session");
    cp.put_session_state(SessionManager::new(8).acknowledge_received_event(state, 0))
      .expect("put");
    h.store.commit(cp);

    let ahead = h.deliver(session_data(flow_id, 2)).expect("buffered");
    let PipelineOutcome::Processed { continuation, .. } = &ahead else {
        panic!("expected processed");
    };
    assert_eq!(*continuation, FlowContinuation::Continue);
    assert_eq!(acks(&ahead), vec![2]);

    let gap = h.deliver(session_data(flow_id, 1)).expect("gap filled");
    let PipelineOutcome::Processed { continuation, context } = &gap else {
        panic!("expected processed");
    };
    assert_eq!(*continuation, FlowContinuation::Run);
    let session = context.checkpoint.get_session_state(SESSION).expect("session");
    let seqs: Vec<_> = session.received.undelivered.iter().map(|e| e.sequence_num).collect();
    assert_eq!(seqs, vec![Some(1), Some(2)]);
    assert!(session.received.out_of_order.is_empty());
}

#[test]
fn message_after_close_is_discarded() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(session_init(flow_id)).expect("init");
    let mut cp = h.store.load(flow_id);
    let mut state = cp.get_session_state(SESSION).cloned().expect("session");
    state.status = SessionStatus::Closed;
    cp.put_session_state(state).expect("put");
    h.store.commit(cp);
    let before = h.store.load(flow_id);

    let outcome = h.deliver(session_data(flow_id, 1)).expect("not fatal");

    match outcome {
        PipelineOutcome::Discarded { error, .. } => {
            assert!(matches!(error, FlowEventError::SessionTerminated { sequence_num: 1, .. }))
        }
        other => panic!("expected discard, got {other:?}"),
    }
    assert_eq!(h.store.load(flow_id), before);
}

#[test]
fn ack_from_counterparty_prunes_pending_sends() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(start_flow(flow_id)).expect("start");
    let mut cp = h.store.load(flow_id);
    let record = SessionManager::new(8).initiate_session(&mut cp, "S2", bob(), None, h.now())
                                       .expect("initiate");
    assert!(matches!(record, OutputRecord::SessionMessage { ref destination, .. } if destination == &bob()));
    h.store.commit(cp);

    let ack = flow_core::event::SessionEvent { session_id: "S2".into(),
                                               source: bob(),
                                               destination: alice(),
                                               sequence_num: None,
                                               timestamp: t0(),
                                               payload: SessionPayload::Ack { received_sequence_num: 0 } };
    let outcome = h.deliver(FlowEvent::new(flow_id, ack)).expect("ack");

    let session = outcome.checkpoint().get_session_state("S2").expect("session");
    assert!(session.sent.unacknowledged.is_empty());
    assert!(acks(&outcome).is_empty());
}

#[test]
fn unacknowledged_send_is_resent_after_window() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(start_flow(flow_id)).expect("start");
    let mut cp = h.store.load(flow_id);
    SessionManager::new(8).initiate_session(&mut cp, "S2", bob(), None, h.now())
                          .expect("initiate");
    h.store.commit(cp);

    let early = h.deliver(wakeup(flow_id)).expect("early");
    assert!(early.output_records().is_empty());

    h.clock.advance(Duration::milliseconds(test_config().session_resend_window_ms));
    let late = h.deliver(wakeup(flow_id)).expect("late");
    let resent: Vec<_> = late.output_records()
                             .iter()
                             .filter_map(|r| match r {
                                 OutputRecord::SessionMessage { destination, event } if destination == &bob() => {
                                     Some(event.payload.kind_name())
                                 }
                                 _ => None,
                             })
                             .collect();
    assert_eq!(resent, vec!["Init"]);
}

#[test]
fn initiating_an_existing_session_is_rejected() {
    let mut h = Harness::new();
    let flow_id = Uuid::new_v4();
    h.deliver(start_flow(flow_id)).expect("start");
    let mut cp = h.store.load(flow_id);
    let manager = SessionManager::new(8);
    manager.initiate_session(&mut cp, "S2", bob(), None, h.now()).expect("initiate");
    let before = cp.clone();

    let err = manager.initiate_session(&mut cp, "S2", bob(), None, h.now()).unwrap_err();

    assert!(matches!(err, FlowFatalError::SessionAlreadyExists { ref session_id, .. } if session_id == "S2"));
    assert_eq!(cp, before);
}
