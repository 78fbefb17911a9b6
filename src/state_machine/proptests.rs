//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::protocol::StreamEvent;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_skip_policy() -> impl Strategy<Value = SkipPolicy> {
    prop_oneof![
        Just(SkipPolicy::SkipCount),
        Just(SkipPolicy::Always),
        Just(SkipPolicy::Never),
    ]
}

fn arb_content_frame() -> impl Strategy<Value = StreamEvent> {
    (
        proptest::option::of("[a-zA-Z ]{0,12}"),
        proptest::option::of("[a-z]{0,6}\\.pdf"),
        proptest::option::of(any::<bool>()),
        proptest::option::of("s[0-9]{1,2}"),
    )
        .prop_map(|(content, sources, done, session_id)| StreamEvent {
            content,
            sources,
            done,
            session_id,
            ..StreamEvent::default()
        })
}

fn arb_gate_frame() -> impl Strategy<Value = StreamEvent> {
    (
        proptest::option::of("[a-zA-Z ]{0,20}"),
        proptest::option::of(any::<bool>()),
        proptest::option::of(0u32..3),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(message, skip_allowed, skip_count, done)| StreamEvent {
            require_email: Some(true),
            message,
            skip_allowed,
            skip_count,
            done,
            ..StreamEvent::default()
        })
}

fn arb_error_frame() -> impl Strategy<Value = StreamEvent> {
    "[a-z ]{1,16}".prop_map(|error| StreamEvent {
        error: Some(error),
        done: Some(true),
        ..StreamEvent::default()
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => "[a-z ?]{0,16}".prop_map(Event::user_query),
        6 => arb_content_frame().prop_map(Event::StreamFrame),
        2 => arb_gate_frame().prop_map(Event::StreamFrame),
        1 => arb_error_frame().prop_map(Event::StreamFrame),
        1 => Just(Event::StreamEnded),
        1 => "[a-z ]{1,12}".prop_map(|message| Event::StreamFailed { message }),
        2 => proptest::option::of("[a-z]{1,6}@[a-z]{1,6}\\.com")
            .prop_map(|email| Event::GateResolved { email }),
        1 => "[a-zA-Z .]{1,20}".prop_map(|message| Event::GateRejected { message }),
        1 => "session_[a-f0-9]{8}".prop_map(|session_id| Event::Reset { session_id }),
    ]
}

// ============================================================================
// Invariants
// ============================================================================

fn check_invariants(state: &ChatState) -> Result<(), TestCaseError> {
    let streaming: Vec<_> = state.streaming_messages().collect();
    prop_assert!(streaming.len() <= 1, "more than one streaming message");

    match &state.phase {
        ChatPhase::Idle => {
            prop_assert!(streaming.is_empty());
            prop_assert!(state.messages.values().all(|m| m.kind == MessageKind::Normal));
        }
        ChatPhase::Streaming { bot_id, .. } => {
            prop_assert_eq!(streaming.len(), 1);
            prop_assert_eq!(streaming[0].id, *bot_id);
            prop_assert_eq!(streaming[0].role, Role::Bot);
        }
        ChatPhase::GateOpen { gate, pending } => {
            prop_assert!(streaming.is_empty());
            prop_assert!(pending.is_some());
            let gate_messages: Vec<_> = state
                .messages
                .values()
                .filter(|m| m.kind == MessageKind::Gate)
                .collect();
            prop_assert_eq!(gate_messages.len(), 1);
            prop_assert_eq!(gate_messages[0].id, gate.message_id);
        }
    }

    for (id, message) in &state.messages {
        prop_assert_eq!(*id, message.id);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_invariants_hold_over_any_sequence(
        policy in arb_skip_policy(),
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let context = ChatContext::new(policy);
        let mut state = ChatState::new("session_start");

        for event in events {
            let was_streaming = state.phase.is_streaming();
            let had_gate = state.phase.gate().is_some();
            let kind = event.name();

            match transition(&state, &context, event) {
                Ok(result) => state = result.new_state,
                Err(TransitionError::Busy) => prop_assert!(was_streaming && kind == "user_query"),
                Err(TransitionError::NoGateOpen) => prop_assert!(!had_gate),
            }
            check_invariants(&state)?;
        }
    }

    #[test]
    fn prop_user_messages_only_grow_until_reset(
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let context = ChatContext::default();
        let mut state = ChatState::new("session_start");
        let mut users = 0;

        for event in events {
            let is_reset = matches!(event, Event::Reset { .. });
            if let Ok(result) = transition(&state, &context, event) {
                state = result.new_state;
            }
            let now = state.user_messages().count();
            if is_reset {
                prop_assert_eq!(now, 0);
            } else {
                prop_assert!(now >= users);
            }
            users = now;
        }
    }

    #[test]
    fn prop_every_open_stream_uses_current_session(
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let context = ChatContext::default();
        let mut state = ChatState::new("session_start");

        for event in events {
            if let Ok(result) = transition(&state, &context, event) {
                for effect in &result.effects {
                    if let Effect::OpenStream { request } = effect {
                        prop_assert_eq!(&request.session_id, &result.new_state.session_id);
                    }
                }
                state = result.new_state;
            }
        }
    }

    #[test]
    fn prop_finalized_answers_never_resume(
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let context = ChatContext::default();
        let mut state = ChatState::new("session_start");
        let mut finalized = std::collections::HashSet::new();

        for event in events {
            if let Ok(result) = transition(&state, &context, event) {
                state = result.new_state;
            }
            for message in state.bot_messages() {
                if message.streaming {
                    prop_assert!(!finalized.contains(&message.id));
                } else {
                    finalized.insert(message.id);
                }
            }
        }
    }
}
