use proptest::prelude::*;
use rworkclock::core::machine::{Policy, SessionMachine};
use rworkclock::models::{
    CloseReason, EventKind, IdleTransition, QueuedEvent, Session, SessionEvent, SystemEvent,
    UserCommand,
};

mod common;
use common::t;

fn any_event() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        3 => Just(SessionEvent::User(UserCommand::ClockIn)),
        2 => Just(SessionEvent::User(UserCommand::ClockOut)),
        2 => Just(SessionEvent::User(UserCommand::BreakStart)),
        2 => Just(SessionEvent::User(UserCommand::BreakEnd)),
        2 => Just(SessionEvent::Idle(IdleTransition::Idle)),
        2 => Just(SessionEvent::Idle(IdleTransition::ActivityResumed)),
        1 => Just(SessionEvent::System(SystemEvent::Sleep)),
        1 => Just(SessionEvent::System(SystemEvent::Resume)),
        1 => Just(SessionEvent::System(SystemEvent::Lock)),
        1 => Just(SessionEvent::System(SystemEvent::Unlock)),
        1 => Just(SessionEvent::System(SystemEvent::ShutdownRequested)),
    ]
}

/// Events with non-decreasing offsets, plus an occasional step back in time.
fn timeline() -> impl Strategy<Value = Vec<(i64, SessionEvent)>> {
    prop::collection::vec((-30i64..600, any_event()), 1..60).prop_map(|steps| {
        let mut at = 0;
        steps
            .into_iter()
            .map(|(delta, ev)| {
                at += delta.max(0);
                // Negative deltas produce late events.
                (at + delta.min(0), ev)
            })
            .collect()
    })
}

fn policy(lock_triggers_idle: bool) -> Policy {
    Policy {
        idle_threshold_secs: 60,
        grace_margin_secs: 30,
        lock_triggers_idle,
    }
}

proptest! {
    #[test]
    fn closed_sessions_partition_their_span(events in timeline(), lock in any::<bool>()) {
        let mut m = SessionMachine::new(policy(lock));
        let mut open_sessions = 0i32;

        for (at, ev) in events {
            let was_open = m.session().is_some();
            let Ok(step) = m.handle(QueuedEvent::new(t(at), ev)) else {
                continue;
            };

            let opened = step.entries.iter().filter(|e| e.kind == EventKind::ClockIn).count();
            prop_assert!(opened <= 1);
            if opened == 1 {
                prop_assert!(!was_open);
                open_sessions += 1;
            }

            if let Some(closed) = &step.closed {
                open_sessions -= 1;
                let out = closed.clock_out.expect("closed session has a clock-out");
                prop_assert!(out >= closed.clock_in);
                prop_assert_eq!(
                    closed.total_work_secs + closed.total_break_secs + closed.total_idle_secs,
                    (out - closed.clock_in).num_seconds()
                );
                prop_assert!(closed.total_work_secs >= 0);
                prop_assert!(closed.total_break_secs >= 0);
                prop_assert!(closed.total_idle_secs >= 0);
            }

            prop_assert!((0..=1).contains(&open_sessions));
            prop_assert_eq!(open_sessions == 1, m.session().is_some());

            if let (Some(s), Some(w)) = (m.session(), m.watermark()) {
                prop_assert_eq!(s.live_totals(w).sum(), s.span_secs(w));
            }
        }
    }

    #[test]
    fn clock_out_is_set_once(open in 0i64..10_000, first in 0i64..10_000, later in 0i64..10_000) {
        let mut s = Session::with_id("p", t(open));
        s.close(t(open + first), CloseReason::User);
        let clock_out = s.clock_out;

        prop_assert!(!s.close(t(open + first + later), CloseReason::Recovery));
        prop_assert!(!s.close(t(open), CloseReason::IdleTimeout));
        prop_assert_eq!(s.clock_out, clock_out);
        prop_assert_eq!(s.close_reason, Some(CloseReason::User));
    }
}
