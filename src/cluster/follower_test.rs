use pretty_assertions::assert_eq;

use crate::cluster::control::ControlHandler;
use crate::cluster::role_test_support::meta;
use crate::cluster::role_test_support::RoleHarness;
use crate::cluster::role_test_support::ScriptedSubscription;
use crate::cluster::ControlMessage;
use crate::cluster::Follower;
use crate::cluster::Transition;

fn heartbeat(term: i32, position: i64) -> ControlMessage {
    ControlMessage::ConsensusHeartbeat {
        term,
        leader_id: 1,
        session_id: 42,
        position,
    }
}

#[test]
fn test_heartbeat_updates_term_state() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let mut transition = Transition::Stay;
    follower.on_control(heartbeat(3, 0), &meta(42), &mut harness.ctx(), &mut transition);

    assert_eq!(Transition::Stay, transition);
    assert_eq!(3, harness.term.term());
    assert_eq!(Some(42), harness.term.leader_session_id());
}

#[test]
fn test_stale_heartbeat_is_dropped() {
    let mut harness = RoleHarness::new(2);
    harness.term.observe_term(5);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let mut transition = Transition::Stay;
    follower.on_control(heartbeat(3, 10), &meta(42), &mut harness.ctx(), &mut transition);

    assert_eq!(5, harness.term.term());
    assert_eq!(None, harness.term.leader_session_id());
    assert_eq!(0, harness.term.commit_position());
}

#[test]
fn test_heartbeat_commit_is_clamped_to_received_data() {
    let mut harness = RoleHarness::new(2);
    harness.term.advance_position(20);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let mut transition = Transition::Stay;
    follower.on_control(heartbeat(1, 50), &meta(42), &mut harness.ctx(), &mut transition);

    assert_eq!(20, harness.term.commit_position());
}

#[test]
fn test_heartbeat_gap_requests_resend_once() {
    let mut harness = RoleHarness::new(2);
    harness.term.advance_position(10);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let mut transition = Transition::Stay;
    follower.on_control(heartbeat(1, 50), &meta(42), &mut harness.ctx(), &mut transition);
    follower.on_control(heartbeat(1, 60), &meta(42), &mut harness.ctx(), &mut transition);

    let resends: Vec<_> = harness
        .control
        .sent_control()
        .into_iter()
        .filter(|m| matches!(m, ControlMessage::Resend { .. }))
        .collect();
    assert_eq!(
        vec![ControlMessage::Resend {
            term: 1,
            leader_id: 1,
            start_position: 10,
            length: 40,
        }],
        resends
    );
}

#[test]
fn test_vote_granted_to_up_to_date_candidate() {
    let mut harness = RoleHarness::new(2);
    harness.term.advance_position(30);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let request = ControlMessage::RequestVote {
        term: 1,
        candidate_id: 3,
        last_position: 30,
    };
    let mut transition = Transition::Stay;
    follower.on_control(request, &meta(9), &mut harness.ctx(), &mut transition);

    assert_eq!(Some(3), harness.term.voted_for());
    assert_eq!(
        vec![ControlMessage::ReplyVote {
            term: 1,
            candidate_id: 3,
            voter_id: 2,
            granted: true,
        }],
        harness.control.sent_control()
    );
}

#[test]
fn test_vote_rejected_for_lagging_candidate() {
    let mut harness = RoleHarness::new(2);
    harness.term.advance_position(30);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let request = ControlMessage::RequestVote {
        term: 1,
        candidate_id: 3,
        last_position: 10,
    };
    let mut transition = Transition::Stay;
    follower.on_control(request, &meta(9), &mut harness.ctx(), &mut transition);

    // The newer term still advances ours, but no vote is granted.
    assert_eq!(1, harness.term.term());
    assert_eq!(None, harness.term.voted_for());
    assert_eq!(
        vec![ControlMessage::ReplyVote {
            term: 1,
            candidate_id: 3,
            voter_id: 2,
            granted: false,
        }],
        harness.control.sent_control()
    );
}

#[test]
fn test_at_most_one_grant_per_term() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);

    let first = ControlMessage::RequestVote {
        term: 1,
        candidate_id: 3,
        last_position: 0,
    };
    let second = ControlMessage::RequestVote {
        term: 1,
        candidate_id: 4,
        last_position: 100,
    };
    let mut transition = Transition::Stay;
    follower.on_control(first, &meta(9), &mut harness.ctx(), &mut transition);
    follower.on_control(second, &meta(9), &mut harness.ctx(), &mut transition);

    let grants: Vec<bool> = harness
        .control
        .sent_control()
        .into_iter()
        .map(|m| match m {
            ControlMessage::ReplyVote { granted, .. } => granted,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(vec![true, false], grants);
    assert_eq!(Some(3), harness.term.voted_for());
}

#[test]
fn test_data_fragments_are_applied_and_acknowledged() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);
    follower.inject_subscriptions(
        ScriptedSubscription::of_control(&[heartbeat(1, 0)]),
        ScriptedSubscription::of_data(42, &[(5, b"8=FIX"), (9, b"\x019=2")]),
    );

    let (_, transition) = follower.poll(&mut harness.ctx(), 10, 100);

    assert_eq!(Transition::Stay, transition);
    assert_eq!(b"8=FIX\x019=2".to_vec(), harness.session.received());
    assert_eq!(9, harness.session.last_position());
    assert_eq!(9, harness.term.position());
    assert_eq!(b"8=FIX\x019=2".to_vec(), harness.archiver.contents());

    let acks: Vec<_> = harness
        .control
        .sent_control()
        .into_iter()
        .filter(|m| matches!(m, ControlMessage::MessageAcknowledgement { .. }))
        .collect();
    assert_eq!(
        vec![ControlMessage::MessageAcknowledgement {
            term: 1,
            follower_id: 2,
            position: 9,
        }],
        acks
    );
}

#[test]
fn test_duplicate_data_is_ignored() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);
    follower.inject_subscriptions(
        ScriptedSubscription::of_control(&[heartbeat(1, 0)]),
        ScriptedSubscription::of_data(42, &[(5, b"AAAAA"), (5, b"AAAAA"), (9, b"BBBB")]),
    );

    follower.poll(&mut harness.ctx(), 10, 100);

    assert_eq!(b"AAAAABBBB".to_vec(), harness.session.received());
    assert_eq!(9, harness.term.position());
}

#[test]
fn test_data_from_unknown_session_is_dropped() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);
    follower.inject_subscriptions(
        ScriptedSubscription::of_control(&[heartbeat(1, 0)]),
        ScriptedSubscription::of_data(666, &[(5, b"XXXXX")]),
    );

    follower.poll(&mut harness.ctx(), 10, 100);

    assert!(harness.session.received().is_empty());
    assert_eq!(0, harness.term.position());
}

#[test]
fn test_timeout_promotes_to_candidate() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);
    follower.inject_subscriptions(ScriptedSubscription::empty(), ScriptedSubscription::empty());

    let (_, at_deadline) = follower.poll(&mut harness.ctx(), 10, 1000);
    assert_eq!(Transition::Stay, at_deadline);

    let (_, past_deadline) = follower.poll(&mut harness.ctx(), 10, 1001);
    assert_eq!(Transition::ToCandidate, past_deadline);
}

#[test]
fn test_heartbeat_extends_the_timeout() {
    let mut harness = RoleHarness::new(2);
    let mut follower = Follower::new();
    follower.follow(0, 1000);
    follower.inject_subscriptions(
        ScriptedSubscription::of_control(&[heartbeat(1, 0)]),
        ScriptedSubscription::empty(),
    );

    // The heartbeat arrives at 900 and pushes the deadline to 1900.
    let (_, transition) = follower.poll(&mut harness.ctx(), 10, 900);
    assert_eq!(Transition::Stay, transition);

    let (_, transition) = follower.poll(&mut harness.ctx(), 10, 1900);
    assert_eq!(Transition::Stay, transition);

    let (_, transition) = follower.poll(&mut harness.ctx(), 10, 1901);
    assert_eq!(Transition::ToCandidate, transition);
}
