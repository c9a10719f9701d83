use crate::cluster::control::ControlHandler;
use crate::cluster::role_test_support::meta;
use crate::cluster::role_test_support::RoleHarness;
use crate::cluster::role_test_support::ScriptedSubscription;
use crate::cluster::Candidate;
use crate::cluster::ControlMessage;
use crate::cluster::Transition;

fn grant(term: i32, candidate_id: i16, voter_id: i16) -> ControlMessage {
    ControlMessage::ReplyVote {
        term,
        candidate_id,
        voter_id,
        granted: true,
    }
}

#[test]
fn test_start_new_election() {
    let mut harness = RoleHarness::new(1);
    harness.term.advance_position(10);
    let mut candidate = Candidate::new(3);

    let transition = candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    assert_eq!(Transition::Stay, transition);
    assert_eq!(1, harness.term.term());
    assert_eq!(Some(1), harness.term.voted_for());
    assert_eq!(
        vec![ControlMessage::RequestVote {
            term: 1,
            candidate_id: 1,
            last_position: 10,
        }],
        harness.control.sent_control()
    );
}

#[test]
fn test_single_node_cluster_elects_immediately() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(1);

    let transition = candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    assert_eq!(Transition::ToLeader, transition);
    assert!(harness.control.sent_control().is_empty());
}

#[test]
fn test_quorum_of_grants_elects() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(3);
    candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    tracing::info!("--- one grant plus self is a quorum of two in three");
    let mut transition = Transition::Stay;
    candidate.on_control(grant(1, 1, 2), &meta(9), &mut harness.ctx(), &mut transition);

    assert_eq!(Transition::ToLeader, transition);
}

#[test]
fn test_foreign_and_stale_grants_are_ignored() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(3);
    candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    let mut transition = Transition::Stay;

    tracing::info!("--- a grant for some other candidate");
    candidate.on_control(grant(1, 3, 2), &meta(9), &mut harness.ctx(), &mut transition);
    assert_eq!(Transition::Stay, transition);

    tracing::info!("--- a grant from a previous election term");
    candidate.on_control(grant(0, 1, 2), &meta(9), &mut harness.ctx(), &mut transition);
    assert_eq!(Transition::Stay, transition);
}

#[test]
fn test_heartbeat_of_current_term_defers() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(3);
    candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    let heartbeat = ControlMessage::ConsensusHeartbeat {
        term: 1,
        leader_id: 2,
        session_id: 55,
        position: 0,
    };
    let mut transition = Transition::Stay;
    candidate.on_control(heartbeat, &meta(55), &mut harness.ctx(), &mut transition);

    assert_eq!(Transition::ToFollower, transition);
    assert_eq!(Some(55), harness.term.leader_session_id());
    assert_eq!(1, harness.term.term());
}

#[test]
fn test_newer_request_vote_grants_and_defers() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(3);
    candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    let request = ControlMessage::RequestVote {
        term: 5,
        candidate_id: 3,
        last_position: 0,
    };
    let mut transition = Transition::Stay;
    candidate.on_control(request, &meta(9), &mut harness.ctx(), &mut transition);

    assert_eq!(Transition::ToFollower, transition);
    assert_eq!(5, harness.term.term());
    assert_eq!(Some(3), harness.term.voted_for());

    let replies: Vec<_> = harness
        .control
        .sent_control()
        .into_iter()
        .filter(|m| matches!(m, ControlMessage::ReplyVote { .. }))
        .collect();
    assert_eq!(
        vec![ControlMessage::ReplyVote {
            term: 5,
            candidate_id: 3,
            voter_id: 1,
            granted: true,
        }],
        replies
    );
}

#[test]
fn test_rival_of_same_term_is_rejected() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(3);
    candidate.start_new_election(&mut harness.ctx(), 100, 1500);

    let request = ControlMessage::RequestVote {
        term: 1,
        candidate_id: 3,
        last_position: 0,
    };
    let mut transition = Transition::Stay;
    candidate.on_control(request, &meta(9), &mut harness.ctx(), &mut transition);

    assert_eq!(Transition::Stay, transition);
    let replies: Vec<_> = harness
        .control
        .sent_control()
        .into_iter()
        .filter(|m| matches!(m, ControlMessage::ReplyVote { .. }))
        .collect();
    assert_eq!(
        vec![ControlMessage::ReplyVote {
            term: 1,
            candidate_id: 3,
            voter_id: 1,
            granted: false,
        }],
        replies
    );
}

#[test]
fn test_election_deadline_restarts_with_a_new_term() {
    let mut harness = RoleHarness::new(1);
    let mut candidate = Candidate::new(3);
    candidate.inject_subscriptions(ScriptedSubscription::empty());
    candidate.start_new_election(&mut harness.ctx(), 100, 1000);

    let (_, at_deadline) = candidate.poll(&mut harness.ctx(), 10, 1100, 1000);
    assert_eq!(Transition::Stay, at_deadline);
    assert_eq!(1, harness.term.term());

    let (_, past_deadline) = candidate.poll(&mut harness.ctx(), 10, 1101, 1000);
    assert_eq!(Transition::Stay, past_deadline);
    assert_eq!(2, harness.term.term());

    let requests: Vec<i32> = harness
        .control
        .sent_control()
        .into_iter()
        .filter_map(|m| match m {
            ControlMessage::RequestVote { term, .. } => Some(term),
            _ => None,
        })
        .collect();
    assert_eq!(vec![1, 2], requests);
}
