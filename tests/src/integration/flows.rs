//! End-to-end flows: issue → submit → query → observe.

#[cfg(test)]
mod tests {
    use crate::support::{permissive_config, rig, rig_with};
    use lb_03_score_engine::DurableStore;
    use shared_bus::{ChangeKind, EventTopic};
    use shared_types::{ActionKind, EngineError, RejectReason, UserId};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_accepted_action_end_to_end() {
        let rig = rig();
        let alice = rig.seed_user("alice", 100).await;

        let token = rig
            .engine
            .issue_action_token(&alice, ActionKind::new("match_win"))
            .unwrap();
        let delta = rig.delta_for(&alice, &token, 50);
        let receipt = rig.engine.submit_action(&token.secret, delta).await.unwrap();

        assert!(receipt.accepted);
        assert_eq!(receipt.previous_score, 100);
        assert_eq!(receipt.new_score, 150);
        assert_eq!(receipt.rank, 1);
        assert_eq!(receipt.previous_rank, None);

        // The index answers reads directly.
        let ranked = rig.engine.user_rank(&alice).unwrap();
        assert_eq!(ranked.score, 150);
        assert_eq!(ranked.rank, 1);

        // Exactly one audit row, keyed by the consumed token.
        let history = rig.store.history_for(&alice).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].token_id, receipt.token_id);
        assert_eq!(history[0].previous_score, 100);
        assert_eq!(history[0].new_score, 150);
    }

    #[tokio::test]
    async fn test_second_submit_with_same_token_rejected() {
        let rig = rig();
        let alice = rig.seed_user("alice", 100).await;

        let token = rig
            .engine
            .issue_action_token(&alice, ActionKind::new("match_win"))
            .unwrap();
        let delta = rig.delta_for(&alice, &token, 50);

        rig.engine
            .submit_action(&token.secret, delta.clone())
            .await
            .unwrap();
        let err = rig
            .engine
            .submit_action(&token.secret, delta)
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::TokenAlreadyConsumed(token.token_id));
        assert_eq!(rig.engine.user_rank(&alice).unwrap().score, 150);
        assert_eq!(rig.store.history_for(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_magnitude_cap_rejection_leaves_score_unchanged() {
        let mut config = permissive_config();
        config.admission.max_magnitude_per_action = 100;
        let rig = rig_with(config);
        let alice = rig.seed_user("alice", 100).await;

        let err = rig.submit(&alice, 150).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::AdmissionRejected(RejectReason::MagnitudeExceeded)
        );

        assert_eq!(rig.engine.user_rank(&alice), None);
        let row = rig.store.read_user(&alice).await.unwrap().unwrap();
        assert_eq!(row.score, 100);

        // The reject was recorded with the request contents for review.
        let flags = rig.engine.flagged_submissions();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].magnitude, 150);
        assert_eq!(flags[0].reason, RejectReason::MagnitudeExceeded);
    }

    #[tokio::test]
    async fn test_tie_break_orders_equal_scores_by_user_id() {
        let rig = rig();
        for (name, score) in [("b", 0), ("a", 0), ("c", 0)] {
            rig.seed_user(name, score).await;
        }

        // Submit in an order that would mislead arrival-based ranking.
        rig.submit(&UserId::new("b"), 500).await.unwrap();
        rig.submit(&UserId::new("a"), 500).await.unwrap();
        rig.submit(&UserId::new("c"), 300).await.unwrap();

        let top = rig.engine.top_k(3);
        let order: Vec<&str> = top.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(top[0].score, 500);
        assert_eq!(top[1].score, 500);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[1].rank, 2);
        assert_eq!(top[2].rank, 3);
    }

    #[tokio::test]
    async fn test_issue_for_unknown_identity_fails() {
        let rig = rig();
        let err = rig
            .engine
            .issue_action_token(&UserId::new("mallory"), ActionKind::new("match_win"))
            .unwrap_err();
        assert_eq!(err, EngineError::IdentityInvalid(UserId::new("mallory")));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let rig = rig();
        let alice = rig.seed_user("alice", 0).await;

        let token = rig
            .engine
            .issue_action_token(&alice, ActionKind::new("match_win"))
            .unwrap();
        let delta = rig.delta_for(&alice, &token, 10);

        rig.time.advance(rig.config.tokens.ttl_ms + 1);
        let err = rig
            .engine
            .submit_action(&token.secret, delta)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::TokenExpired(token.token_id));
    }

    #[tokio::test]
    async fn test_observer_sees_score_and_rank_events() {
        let rig = rig();
        let alice = rig.seed_user("alice", 0).await;
        let _tasks = rig.engine.start();

        let mut observer = rig.engine.connect();
        rig.engine
            .authenticate(&observer.connection_id, "cred-alice")
            .unwrap();
        rig.engine
            .subscribe(&observer.connection_id, EventTopic::Leaderboard)
            .unwrap();
        rig.engine
            .subscribe(
                &observer.connection_id,
                EventTopic::User(alice.clone()),
            )
            .unwrap();

        rig.submit(&alice, 50).await.unwrap();

        // One commit emits the personal score change, then the ranking
        // change, consecutive in the total order.
        let first = timeout(Duration::from_millis(500), observer.receiver.recv())
            .await
            .expect("timeout")
            .expect("event");
        let second = timeout(Duration::from_millis(500), observer.receiver.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert_eq!(first.sequence + 1, second.sequence);
        match &first.kind {
            ChangeKind::ScoreChanged {
                user_id,
                previous_score,
                new_score,
                ..
            } => {
                assert_eq!(user_id, &alice);
                assert_eq!(*previous_score, 0);
                assert_eq!(*new_score, 50);
            }
            other => panic!("expected ScoreChanged, got {other:?}"),
        }
        match &second.kind {
            ChangeKind::LeaderboardChanged {
                user_id, new_rank, ..
            } => {
                assert_eq!(user_id, &alice);
                assert_eq!(*new_rank, 1);
            }
            other => panic!("expected LeaderboardChanged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reconnect_replays_missed_events() {
        let rig = rig();
        let alice = rig.seed_user("alice", 0).await;
        let _tasks = rig.engine.start();

        // First connection observes one commit, acks it, then drops.
        let mut first = rig.engine.connect();
        rig.engine
            .subscribe(&first.connection_id, EventTopic::Leaderboard)
            .unwrap();
        rig.submit(&alice, 10).await.unwrap();
        let seen = timeout(Duration::from_millis(500), first.receiver.recv())
            .await
            .expect("timeout")
            .expect("event");
        rig.engine.disconnect(&first.connection_id);

        // Two more commits happen while nobody is connected.
        rig.submit(&alice, 10).await.unwrap();
        rig.submit(&alice, 10).await.unwrap();

        // The reconnecting observer resumes from its acked watermark.
        let mut second = rig.engine.connect();
        rig.engine.ack(&second.connection_id, seen.sequence).unwrap();
        let replayed = rig
            .engine
            .subscribe(&second.connection_id, EventTopic::Leaderboard)
            .unwrap();
        assert_eq!(replayed, 2);

        let mut last = seen.sequence;
        for _ in 0..2 {
            let event = timeout(Duration::from_millis(500), second.receiver.recv())
                .await
                .expect("timeout")
                .expect("event");
            assert!(event.sequence > last);
            last = event.sequence;
        }
    }

    #[tokio::test]
    async fn test_far_behind_subscriber_must_resync() {
        let mut config = permissive_config();
        config.bus.backlog_capacity = 2;
        let rig = rig_with(config);
        let alice = rig.seed_user("alice", 0).await;

        // Each accepted submit emits two events; six events with a
        // two-event backlog evict the early range.
        for _ in 0..3 {
            rig.submit(&alice, 10).await.unwrap();
        }

        let observer = rig.engine.connect();
        let err = rig
            .engine
            .subscribe(&observer.connection_id, EventTopic::Leaderboard)
            .unwrap_err();
        assert!(matches!(
            err,
            lb_05_fanout::FanoutError::ResyncRequired { .. }
        ));

        // Fresh read + ack at head makes the subscription attachable.
        let top = rig.engine.top_k(10);
        assert_eq!(top[0].score, 30);
        rig.engine
            .ack(&observer.connection_id, rig.engine.head_sequence())
            .unwrap();
        assert_eq!(
            rig.engine
                .subscribe(&observer.connection_id, EventTopic::Leaderboard)
                .unwrap(),
            0
        );
    }
}
