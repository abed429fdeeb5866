//! Consistency properties the engine must uphold under concurrency.

#[cfg(test)]
mod tests {
    use crate::support::{permissive_config, rig, rig_with};
    use lb_03_score_engine::DurableStore;
    use shared_bus::EventTopic;
    use shared_types::{ActionKind, EngineError, UserId};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Idempotency: one token, one accepted mutation, ever.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_idempotency_under_concurrent_reuse() {
        let rig = Arc::new(rig());
        let alice = rig.seed_user("alice", 0).await;

        let token = rig
            .engine
            .issue_action_token(&alice, ActionKind::new("match_win"))
            .unwrap();
        let delta = rig.delta_for(&alice, &token, 7);

        // Ten racing submissions of the same (token, secret).
        let mut handles = Vec::new();
        for _ in 0..10 {
            let rig = rig.clone();
            let secret = token.secret.clone();
            let delta = delta.clone();
            handles.push(tokio::spawn(async move {
                rig.engine.submit_action(&secret, delta).await
            }));
        }

        let mut accepted = 0;
        let mut already_consumed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => {
                    accepted += 1;
                    assert_eq!(receipt.new_score, 7);
                }
                Err(EngineError::TokenAlreadyConsumed(id)) => {
                    already_consumed += 1;
                    assert_eq!(id, token.token_id);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(already_consumed, 9);
        assert_eq!(rig.store.read_user(&alice).await.unwrap().unwrap().score, 7);
        assert_eq!(rig.store.history_for(&alice).await.unwrap().len(), 1);
    }

    /// Conservation: finalScore == initialScore + sum(accepted deltas),
    /// independent of concurrency. 50 concurrent magnitude-1 submissions
    /// with distinct tokens must land on exactly initial + 50.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_conservation_under_concurrency() {
        let rig = Arc::new(rig());
        let alice = rig.seed_user("alice", 100).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let rig = rig.clone();
            let alice = alice.clone();
            handles.push(tokio::spawn(async move { rig.submit(&alice, 1).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let row = rig.store.read_user(&alice).await.unwrap().unwrap();
        assert_eq!(row.score, 150, "no lost updates, no double applies");
        assert_eq!(row.accepted_actions, 50);
        assert_eq!(row.version, 50);

        // The audit trail accounts for every point.
        let history = rig.store.history_for(&alice).await.unwrap();
        assert_eq!(history.len(), 50);
        let total: i64 = history
            .iter()
            .map(|e| e.new_score - e.previous_score)
            .sum();
        assert_eq!(total, 50);

        // The index converged on the committed score.
        assert_eq!(rig.engine.user_rank(&alice).unwrap().score, 150);
    }

    /// Conservation across users: unrelated users mutate fully in
    /// parallel without interference.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_cross_user_isolation() {
        let rig = Arc::new(rig());
        let users: Vec<UserId> = {
            let mut users = Vec::new();
            for i in 0..5 {
                users.push(rig.seed_user(&format!("user-{i}"), 10).await);
            }
            users
        };

        let mut handles = Vec::new();
        for user in &users {
            for _ in 0..10 {
                let rig = rig.clone();
                let user = user.clone();
                handles.push(tokio::spawn(async move { rig.submit(&user, 2).await }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for user in &users {
            let row = rig.store.read_user(user).await.unwrap().unwrap();
            assert_eq!(row.score, 30);
        }
    }

    /// Rank monotonicity: an accepted score increase never worsens the
    /// user's rank, and nobody else's score moves.
    #[tokio::test]
    async fn test_rank_monotonicity() {
        let rig = rig();
        for (name, score) in [("a", 0), ("b", 0), ("c", 0)] {
            rig.seed_user(name, score).await;
        }
        rig.submit(&UserId::new("a"), 500).await.unwrap();
        rig.submit(&UserId::new("b"), 400).await.unwrap();
        rig.submit(&UserId::new("c"), 300).await.unwrap();

        let before_c = rig.engine.user_rank(&UserId::new("c")).unwrap();
        let before_scores: Vec<_> = rig
            .engine
            .top_k(10)
            .into_iter()
            .filter(|e| e.user_id.as_str() != "c")
            .map(|e| (e.user_id.clone(), e.score))
            .collect();

        let receipt = rig.submit(&UserId::new("c"), 150).await.unwrap();
        assert!(receipt.rank <= before_c.rank);
        assert_eq!(receipt.previous_rank, Some(before_c.rank));
        assert_eq!(receipt.rank, 2);

        // No other user's score changed.
        for (user, score) in before_scores {
            assert_eq!(rig.engine.user_rank(&user).unwrap().score, score);
        }
    }

    /// Ordering: a single subscriber sees strictly increasing sequence
    /// numbers with no gaps once caught up.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_subscriber_ordering_no_gaps() {
        let rig = Arc::new(rig());
        let users = [
            rig.seed_user("alice", 0).await,
            rig.seed_user("bob", 0).await,
            rig.seed_user("carol", 0).await,
        ];
        let _tasks = rig.engine.start();

        let mut observer = rig.engine.connect();
        rig.engine
            .subscribe(&observer.connection_id, EventTopic::Leaderboard)
            .unwrap();

        // Concurrent commits across users; every commit emits a
        // leaderboard event.
        let mut handles = Vec::new();
        for user in &users {
            for _ in 0..10 {
                let rig = rig.clone();
                let user = user.clone();
                handles.push(tokio::spawn(async move { rig.submit(&user, 1).await }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut last = 0;
        let mut board_events = 0;
        while board_events < 30 {
            let event = timeout(Duration::from_secs(2), observer.receiver.recv())
                .await
                .expect("timeout")
                .expect("event");
            assert!(
                event.sequence > last,
                "sequence regressed: {} after {}",
                event.sequence,
                last
            );
            last = event.sequence;
            board_events += 1;
        }
        assert_eq!(rig.engine.head_sequence(), 60);
    }

    /// Admission determinism: two engines fed the identical request
    /// stream at identical times produce identical outcomes.
    #[tokio::test]
    async fn test_admission_determinism_across_identical_engines() {
        let mut config = permissive_config();
        config.admission.min_interval_ms = 2_000;
        config.admission.max_magnitude_per_action = 100;

        let a = rig_with(config.clone());
        let b = rig_with(config);

        for r in [&a, &b] {
            r.seed_user("alice", 0).await;
        }
        let alice = UserId::new("alice");

        // (advance_ms, magnitude) pairs, some designed to reject.
        let script: [(u64, i64); 4] = [(0, 50), (500, 10), (2_500, 150), (2_500, 30)];
        for (advance, magnitude) in script {
            a.time.advance(advance);
            b.time.advance(advance);

            let ra = a.submit(&alice, magnitude).await;
            let rb = b.submit(&alice, magnitude).await;
            match (&ra, &rb) {
                (Ok(x), Ok(y)) => {
                    assert_eq!(x.previous_score, y.previous_score);
                    assert_eq!(x.new_score, y.new_score);
                }
                (Err(x), Err(y)) => assert_eq!(x, y),
                other => panic!("engines diverged: {other:?}"),
            }
        }

        assert_eq!(
            a.store.read_user(&alice).await.unwrap().unwrap().score,
            b.store.read_user(&alice).await.unwrap().unwrap().score,
        );
    }
}
