// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Timer-driven behaviour of the engine cycles, on paused tokio time.

use squid_engine::{DynamicMerkleEngine, EngineConfig};
use squid_merkle::{compute_root, sha256_pair};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn engine(seed: u64, leaves: usize) -> Arc<DynamicMerkleEngine> {
    let values: Vec<String> = (0..leaves).map(|i| format!("leaf-value-{}", i)).collect();
    let engine = DynamicMerkleEngine::with_leaves(EngineConfig::default().with_seed(seed), &values)
        .expect("seed leaves");
    Arc::new(engine)
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_one_period_after_start() {
    init_tracing();
    let engine = engine(21, 16);

    let handles = engine.start();
    assert_eq!(handles.len(), 2);
    assert!(engine.is_running());
    // Second start is a no-op
    assert!(engine.start().is_empty());

    tokio::time::sleep(Duration::from_millis(1_900)).await;
    assert_eq!(engine.transition_count(), 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(engine.transition_count() > 0);

    engine.shutdown();
    for handle in handles {
        handle.await.expect("cycle task");
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_transitions_after_shutdown() {
    init_tracing();
    let engine = engine(22, 16);
    let handles = engine.start();

    tokio::time::sleep(Duration::from_secs(20)).await;
    engine.shutdown();
    let frozen = engine.transition_count();
    let root = engine.root();

    for handle in handles {
        handle.await.expect("cycle task");
    }
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(engine.transition_count(), frozen);
    assert_eq!(engine.root(), root);
    assert!(!engine.get_stats().running);

    // Idempotent, and a stopped engine does not restart
    engine.shutdown();
    assert!(engine.start().is_empty());
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_cycles_exit_when_engine_dropped() {
    let engine = engine(23, 4);
    let handles = engine.start();
    drop(engine);

    for handle in handles {
        handle.await.expect("cycle task");
    }
}

#[tokio::test(start_paused = true)]
async fn test_root_and_counters_stay_consistent_while_running() {
    init_tracing();
    let engine = engine(24, 32);
    let handles = engine.start();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(7)).await;

        let fresh = compute_root(&engine.leaf_hashes(), sha256_pair);
        assert_eq!(engine.root(), fresh);

        let nodes = engine.nodes();
        let total: u64 = nodes.iter().map(|n| n.transition_count).sum();
        assert_eq!(total as usize, engine.transition_count());

        let report = engine.verify_integrity();
        assert_eq!(report.compromised_count, engine.get_stats().compromised_nodes);
        assert_eq!(report.is_valid, report.compromised_count == 0);
    }

    engine.shutdown();
    for handle in handles {
        handle.await.expect("cycle task");
    }
}

#[tokio::test(start_paused = true)]
async fn test_caller_batches_interleave_with_cycles() {
    let engine = engine(25, 8);
    let handles = engine.start();

    for round in 0..5 {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let outcome = engine
            .add_leaves(&[format!("late-{}", round)])
            .expect("add leaf");
        assert_eq!(outcome.positions, vec![8 + round]);
        assert_eq!(outcome.new_root, engine.root());
    }

    let log = engine.transitions();
    for pair in log.windows(2) {
        assert!(pair[0].sequence < pair[1].sequence);
    }

    engine.shutdown();
    for handle in handles {
        handle.await.expect("cycle task");
    }
}
