//! Concurrent approvals against a durable store.

use hourledger_engine::{EngineConfig, HoursService};
use hourledger_model::{Caller, LedgerError};
use hourledger_storage::{HoursSource, StorageConfig};
use std::sync::Barrier;
use tempfile::tempdir;

fn durable_service(dir: &std::path::Path) -> HoursService {
    let service = HoursService::open(EngineConfig {
        storage: StorageConfig::in_dir(dir),
        ..Default::default()
    })
    .unwrap();
    service.seed_defaults().unwrap();
    service
}

#[test]
fn racing_approvals_of_one_request_succeed_once() {
    let dir = tempdir().unwrap();
    let service = durable_service(dir.path());
    let bob = service.caller_for("bob").unwrap();
    let staff: Vec<Caller> = ["dean", "teacher"]
        .iter()
        .map(|name| service.caller_for(name).unwrap())
        .collect();
    let volunteering = service.activity_by_name("volunteering").unwrap().id;

    for round in 0..20u32 {
        let id = service
            .submit_request(&bob, bob.account_id, volunteering, round + 1)
            .unwrap();
        let barrier = Barrier::new(staff.len());

        let results: Vec<Result<_, LedgerError>> = std::thread::scope(|s| {
            let handles: Vec<_> = staff
                .iter()
                .map(|approver| {
                    let service = &service;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        service.approve_request(approver, id)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let approved = results.iter().filter(|r| r.is_ok()).count();
        let not_found = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::NotFound { .. })))
            .count();
        assert_eq!((approved, not_found), (1, 1), "round {round}: {results:?}");
    }

    let expected: u64 = (1..=20).sum();
    service.store().read(|t| {
        assert_eq!(t.logs().len(), 20);
        assert_eq!(
            t.total_hours_for(bob.account_id, HoursSource::Cached).unwrap(),
            expected
        );
        assert!(t.audit().is_empty());
    });
}

#[test]
fn parallel_approvals_for_one_student_lose_no_updates() {
    let dir = tempdir().unwrap();
    let service = durable_service(dir.path());
    let rob = service.caller_for("rob").unwrap();
    let dean = service.caller_for("dean").unwrap();
    let help_desk = service.activity_by_name("help_desk").unwrap().id;

    let ids: Vec<_> = (0..32)
        .map(|_| {
            service
                .submit_request(&rob, rob.account_id, help_desk, 3)
                .unwrap()
        })
        .collect();

    std::thread::scope(|s| {
        for chunk in ids.chunks(8) {
            let service = &service;
            let dean = &dean;
            s.spawn(move || {
                for id in chunk {
                    service.approve_request(dean, *id).unwrap();
                }
            });
        }
    });

    service.store().read(|t| {
        assert_eq!(
            t.total_hours_for(rob.account_id, HoursSource::Cached).unwrap(),
            96
        );
        assert_eq!(
            t.total_hours_for(rob.account_id, HoursSource::Recomputed).unwrap(),
            96
        );
        assert!(t.pending_requests().is_empty());
    });

    // The same state comes back from disk.
    drop(service);
    let reopened = HoursService::open(EngineConfig {
        storage: StorageConfig::in_dir(dir.path()),
        ..Default::default()
    })
    .unwrap();
    let board = reopened.leaderboard();
    assert_eq!(board[0].username, "rob");
    assert_eq!(board[0].cumulative_hours, 96);
}
