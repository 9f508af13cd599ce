//! Property tests: arbitrary interleavings of submit / approve / reject /
//! direct logging keep the counters, the log, and the pending set consistent.

use hourledger_engine::HoursService;
use hourledger_model::{Caller, RequestId};
use hourledger_storage::HoursSource;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Submit { student: usize, activity: usize, hours: u32 },
    Approve { pick: usize },
    Reject { pick: usize },
    Log { student: usize, activity: usize, hours: u32 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..4usize, 0..3usize, 0..20u32).prop_map(|(student, activity, hours)| Step::Submit {
            student,
            activity,
            hours
        }),
        any::<usize>().prop_map(|pick| Step::Approve { pick }),
        any::<usize>().prop_map(|pick| Step::Reject { pick }),
        (0..4usize, 0..3usize, 1..20u32).prop_map(|(student, activity, hours)| Step::Log {
            student,
            activity,
            hours
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn counters_match_the_log_after_any_history(steps in prop::collection::vec(step(), 1..40)) {
        let service = HoursService::in_memory();
        service.seed_defaults().unwrap();
        let students: Vec<Caller> = ["bob", "rob", "jim", "phil"]
            .iter()
            .map(|n| service.caller_for(n).unwrap())
            .collect();
        let dean = service.caller_for("dean").unwrap();
        let activities: Vec<_> = service.list_activities().into_iter().map(|a| a.id).collect();

        let mut open: Vec<(RequestId, usize, u32)> = Vec::new();
        let mut expected = [0u64; 4];

        for step in steps {
            match step {
                Step::Submit { student, activity, hours } => {
                    let caller = &students[student];
                    let result = service.submit_request(
                        caller,
                        caller.account_id,
                        activities[activity],
                        hours,
                    );
                    if hours == 0 {
                        prop_assert!(result.is_err());
                    } else {
                        open.push((result.unwrap(), student, hours));
                    }
                }
                Step::Approve { pick } if !open.is_empty() => {
                    let (id, student, hours) = open.remove(pick % open.len());
                    let approval = service.approve_request(&dean, id).unwrap();
                    expected[student] += u64::from(hours);
                    prop_assert_eq!(approval.new_total_hours, expected[student]);
                }
                Step::Reject { pick } if !open.is_empty() => {
                    let (id, _, _) = open.remove(pick % open.len());
                    service.reject_request(&dean, id).unwrap();
                }
                Step::Log { student, activity, hours } => {
                    let approval = service
                        .log_hours_directly(&dean, students[student].account_id, activities[activity], hours)
                        .unwrap();
                    expected[student] += u64::from(hours);
                    prop_assert_eq!(approval.new_total_hours, expected[student]);
                }
                Step::Approve { .. } | Step::Reject { .. } => {}
            }
        }

        prop_assert_eq!(service.list_pending_requests(&dean).unwrap().len(), open.len());
        prop_assert!(service.audit_hours(&dean).unwrap().is_empty());
        for (student, hours) in students.iter().zip(expected) {
            let cached = service
                .store()
                .read(|t| t.total_hours_for(student.account_id, HoursSource::Cached))
                .unwrap();
            prop_assert_eq!(cached, hours);
        }
    }
}
