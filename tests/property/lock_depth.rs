//! Property-based tests for engine lock depth accounting

use proptest::prelude::*;
use scripthost::error::LockError;
use scripthost::lock::EngineLock;

#[derive(Debug, Clone, Copy)]
enum Op {
    Acquire,
    Release,
    TemporaryRelease,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Acquire),
        2 => Just(Op::Release),
        1 => Just(Op::TemporaryRelease),
    ]
}

#[test]
fn test_depth_tracks_acquire_release_model() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(op_strategy(), 0..48), |ops| {
            let lock = EngineLock::new();
            let mut depth = 0usize;
            let mut acquired = false;

            for op in ops {
                match op {
                    Op::Acquire => {
                        depth += 1;
                        acquired = true;
                        prop_assert_eq!(lock.acquire(), depth);
                    }
                    Op::Release => {
                        if depth == 0 {
                            prop_assert_eq!(lock.release(), Err(LockError::ReleaseWithoutAcquire));
                        } else {
                            depth -= 1;
                            prop_assert_eq!(lock.release(), Ok(depth));
                        }
                    }
                    Op::TemporaryRelease => match lock.temporary_release() {
                        Ok(scope) => {
                            prop_assert!(depth > 0);
                            prop_assert_eq!(scope.saved_depth(), depth);
                            prop_assert!(!lock.is_locked());
                            prop_assert!(scope.restore().is_ok());
                        }
                        Err(err) => {
                            prop_assert_eq!(depth, 0);
                            prop_assert_eq!(err, LockError::NotHeld);
                        }
                    },
                }
                prop_assert_eq!(lock.depth(), depth);
                prop_assert_eq!(lock.is_locked(), depth > 0);
            }

            while depth > 0 {
                depth -= 1;
                prop_assert_eq!(lock.release(), Ok(depth));
            }
            prop_assert_eq!(lock.is_active(), acquired);

            Ok(())
        })
        .unwrap();
}
