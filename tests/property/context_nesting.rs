//! Property-based tests for context stack discipline

use proptest::prelude::*;
use scripthost::context::{ContextStack, ExecutionContext};
use scripthost::error::ContextError;

#[derive(Debug, Clone)]
enum Op {
    Enter(usize),
    EnterFromScript(usize),
    Leave(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize).prop_map(Op::Enter),
        (0..4usize).prop_map(Op::EnterFromScript),
        (0..4usize).prop_map(Op::Leave),
    ]
}

/// The stack behaves like a plain LIFO of entries; failed operations change nothing.
#[test]
fn test_stack_matches_lifo_model() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(op_strategy(), 0..64), |ops| {
            let contexts: Vec<ExecutionContext> =
                (0..4).map(|_| ExecutionContext::create(None)).collect();
            let mut stack = ContextStack::new();
            let mut model: Vec<usize> = Vec::new();

            for op in ops {
                match op {
                    Op::Enter(i) => {
                        stack.enter(&contexts[i]).unwrap();
                        model.push(i);
                    }
                    Op::EnterFromScript(i) => {
                        let result = stack.enter_from_script(&contexts[i]);
                        if model.is_empty() {
                            prop_assert_eq!(result, Err(ContextError::NotInContext));
                        } else {
                            prop_assert!(result.is_ok());
                            model.push(i);
                        }
                    }
                    Op::Leave(i) => {
                        let result = stack.leave(&contexts[i]);
                        match model.last() {
                            None => prop_assert!(
                                matches!(result, Err(ContextError::LeaveOnEmptyStack(_))),
                                "leave on empty stack"
                            ),
                            Some(&top) if top != i => prop_assert!(
                                matches!(result, Err(ContextError::LeaveMismatch { .. })),
                                "leave mismatch"
                            ),
                            Some(_) => {
                                prop_assert!(result.is_ok());
                                model.pop();
                            }
                        }
                    }
                }

                prop_assert_eq!(stack.depth(), model.len());
                prop_assert_eq!(stack.in_context(), !model.is_empty());
                prop_assert_eq!(
                    stack.current().map(|c| c.id()),
                    model.last().map(|&i| contexts[i].id())
                );
            }

            while let Some(i) = model.pop() {
                stack.leave(&contexts[i]).unwrap();
            }
            prop_assert!(!stack.in_context());
            for context in &contexts {
                prop_assert!(!context.is_active());
            }

            Ok(())
        })
        .unwrap();
}

/// Host entries always make the entered context the current one.
#[test]
fn test_host_entry_sets_entered() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(0..3usize, 1..16), |order| {
            let contexts: Vec<ExecutionContext> =
                (0..3).map(|_| ExecutionContext::create(None)).collect();
            let mut stack = ContextStack::new();

            for &i in &order {
                stack.enter(&contexts[i]).unwrap();
                prop_assert_eq!(stack.entered(), Some(contexts[i].clone()));
                prop_assert_eq!(stack.current(), Some(contexts[i].clone()));
            }
            for &i in order.iter().rev() {
                stack.leave(&contexts[i]).unwrap();
            }

            Ok(())
        })
        .unwrap();
}
