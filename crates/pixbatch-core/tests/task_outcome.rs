use std::path::Path;

use pixbatch_core::{EditError, EditParams, ModelKind, Task, TaskOutcome};

#[test]
fn new_task_is_pending() {
    let task = Task::new("/in/a.jpg", "/out", ModelKind::Retouch, EditParams::new());

    assert!(matches!(task.outcome(), TaskOutcome::Pending));
    assert!(!task.outcome().is_terminal());
    assert!(task.result_bytes().is_none());
    assert!(task.error().is_none());
    assert_eq!(task.output_path(), Path::new("/out/a_processed.png"));
}

#[test]
fn success_is_written_once() {
    let mut task = Task::new("/in/a.jpg", "/out", ModelKind::Retouch, EditParams::new());

    task.succeed(vec![1, 2, 3]).unwrap();
    assert!(task.is_success());
    assert_eq!(task.result_bytes(), Some(&[1u8, 2, 3][..]));
    assert!(task.error().is_none());

    // a finished task never changes again
    assert!(task.fail(EditError::Validation("late".into())).is_err());
    assert!(task.succeed(vec![]).is_err());
    assert_eq!(task.outcome().as_str(), "Success");
}

#[test]
fn failure_carries_error_and_no_bytes() {
    let mut task = Task::new("/in/b.png", "/out", ModelKind::Style, EditParams::new());
    task.fail(EditError::Transport("connection refused".into()))
        .unwrap();

    assert!(!task.is_success());
    assert!(task.result_bytes().is_none());
    assert!(
        task.error()
            .unwrap()
            .to_string()
            .contains("connection refused")
    );

    let err = task.succeed(vec![9]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "illegal task transition from Failure to Success"
    );
}

#[test]
fn tasks_get_distinct_ids() {
    let a = Task::new("/in/a.jpg", "/out", ModelKind::Retouch, EditParams::new());
    let b = Task::new("/in/a.jpg", "/out", ModelKind::Retouch, EditParams::new());
    assert_ne!(a.id(), b.id());
}

#[test]
fn construction_inputs_are_exposed_read_only() {
    let params = EditParams::new().with("prompt", "ink wash");
    let task = Task::new("/in/c.webp", "/out", ModelKind::Style, params.clone());

    assert_eq!(task.model(), ModelKind::Style);
    assert_eq!(task.params(), &params);
    assert_eq!(task.source(), Path::new("/in/c.webp"));
    assert_eq!(task.output_dir(), Path::new("/out"));
}
