//! End-to-end orchestration scenarios over in-memory doubles.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{InMemoryRepository, ScriptedRuntime};
use symergion::domain::models::{CheckpointSpec, Config, TaskTemplate, WorkerRole};
use symergion::services::TaskOrchestrator;
use symergion::ModelRuntime;

const INITIAL_NOTE: &str =
    "task_branch: TestCase_greeter, source: greeter.py, destination: test_greeter.py\nCover the edge cases";

fn config() -> Config {
    Config {
        model_cache_size: 3,
        checkpoints: vec![
            CheckpointSpec {
                name_or_path: "workerA".to_string(),
                role: WorkerRole::Coding,
                reasoning_start_tokens: vec![],
                reasoning_stop_tokens: vec![],
            },
            CheckpointSpec {
                name_or_path: "workerB".to_string(),
                role: WorkerRole::Coding,
                reasoning_start_tokens: vec![],
                reasoning_stop_tokens: vec![],
            },
            CheckpointSpec {
                name_or_path: "workerR".to_string(),
                role: WorkerRole::Reasoning,
                reasoning_start_tokens: vec![7],
                reasoning_stop_tokens: vec![9],
            },
        ],
        templates: BTreeMap::from([(
            "TestCase".to_string(),
            TaskTemplate {
                params: BTreeMap::from([
                    ("source".to_string(), r"source:\s*([\w/.-]+)".to_string()),
                    (
                        "destination".to_string(),
                        r"destination:\s*([\w/.-]+)".to_string(),
                    ),
                ]),
                call_to_action: "Write unit tests".to_string(),
                code_starter: "import unittest".to_string(),
            },
        )]),
        ..Config::default()
    }
}

fn setup() -> (
    Arc<InMemoryRepository>,
    Arc<ScriptedRuntime>,
    TaskOrchestrator<InMemoryRepository>,
) {
    let repo = Arc::new(InMemoryRepository::new());
    repo.add_branch("main");
    repo.set_file("greeter.py", "class Greeter:\n    pass\n");

    let runtime = Arc::new(ScriptedRuntime::new(65536));
    runtime.script("workerA", &[65, 66]);
    runtime.script("workerB", &[67]);
    runtime.script("workerR", &[1, 7, 20, 21, 9, 2]);

    let orchestrator = TaskOrchestrator::new(
        Arc::clone(&repo),
        Arc::clone(&runtime) as Arc<dyn ModelRuntime>,
        config(),
    )
    .unwrap();
    (repo, runtime, orchestrator)
}

#[tokio::test]
async fn test_task_creation_runs_initial_round() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);

    orchestrator.tick().await;

    for worker in ["workerA", "workerB"] {
        let branch = format!("{worker}_TestCase_greeter");
        assert!(repo.branch_exists(&branch), "{branch} should exist");
        let commits = repo.commits_on(&branch);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].path, "test_greeter.py");
        assert_eq!(commits[0].author, worker);
        let message = &commits[0].message;
        assert!(message.contains("Write unit tests for the class Greeter"));
        assert!(message.contains("Cover the edge cases"));
        // Reasoning enrichment extracted from between the marker tokens.
        assert!(message.contains("20 21"));
        assert!(message.contains("Being laconic"));
    }
    assert_eq!(repo.commits_on("workerA_TestCase_greeter")[0].content, "65 66");
    assert_eq!(repo.commits_on("workerB_TestCase_greeter")[0].content, "67");
}

#[tokio::test]
async fn test_polling_is_idempotent() {
    let (repo, runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);

    orchestrator.tick().await;
    // The worker branches the round just created appear as events on the
    // next poll; they must not trigger another round.
    orchestrator.tick().await;
    orchestrator.tick().await;

    assert_eq!(repo.commits_on("workerA_TestCase_greeter").len(), 1);
    assert_eq!(repo.commits_on("workerB_TestCase_greeter").len(), 1);
    // One load per distinct checkpoint, all served from the model cache after.
    assert_eq!(runtime.loads(), 3);
}

#[tokio::test]
async fn test_targeted_feedback_reaches_one_worker() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;

    repo.add_note(
        "n2",
        "c2",
        "task_branch: workerA_TestCase_greeter\nUse setUp method",
        20,
    );
    orchestrator.tick().await;

    let worker_a = repo.commits_on("workerA_TestCase_greeter");
    assert_eq!(worker_a.len(), 2);
    assert_eq!(worker_a[1].message, "Use setUp method");
    assert_eq!(repo.commits_on("workerB_TestCase_greeter").len(), 1);
}

#[tokio::test]
async fn test_feedback_routed_by_containing_commit() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;

    repo.add_note("n3", "c3", "Avoid mocks", 30);
    repo.set_containing("c3", &["main", "TestCase_greeter"]);
    orchestrator.tick().await;

    let worker_a = repo.commits_on("workerA_TestCase_greeter");
    let worker_b = repo.commits_on("workerB_TestCase_greeter");
    assert_eq!(worker_a.len(), 2);
    assert_eq!(worker_b.len(), 2);
    assert_eq!(worker_a[1].message, "Avoid mocks");
    assert_eq!(worker_b[1].message, "Avoid mocks");
}

#[tokio::test]
async fn test_revert_replays_cached_response() {
    let (repo, runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;

    repo.add_note(
        "n2",
        "c2",
        "task_branch: workerA_TestCase_greeter\nUse setUp method",
        20,
    );
    orchestrator.tick().await;
    let generations_before = runtime.generations("workerA");

    repo.remove_note("n2");
    orchestrator.tick().await;

    let worker_a = repo.commits_on("workerA_TestCase_greeter");
    assert_eq!(worker_a.len(), 3);
    assert_eq!(worker_a[2].message, "Revert: Use setUp method");
    // The reverted prompt equals the original one, so the response comes from
    // the cache without another generation.
    assert_eq!(worker_a[2].content, worker_a[0].content);
    assert_eq!(runtime.generations("workerA"), generations_before);
}

#[tokio::test]
async fn test_feature_removal_decommissions_task() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;

    repo.remove_branch("TestCase_greeter");
    orchestrator.tick().await;

    assert!(!repo.branch_exists("workerA_TestCase_greeter"));
    assert!(!repo.branch_exists("workerB_TestCase_greeter"));

    // Late feedback for the dead task is dropped without effect.
    repo.add_note("n4", "c4", "task_branch: TestCase_greeter\nMore tests", 40);
    orchestrator.tick().await;
    assert!(repo.commits_on("workerA_TestCase_greeter").is_empty());
}

#[tokio::test]
async fn test_malformed_initial_annotation_keeps_task_pending() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note(
        "n1",
        "c1",
        "task_branch: TestCase_greeter, source: greeter.py",
        10,
    );

    orchestrator.tick().await;
    assert!(orchestrator.is_pending("TestCase_greeter"));
    assert!(!repo.branch_exists("workerA_TestCase_greeter"));

    // A corrected annotation instantiates the task; the malformed one is
    // never retried.
    repo.add_note("n2", "c2", INITIAL_NOTE, 20);
    orchestrator.tick().await;
    assert!(!orchestrator.is_pending("TestCase_greeter"));
    assert_eq!(repo.commits_on("workerA_TestCase_greeter").len(), 1);
}

#[tokio::test]
async fn test_initial_annotation_removal_resets_task() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;
    assert!(repo.branch_exists("workerA_TestCase_greeter"));

    repo.remove_note("n1");
    orchestrator.tick().await;

    assert!(orchestrator.is_pending("TestCase_greeter"));
    assert!(!repo.branch_exists("workerA_TestCase_greeter"));
    assert!(!repo.branch_exists("workerB_TestCase_greeter"));
}

#[tokio::test]
async fn test_unresolvable_note_is_dropped_without_effect() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;

    // No declaration and the annotated commit sits only on unmanaged
    // branches, so the note cannot be routed anywhere.
    repo.add_note("n5", "c5", "Avoid mocks", 50);
    repo.set_containing("c5", &["main"]);
    orchestrator.tick().await;

    assert_eq!(repo.commits_on("workerA_TestCase_greeter").len(), 1);
    assert_eq!(repo.commits_on("workerB_TestCase_greeter").len(), 1);

    // Routing still works afterwards.
    repo.add_note("n6", "c6", "task_branch: TestCase_greeter\nAvoid mocks", 60);
    orchestrator.tick().await;
    assert_eq!(repo.commits_on("workerA_TestCase_greeter").len(), 2);
}

#[tokio::test]
async fn test_unreachable_repository_pauses_observation() {
    let (repo, _runtime, mut orchestrator) = setup();
    repo.add_branch("TestCase_greeter");
    repo.add_note("n1", "c1", INITIAL_NOTE, 10);
    orchestrator.tick().await;

    repo.set_unreachable(true);
    assert_eq!(orchestrator.tick().await, 0);

    repo.set_unreachable(false);
    orchestrator.tick().await;
    // Nothing changed while offline, so nothing replays.
    assert_eq!(repo.commits_on("workerA_TestCase_greeter").len(), 1);
}
