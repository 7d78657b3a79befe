mod helpers;

use trackway::domain::errors::TrackerError;
use trackway::domain::models::wire::{V1Benchmark, V1BenchmarkEval, V1TaskTemplate};
use trackway::domain::models::Principal;

use helpers::test_state_as;

fn template(description: &str) -> V1TaskTemplate {
    serde_json::from_value(serde_json::json!({ "description": description }))
        .expect("valid template body")
}

fn benchmark(name: &str, templates: Vec<V1TaskTemplate>) -> V1Benchmark {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "description": "benchmark under test",
        "tasks": serde_json::to_value(templates).unwrap(),
    }))
    .expect("valid benchmark body")
}

#[tokio::test]
async fn test_benchmark_round_trip_stamps_templates() {
    let (state, _dir) = test_state_as("bench@x.com").await;
    let principal = Principal::new("bench@x.com");

    let created = state
        .benchmarks
        .create_benchmark(
            benchmark("test-bench", vec![template("desktop"), template("mobile")]),
            &principal,
        )
        .await
        .unwrap();

    let loaded = state
        .benchmarks
        .get_benchmark(&created.id, &principal)
        .await
        .unwrap();
    assert_eq!(loaded.name, "test-bench");
    assert_eq!(loaded.tasks.len(), 2);
    for tpl in &loaded.tasks {
        assert_eq!(tpl.labels.get("benchmark").map(String::as_str), Some("test-bench"));
    }
}

#[tokio::test]
async fn test_benchmark_name_is_unique() {
    let (state, _dir) = test_state_as("bench@x.com").await;
    let principal = Principal::new("bench@x.com");

    state
        .benchmarks
        .create_benchmark(benchmark("taken", vec![template("one")]), &principal)
        .await
        .unwrap();
    let result = state
        .benchmarks
        .create_benchmark(benchmark("taken", vec![template("two")]), &principal)
        .await;
    assert!(matches!(result, Err(TrackerError::Conflict(_))));
}

#[tokio::test]
async fn test_eval_materialises_labelled_assigned_tasks() {
    let (state, _dir) = test_state_as("bench@x.com").await;
    let principal = Principal::new("bench@x.com");

    let created = state
        .benchmarks
        .create_benchmark(
            benchmark("test-bench", vec![template("desktop"), template("mobile")]),
            &principal,
        )
        .await
        .unwrap();

    let (eval, bench) = state
        .benchmarks
        .create_eval(
            &created.id,
            V1BenchmarkEval {
                assigned_to: Some("test_agent".into()),
                assigned_type: Some("pizza".into()),
            },
            &principal,
        )
        .await
        .unwrap();

    assert_eq!(bench.id, created.id);
    assert_eq!(eval.tasks.len(), 2);
    for task in &eval.tasks {
        assert_eq!(task.assigned_to.as_deref(), Some("test_agent"));
        assert_eq!(task.assigned_type.as_deref(), Some("pizza"));
        assert_eq!(task.labels.get("benchmark").map(String::as_str), Some("test-bench"));
    }

    // The eval reloads with its materialised tasks intact.
    let (reloaded, _) = state.benchmarks.get_eval(&eval.id, &principal).await.unwrap();
    assert_eq!(reloaded.tasks.len(), 2);
    for task in &reloaded.tasks {
        assert!(state.tasks.get(&task.id, &principal).await.is_ok());
    }
}

#[tokio::test]
async fn test_delete_benchmark_removes_templates() {
    let (state, _dir) = test_state_as("bench@x.com").await;
    let principal = Principal::new("bench@x.com");

    let created = state
        .benchmarks
        .create_benchmark(benchmark("short-lived", vec![template("only")]), &principal)
        .await
        .unwrap();
    state
        .benchmarks
        .delete_benchmark(&created.id, &principal)
        .await
        .unwrap();
    assert!(matches!(
        state.benchmarks.get_benchmark(&created.id, &principal).await,
        Err(TrackerError::NotFound(_))
    ));
}
