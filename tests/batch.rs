//! Batch runner end to end: queue file in, report and research logs out

use swarm_testbed::Settings;
use swarm_testbed::map::MapDefinition;
use swarm_testbed::queue::{BatchRunner, PermutationSet, TestConfig, TestQueue};
use swarm_testbed::results::BatchReport;
use swarm_testbed::sim::SimContext;

fn context(dir: &std::path::Path) -> SimContext {
    let maps = dir.join("maps");
    MapDefinition::open("field", 300.0, 300.0)
        .save(&maps.join("field.json"))
        .unwrap();
    let ctx = SimContext::with_settings(Settings {
        maps_dir: maps,
        log_dir: dir.join("logs"),
        write_run_logs: true,
        ..Settings::default()
    });
    assert_eq!(ctx.load_maps().unwrap(), 1);
    ctx
}

#[test]
fn test_queue_file_runs_with_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());

    let mut queue = TestQueue::new();
    for behaviour in ["Flocking", "Pheromone Avoidance", "No Such Behaviour", "DSPBehaviour"] {
        let mut config = TestConfig::new(behaviour, "Small", "field", 4, 0.5);
        config.num_targets = 10;
        config.target_type = "Tree".to_string();
        queue.push(config);
    }
    queue.save(&dir.path().join("queue")).unwrap();

    let mut queue = TestQueue::load(&dir.path().join("queue.json")).unwrap();
    let report = BatchRunner::new(ctx).run_queue(&mut queue);

    assert_eq!(report.len(), 4);
    assert_eq!(report.succeeded(), 3);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed[0].behaviour, "No Such Behaviour");
    assert!(failed[0].log_file.is_none());
    let logs: Vec<String> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(logs.len(), 3, "{logs:?}");
    assert!(logs.iter().all(|name| !name.contains("No Such Behaviour")));

    for run in report.runs.iter().filter(|r| r.succeeded()) {
        assert!(run.sim_time >= 0.5);
        let log = std::fs::read_to_string(run.log_file.as_ref().unwrap()).unwrap();
        assert!(log.lines().count() > 1);
    }

    let path = dir.path().join("report.json");
    report.save(&path).unwrap();
    assert_eq!(BatchReport::load(&path).unwrap().runs.len(), 4);
}

#[test]
fn test_sweep_expands_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());

    let sweep = PermutationSet::new(
        vec!["Alignment Weight".to_string(), "Cohesion Weight".to_string()],
        vec![vec![0.5, 1.0, 1.5], vec![0.2, 0.4, 0.6]],
    );
    let sweep_path = dir.path().join("sweep.json");
    sweep.save(&sweep_path).unwrap();

    let base = TestConfig::new("Flocking", "Small", "field", 2, 0.1);
    let mut queue = TestQueue::new();
    let added = queue
        .add_permuted_tests(
            &base,
            &PermutationSet::load(&sweep_path).unwrap(),
            &ctx.behaviours.borrow(),
            ctx.settings.max_permutations,
        )
        .unwrap();
    assert_eq!(added, 9);

    let report = BatchRunner::new(ctx).run_queue(&mut queue);
    assert_eq!(report.succeeded(), 9);
}
