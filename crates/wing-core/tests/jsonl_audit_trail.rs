use std::path::PathBuf;

use serde_json::{json, Value};
use wing_core::{Artifact, ArtifactKind, EventStore, ExecutionContext, FlowEngine, FlowEventKind,
                InMemoryFlowRepository, JsonlEventStore, PipelineError, StageDefinition, StageRunResult};

struct Touch {
    id: &'static str,
    path: PathBuf,
}

impl StageDefinition for Touch {
    fn id(&self) -> &str {
        self.id
    }

    fn base_params(&self) -> Value {
        json!({"path": self.path})
    }

    fn run(&self, _ctx: &ExecutionContext) -> StageRunResult {
        if let Err(e) = std::fs::write(&self.path, self.id) {
            return StageRunResult::Failure { error: PipelineError::io(&self.path, e) };
        }
        StageRunResult::Success { outputs: vec![Artifact::declared(ArtifactKind::Other, &self.path)] }
    }
}

#[test]
fn events_survive_reopening_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("events.jsonl");

    let store = JsonlEventStore::open(&log).unwrap();
    let mut engine = FlowEngine::builder(store, InMemoryFlowRepository::new())
        .first_stage(Touch { id: "geometry", path: dir.path().join("wing.stp") })
        .add_stage(Touch { id: "mesh", path: dir.path().join("mesh.cga") })
        .build();
    let flow_id = engine.run().unwrap();
    let before = engine.events_for(flow_id);

    let reopened = JsonlEventStore::open(&log).unwrap();
    let after = reopened.list(flow_id);
    assert_eq!(after.len(), before.len());
    assert_eq!(reopened.flow_ids(), vec![flow_id]);
    assert!(matches!(after.last().map(|e| &e.kind), Some(FlowEventKind::FlowCompleted { .. })));

    let text = std::fs::read_to_string(&log).unwrap();
    assert_eq!(text.lines().count(), after.len());
}
