use pulsar_events::kinds::{
    BranchArm, BranchEvent, CommentEvent, LinkEvent, RepeatEvent, StandardEvent,
};
use pulsar_events::persist::{load_forest_file, save_forest_file, snapshot_forest};
use pulsar_events::{
    load_forest_json, save_forest_json, EventBehavior, EventForest, EventNode, EventRegistry,
    Instruction, ProfileSample,
};
use std::time::Duration;

fn sample_forest() -> EventForest {
    let mut folded = EventNode::new(
        StandardEvent::new()
            .with_condition(Instruction::new("key_pressed").with_parameter("Space"))
            .with_action(Instruction::new("jump")),
    )
    .with_sub_events([
        EventNode::new(CommentEvent::new("landing")),
        EventNode::new(RepeatEvent::new("3").with_action(Instruction::new("blink")))
            .with_sub_events([EventNode::new(StandardEvent::new()).disabled()]),
    ]);
    folded.set_folded(true);

    vec![
        folded,
        EventNode::new(
            BranchEvent::new()
                .with_arm(BranchArm::new().with_condition(Instruction::new("hurt").invert()))
                .with_otherwise(Instruction::new("idle")),
        ),
        EventNode::new(LinkEvent::new("common")),
    ]
    .into()
}

fn assert_same_forest(a: &EventForest, b: &EventForest) {
    assert_eq!(a.len(), b.len());
    for (left, right) in a.iter().zip(b.iter()) {
        assert!(left.structurally_eq(right), "{:?} != {:?}", left, right);
    }
}

#[test]
fn test_json_round_trip() {
    let forest = sample_forest();
    let registry = EventRegistry::with_builtin_kinds();

    let json = save_forest_json(&forest).unwrap();
    let restored = load_forest_json(&registry, &json).unwrap();

    assert_eq!(restored.count_nodes(), forest.count_nodes());
    assert_same_forest(&restored, &forest);
    assert!(restored[0].is_folded());
    assert!(restored[0].sub_events()[1].sub_events()[0].is_disabled());
    assert_eq!(snapshot_forest(&restored), snapshot_forest(&forest));
}

#[test]
fn test_profiling_and_lineage_not_persisted() {
    let forest = sample_forest();
    forest[0]
        .handle()
        .publish(ProfileSample::new(Duration::from_millis(10), 50.0));
    let copy = forest.clone_remembering_original();

    let restored =
        load_forest_json(&EventRegistry::default(), &save_forest_json(&copy).unwrap()).unwrap();

    assert_eq!(restored[0].profile(), ProfileSample::default());
    assert!(restored[0].original_event().is_none());
}

#[test]
fn test_unknown_kind_is_rejected() {
    let json = r#"{ "version": 1, "events": [ { "type": "Custom::Teleport", "depth": 0 } ] }"#;
    let err = load_forest_json(&EventRegistry::with_builtin_kinds(), json).unwrap_err();
    assert!(format!("{:#}", err).contains("Custom::Teleport"));
}

#[test]
fn test_custom_kind_round_trip() {
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Marker {
        label: String,
    }

    impl EventBehavior for Marker {
        fn kind(&self) -> &'static str {
            "Custom::Marker"
        }

        fn payload(&self) -> serde_json::Value {
            serde_json::to_value(self).unwrap()
        }

        fn clone_box(&self) -> Box<dyn EventBehavior> {
            Box::new(self.clone())
        }
    }

    let registry = EventRegistry::with_builtin_kinds();
    registry.register("Custom::Marker", pulsar_events::registry::payload_factory::<Marker>);

    let forest: EventForest = vec![EventNode::new(Marker {
        label: "checkpoint".to_string(),
    })]
    .into();
    let restored = load_forest_json(&registry, &save_forest_json(&forest).unwrap()).unwrap();

    assert_eq!(restored[0].kind(), "Custom::Marker");
    assert_eq!(restored[0].behavior().payload()["label"], "checkpoint");
}

#[test]
fn test_deep_forest_round_trip() {
    let mut node = EventNode::new(StandardEvent::new());
    for _ in 0..5_000 {
        node = EventNode::new(StandardEvent::new()).with_sub_events([node]);
    }
    let forest: EventForest = vec![node].into();

    let json = save_forest_json(&forest).unwrap();
    let restored = load_forest_json(&EventRegistry::with_builtin_kinds(), &json).unwrap();

    assert_eq!(restored.count_nodes(), 5_001);
    assert!(restored[0].structurally_eq(&forest[0]));
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenes").join("level1.events.json");
    let forest = sample_forest();

    save_forest_file(&forest, &path).unwrap();
    let restored = load_forest_file(&EventRegistry::with_builtin_kinds(), &path).unwrap();

    assert_same_forest(&restored, &forest);
    let missing = dir.path().join("missing.json");
    assert!(load_forest_file(&EventRegistry::with_builtin_kinds(), &missing).is_err());
}
