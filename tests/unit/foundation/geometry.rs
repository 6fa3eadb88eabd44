use super::*;

#[test]
fn scale_patch_recomputes_rendered_size() {
    let mut t = Transform {
        source_width: 100.0,
        source_height: 50.0,
        ..Transform::default()
    };
    t.apply(&TransformPatch::new().scale(2.0, 3.0));
    assert_eq!(t.width, 200.0);
    assert_eq!(t.height, 150.0);
}

#[test]
fn patch_merges_only_present_fields() {
    let mut t = Transform {
        position_x: 5.0,
        rotation: 45.0,
        ..Transform::default()
    };
    t.apply(&TransformPatch::new().position(10.0, 20.0));
    assert_eq!(t.position_x, 10.0);
    assert_eq!(t.position_y, 20.0);
    assert_eq!(t.rotation, 45.0);
    assert_eq!(t.scale_x, 1.0);
}

#[test]
fn source_size_update_keeps_missing_dimension() {
    let mut t = Transform {
        scale_x: 0.5,
        scale_y: 2.0,
        source_width: 10.0,
        source_height: 10.0,
        ..Transform::default()
    };
    t.update_size_from_source(Some(400.0), None);
    assert_eq!(t.source_width, 400.0);
    assert_eq!(t.width, 200.0);
    assert_eq!(t.height, 20.0);
}

#[test]
fn empty_patch_serializes_to_empty_object() {
    let patch = TransformPatch::new();
    assert!(patch.is_empty());
    assert_eq!(serde_json::to_value(&patch).unwrap(), serde_json::json!({}));

    let patch = TransformPatch::new().position(1.0, 2.0);
    assert!(!patch.is_empty());
    assert_eq!(
        serde_json::to_value(&patch).unwrap(),
        serde_json::json!({ "positionX": 1.0, "positionY": 2.0 })
    );
}

#[test]
fn wire_transform_tolerates_missing_fields() {
    let t: Transform = serde_json::from_value(serde_json::json!({
        "positionX": 3.0,
        "scaleX": 2.0,
        "sourceWidth": 64.0
    }))
    .unwrap();
    assert_eq!(t.position_x, 3.0);
    assert_eq!(t.scale_y, 1.0);
    assert_eq!(t.bounds_type, BOUNDS_NONE);
}
