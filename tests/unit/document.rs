use super::*;

const DOC: &str = r#"{
    "inputs": {
        "Color": { "kind": "color_source_v3", "settings": { "width": 200, "height": 500 } },
        "Mic": {
            "kind": "pulse_input_capture",
            "filters": [ { "name": "gain", "kind": "gain_filter", "settings": { "db": 3.0 } } ]
        }
    },
    "scenes": [
        {
            "name": "Main",
            "items": [
                { "ref": "bg", "source": "Color", "transform": { "positionX": 200 } },
                { "ref": "overlay", "source": "Overlay" }
            ]
        },
        {
            "name": "Overlay",
            "items": [ { "ref": "mic", "source": "Mic" }, { "ref": "bg", "source": "Color" } ]
        }
    ]
}"#;

#[test]
fn build_shares_sources_by_name() {
    let doc = SceneDocument::from_json(DOC).unwrap();
    let graph = doc.build().unwrap();

    assert_eq!(graph.scenes.len(), 2);
    let main = graph.scene("Main").unwrap();
    let overlay = graph.scene("Overlay").unwrap();

    let nested = main.schema()[1].1.source.as_scene().unwrap();
    assert_eq!(nested.name(), "Overlay");
    // The nested scene is the same instance as the top-level one.
    assert!(std::ptr::eq(nested.core(), overlay.core()));

    assert_eq!(main.schema()[0].1.transform.position_x, Some(200.0));
    assert_eq!(graph.inputs["Mic"].core().filters()[0].name(), "gain");
    assert_eq!(graph.inputs["Color"].settings()["width"], 200);
}

#[test]
fn unknown_source_is_rejected() {
    let doc = SceneDocument::from_json(
        r#"{ "scenes": [ { "name": "Main", "items": [ { "ref": "x", "source": "Nope" } ] } ] }"#,
    )
    .unwrap();
    let err = doc.build().unwrap_err();
    assert!(err.to_string().contains("unknown source 'Nope'"));
}

#[test]
fn scene_cycles_are_rejected() {
    let doc = SceneDocument::from_json(
        r#"{ "scenes": [
            { "name": "A", "items": [ { "ref": "b", "source": "B" } ] },
            { "name": "B", "items": [ { "ref": "a", "source": "A" } ] }
        ] }"#,
    )
    .unwrap();
    let err = doc.build().unwrap_err();
    assert!(err.to_string().contains("contains itself"));
}

#[test]
fn name_shared_by_input_and_scene_is_rejected() {
    let doc = SceneDocument::from_json(
        r#"{ "inputs": { "Main": { "kind": "color_source_v3" } }, "scenes": [ { "name": "Main" } ] }"#,
    )
    .unwrap();
    assert!(doc.build().is_err());
}

#[test]
fn malformed_json_is_a_validation_error() {
    let err = SceneDocument::from_json("{ \"scenes\": 3 }").unwrap_err();
    assert!(matches!(err, SceneifyError::Validation(_)));
}

#[test]
fn children_first_orders_nested_scenes_before_parents() {
    let doc = SceneDocument::from_json(
        r#"{ "scenes": [
            { "name": "Main", "items": [ { "ref": "o", "source": "Overlay" }, { "ref": "l", "source": "Lower" } ] },
            { "name": "Overlay", "items": [ { "ref": "l", "source": "Lower" } ] },
            { "name": "Lower" },
            { "name": "Spare" }
        ] }"#,
    )
    .unwrap();
    let graph = doc.build().unwrap();

    let order: Vec<String> = graph
        .children_first()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(order, ["Lower", "Overlay", "Main", "Spare"]);
}
