use super::*;
use crate::input::Input;

fn color(name: &str) -> Input {
    Input::builder(name, "color_source_v3").build().unwrap()
}

#[test]
fn builder_keeps_schema_order() {
    let scene = Scene::builder("Main")
        .item("b", color("B"))
        .unwrap()
        .item_with("a", color("A"), TransformPatch::new().position(10.0, 0.0))
        .unwrap()
        .build()
        .unwrap();

    let refs: Vec<&str> = scene.schema().iter().map(|(r, _)| r.as_str()).collect();
    assert_eq!(refs, ["b", "a"]);
    assert!(scene.schema()[0].1.transform.is_empty());
    assert_eq!(scene.schema()[1].1.transform.position_x, Some(10.0));
    assert_eq!(scene.core().kind(), SCENE_KIND);
    assert!(!scene.initialized());
    assert!(!scene.exists());
}

#[test]
fn duplicate_item_ref_is_rejected() {
    let err = Scene::builder("Main")
        .item("x", color("A"))
        .unwrap()
        .item("x", color("B"))
        .unwrap_err();
    assert!(err.to_string().contains("duplicate item ref 'x'"));
}

#[test]
fn empty_names_are_rejected() {
    assert!(Scene::builder("  ").build().is_err());
    assert!(Scene::builder("Main").item("", color("A")).is_err());
}

#[test]
fn scene_cannot_place_source_of_its_own_name() {
    let err = Scene::builder("Main")
        .item("self", color("Main"))
        .unwrap()
        .build()
        .unwrap_err();
    assert!(matches!(err, SceneifyError::Validation(_)));
}

#[test]
fn item_lookup_on_unreconciled_scene_is_none() {
    let scene = Scene::builder("Main")
        .item("a", color("A"))
        .unwrap()
        .build()
        .unwrap();
    assert!(scene.item("a").is_none());
    assert!(scene.items().is_empty());
}
