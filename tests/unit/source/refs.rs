use super::*;
use serde_json::json;

#[test]
fn insert_overwrites_and_reports_previous() {
    let mut refs = RefMap::new();
    assert_eq!(refs.insert("S", "r", 7), None);
    assert_eq!(refs.insert("S", "r", 9), Some(7));
    assert_eq!(refs.get("S", "r"), Some(9));
    assert_eq!(refs.get("S", "other"), None);
    assert_eq!(refs.get("T", "r"), None);
}

#[test]
fn removing_last_ref_drops_scene_entry() {
    let mut refs = RefMap::new();
    refs.insert("S", "a", 1);
    refs.insert("S", "b", 2);
    assert_eq!(refs.remove("S", "a"), Some(1));
    assert!(refs.scene("S").is_some());
    assert_eq!(refs.remove("S", "b"), Some(2));
    assert!(refs.scene("S").is_none());
    assert!(refs.is_empty());
    assert_eq!(refs.remove("S", "b"), None);
}

#[test]
fn persisted_layout_is_nested_object() {
    let refs: RefMap = [
        ("Main".to_string(), "cam".to_string(), 3),
        ("Main".to_string(), "logo".to_string(), 5),
        ("Side".to_string(), "cam".to_string(), 1),
    ]
    .into_iter()
    .collect();

    assert_eq!(refs.len(), 3);
    assert_eq!(
        serde_json::to_value(&refs).unwrap(),
        json!({ "Main": { "cam": 3, "logo": 5 }, "Side": { "cam": 1 } })
    );
}

#[test]
fn from_private_reads_refs_key() {
    let settings = json!({ "REFS": { "Main": { "cam": 4 } }, "LINKED": false });
    let refs = RefMap::from_private(&settings).unwrap();
    assert_eq!(refs.get("Main", "cam"), Some(4));

    assert!(RefMap::from_private(&json!({})).unwrap().is_empty());
    assert!(RefMap::from_private(&json!({ "REFS": "nope" })).is_err());
}
