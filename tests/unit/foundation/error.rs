use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SceneifyError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        SceneifyError::protocol("x")
            .to_string()
            .contains("protocol error:")
    );
    assert!(
        SceneifyError::name_conflict("Main", "input of kind color_source_v3 already exists")
            .to_string()
            .contains("name conflict for 'Main'")
    );
}

#[test]
fn ambiguity_report_names_every_source() {
    let err = SceneifyError::AmbiguousLink {
        scene: "Main".to_string(),
        multiple: vec!["Camera".to_string()],
        missing: vec!["Color".to_string(), "Mic".to_string()],
    };
    let msg = err.to_string();
    assert!(msg.starts_with("failed to link scene 'Main':"));
    assert!(msg.contains("multiple items of sources 'Camera'."));
    assert!(msg.contains("no items of sources 'Color', 'Mic'."));
}

#[test]
fn ambiguity_report_omits_empty_sections() {
    let err = SceneifyError::AmbiguousLink {
        scene: "Main".to_string(),
        multiple: vec![],
        missing: vec!["Color".to_string()],
    };
    assert!(!err.to_string().contains("multiple"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SceneifyError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
