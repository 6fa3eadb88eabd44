use sceneify::{
    Compositor, Input, LinkOptions, MemoryBackend, Scene, SceneifyError, TransformPatch,
};
use serde_json::{Value, json};

/// Compositor holding scene "Main" with one "Color" and one "Mic" placement, made by hand.
async fn populated() -> Compositor<MemoryBackend> {
    let obs = Compositor::new(MemoryBackend::new());
    obs.call("CreateScene", json!({ "sceneName": "Main" }))
        .await
        .unwrap();
    for (name, kind) in [("Color", "color_source_v3"), ("Mic", "pulse_input_capture")] {
        obs.call(
            "CreateInput",
            json!({
                "inputName": name,
                "inputKind": kind,
                "sceneName": "Main",
                "inputSettings": { "width": 100, "height": 100 },
            }),
        )
        .await
        .unwrap();
    }
    obs.backend().clear_calls();
    obs
}

fn declared(color_settings: Value) -> Scene {
    let color = Input::builder("Color", "color_source_v3")
        .settings(color_settings.as_object().cloned().unwrap_or_default())
        .build()
        .unwrap();
    let mic = Input::builder("Mic", "pulse_input_capture").build().unwrap();
    Scene::builder("Main")
        .item_with("bg", color, TransformPatch::new().position(50.0, 60.0))
        .unwrap()
        .item("mic", mic)
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn link_adopts_placements_without_provisioning() {
    let obs = populated().await;
    let scene = declared(json!({}));
    scene.link(&obs, LinkOptions::default()).await.unwrap();

    let backend = obs.backend();
    assert_eq!(backend.count("CreateScene"), 0);
    assert_eq!(backend.count("CreateInput"), 0);
    assert_eq!(backend.count("CreateSceneItem"), 0);
    assert_eq!(backend.count("SetSceneItemTransform"), 0);

    assert_eq!(scene.item("bg").unwrap().id(), 1);
    assert_eq!(scene.item("mic").unwrap().id(), 2);
    assert_eq!(scene.item("bg").unwrap().transform().width, 100.0);
    assert!(scene.initialized());
    assert!(scene.exists());
    assert_eq!(scene.linked(), Some(true));
    assert_eq!(backend.snapshot().scenes["Main"].private["LINKED"], json!(true));
    assert!(obs.scene("Main").is_some());
}

#[tokio::test]
async fn link_pushes_declared_state_on_request() {
    let obs = populated().await;
    let scene = declared(json!({ "color": 4278190335u32 }));
    let options = LinkOptions {
        set_properties: true,
        set_source_settings: true,
    };
    scene.link(&obs, options).await.unwrap();

    let state = obs.backend().snapshot();
    let bg = &state.scenes["Main"].items[0];
    assert_eq!((bg.transform.position_x, bg.transform.position_y), (50.0, 60.0));
    assert_eq!(state.inputs["Color"].settings["color"], 4278190335u32);
    // Merged, not replaced.
    assert_eq!(state.inputs["Color"].settings["width"], 100);

    // The mic declares no transform, so only one transform push is made.
    assert_eq!(obs.backend().count("SetSceneItemTransform"), 1);
    assert_eq!(scene.item("bg").unwrap().transform().position_x, 50.0);
}

#[tokio::test]
async fn link_reports_every_ambiguity_at_once() {
    let obs = populated().await;
    obs.call(
        "CreateSceneItem",
        json!({ "sceneName": "Main", "sourceName": "Color" }),
    )
    .await
    .unwrap();

    let cam = Input::builder("Cam", "v4l2_input").build().unwrap();
    let scene = Scene::builder("Main")
        .item("bg", Input::builder("Color", "color_source_v3").build().unwrap())
        .unwrap()
        .item("cam", cam)
        .unwrap()
        .build()
        .unwrap();

    let err = scene.link(&obs, LinkOptions::default()).await.unwrap_err();
    match &err {
        SceneifyError::AmbiguousLink {
            scene,
            multiple,
            missing,
        } => {
            assert_eq!(scene, "Main");
            assert_eq!(multiple, &["Color".to_string()]);
            assert_eq!(missing, &["Cam".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "failed to link scene 'Main': scene contains multiple items of sources 'Color'. \
         scene contains no items of sources 'Cam'."
    );

    // Nothing was adopted, so a corrected retry is allowed.
    assert!(!scene.initialized());
    assert!(scene.items().is_empty());
    assert!(obs.scene("Main").is_none());
}

#[tokio::test]
async fn link_to_missing_scene_fails() {
    let obs = Compositor::new(MemoryBackend::new());
    let err = Scene::builder("Nowhere")
        .build()
        .unwrap()
        .link(&obs, LinkOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SceneifyError::SceneNotFound(ref name) if name == "Nowhere"));
}

#[tokio::test]
async fn link_after_initialization_fails() {
    let obs = populated().await;
    let scene = declared(json!({}));
    scene.link(&obs, LinkOptions::default()).await.unwrap();

    let err = scene.link(&obs, LinkOptions::default()).await.unwrap_err();
    assert!(matches!(err, SceneifyError::AlreadyInitialized(_)));

    let created = Scene::builder("Other").build().unwrap();
    created.create(&obs).await.unwrap();
    let err = created.link(&obs, LinkOptions::default()).await.unwrap_err();
    assert!(matches!(err, SceneifyError::AlreadyInitialized(_)));
}

#[tokio::test]
async fn linked_scene_is_then_created_without_requests() {
    let obs = populated().await;
    let scene = declared(json!({}));
    scene.link(&obs, LinkOptions::default()).await.unwrap();
    obs.backend().clear_calls();

    scene.create(&obs).await.unwrap();
    assert!(obs.backend().calls().is_empty());
}

#[tokio::test]
async fn create_after_link_flips_linked_flag() {
    let obs = populated().await;
    declared(json!({})).link(&obs, LinkOptions::default()).await.unwrap();

    // A later run provisions the same scene instead of linking it.
    let second = Compositor::new(MemoryBackend::from_state(obs.backend().snapshot()));
    let scene = declared(json!({}));
    scene.create(&second).await.unwrap();

    assert_eq!(scene.linked(), Some(false));
    let state = second.backend().snapshot();
    assert_eq!(state.scenes["Main"].private["LINKED"], json!(false));
    // Link never wrote refs, so placements were made afresh next to the linked ones.
    assert_eq!(state.scenes["Main"].items.len(), 4);
}

#[tokio::test]
async fn source_declared_under_several_refs_is_reported_once() {
    let obs = populated().await;
    obs.call(
        "CreateSceneItem",
        json!({ "sceneName": "Main", "sourceName": "Color" }),
    )
    .await
    .unwrap();

    let color = Input::builder("Color", "color_source_v3").build().unwrap();
    let cam = Input::builder("Cam", "v4l2_input").build().unwrap();
    let scene = Scene::builder("Main")
        .item("left", color.clone())
        .unwrap()
        .item("right", color)
        .unwrap()
        .item("cam-a", cam.clone())
        .unwrap()
        .item("cam-b", cam)
        .unwrap()
        .build()
        .unwrap();

    let err = scene.link(&obs, LinkOptions::default()).await.unwrap_err();
    let SceneifyError::AmbiguousLink {
        multiple, missing, ..
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*multiple, ["Color"]);
    assert_eq!(*missing, ["Cam"]);
}

#[tokio::test]
async fn create_after_link_keeps_refs_persisted_for_other_scenes() {
    // An earlier run placed Color into "Side" and remembered it.
    let earlier = Compositor::new(MemoryBackend::new());
    let color = Input::builder("Color", "color_source_v3").build().unwrap();
    Scene::builder("Side")
        .item("bg", color)
        .unwrap()
        .build()
        .unwrap()
        .create(&earlier)
        .await
        .unwrap();
    earlier
        .call("CreateScene", json!({ "sceneName": "Main" }))
        .await
        .unwrap();
    earlier
        .call(
            "CreateSceneItem",
            json!({ "sceneName": "Main", "sourceName": "Color" }),
        )
        .await
        .unwrap();

    // This run adopts Color through a link, then reconciles "Side" with the same input.
    let obs = Compositor::new(MemoryBackend::from_state(earlier.backend().snapshot()));
    let color = Input::builder("Color", "color_source_v3").build().unwrap();
    let main = Scene::builder("Main")
        .item("bg", color.clone())
        .unwrap()
        .build()
        .unwrap();
    let side = Scene::builder("Side")
        .item("bg", color)
        .unwrap()
        .build()
        .unwrap();
    main.link(&obs, LinkOptions::default()).await.unwrap();
    side.create(&obs).await.unwrap();

    assert_eq!(obs.backend().count("CreateSceneItem"), 0);
    assert_eq!(side.item("bg").unwrap().id(), 1);
    assert_eq!(
        obs.backend().snapshot().inputs["Color"].private["REFS"],
        json!({ "Side": { "bg": 1 } })
    );
}
