use super::*;

async fn call(backend: &MemoryBackend, method: &str, params: Value) -> Option<Value> {
    backend.call(method, params).await.unwrap()
}

#[tokio::test]
async fn placement_ids_are_allocated_per_scene() {
    let backend = MemoryBackend::new();
    call(&backend, "CreateScene", json!({ "sceneName": "A" })).await;
    call(&backend, "CreateScene", json!({ "sceneName": "B" })).await;

    let first = call(
        &backend,
        "CreateInput",
        json!({ "inputName": "Color", "inputKind": "color_source_v3", "sceneName": "A" }),
    )
    .await
    .unwrap();
    assert_eq!(first["sceneItemId"], 1);

    let second = call(
        &backend,
        "CreateSceneItem",
        json!({ "sceneName": "A", "sourceName": "Color" }),
    )
    .await
    .unwrap();
    assert_eq!(second["sceneItemId"], 2);

    let other = call(
        &backend,
        "CreateSceneItem",
        json!({ "sceneName": "B", "sourceName": "Color" }),
    )
    .await
    .unwrap();
    assert_eq!(other["sceneItemId"], 1);
}

#[tokio::test]
async fn missing_objects_answer_none() {
    let backend = MemoryBackend::new();
    assert!(call(&backend, "GetSourcePrivateSettings", json!({ "sourceName": "nope" })).await.is_none());
    assert!(call(&backend, "GetSceneItemList", json!({ "sceneName": "nope" })).await.is_none());
    assert!(
        call(
            &backend,
            "GetSceneItemTransform",
            json!({ "sceneName": "nope", "sceneItemId": 1 })
        )
        .await
        .is_none()
    );
}

#[tokio::test]
async fn duplicate_names_are_rejected_across_kinds() {
    let backend = MemoryBackend::new();
    call(&backend, "CreateScene", json!({ "sceneName": "Main" })).await;
    let err = backend
        .call(
            "CreateInput",
            json!({ "inputName": "Main", "inputKind": "color_source_v3", "sceneName": "Main" }),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BackendError::Request { code: status::RESOURCE_ALREADY_EXISTS, .. }
    ));
}

#[tokio::test]
async fn private_settings_merge_top_level_keys() {
    let backend = MemoryBackend::new();
    call(&backend, "CreateScene", json!({ "sceneName": "Main" })).await;
    call(
        &backend,
        "SetSourcePrivateSettings",
        json!({ "sourceName": "Main", "sourceSettings": { "REFS": { "Main": { "a": 1 } } } }),
    )
    .await;
    call(
        &backend,
        "SetSourcePrivateSettings",
        json!({ "sourceName": "Main", "sourceSettings": { "LINKED": true } }),
    )
    .await;

    let resp = call(&backend, "GetSourcePrivateSettings", json!({ "sourceName": "Main" }))
        .await
        .unwrap();
    assert_eq!(
        resp["sourceSettings"],
        json!({ "REFS": { "Main": { "a": 1 } }, "LINKED": true })
    );
}

#[tokio::test]
async fn transform_writes_recompute_rendered_size() {
    let backend = MemoryBackend::new();
    call(&backend, "CreateScene", json!({ "sceneName": "Main" })).await;
    call(
        &backend,
        "CreateInput",
        json!({
            "inputName": "Color",
            "inputKind": "color_source_v3",
            "sceneName": "Main",
            "inputSettings": { "width": 100, "height": 50 }
        }),
    )
    .await;
    call(
        &backend,
        "SetSceneItemTransform",
        json!({ "sceneName": "Main", "sceneItemId": 1, "sceneItemTransform": { "scaleX": 2.0 } }),
    )
    .await;

    let state = backend.snapshot();
    let t = &state.scenes["Main"].items[0].transform;
    assert_eq!(t.width, 200.0);
    assert_eq!(t.height, 50.0);
}

#[tokio::test]
async fn volume_db_and_mul_stay_consistent() {
    let backend = MemoryBackend::new();
    call(&backend, "CreateScene", json!({ "sceneName": "Main" })).await;
    call(
        &backend,
        "CreateInput",
        json!({ "inputName": "Mic", "inputKind": "pulse_input_capture", "sceneName": "Main" }),
    )
    .await;
    call(
        &backend,
        "SetInputVolume",
        json!({ "inputName": "Mic", "inputVolumeDb": -20.0 }),
    )
    .await;

    let resp = call(&backend, "GetInputVolume", json!({ "inputName": "Mic" }))
        .await
        .unwrap();
    let mul = resp["inputVolumeMul"].as_f64().unwrap();
    let db = resp["inputVolumeDb"].as_f64().unwrap();
    assert!((mul - 0.1).abs() < 1e-9);
    assert!((db + 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn injected_failures_and_call_log() {
    let backend = MemoryBackend::new();
    backend.fail_on("CreateScene");
    let err = backend
        .call("CreateScene", json!({ "sceneName": "Main" }))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
    assert_eq!(backend.count("CreateScene"), 1);

    backend.clear_failures();
    call(&backend, "CreateScene", json!({ "sceneName": "Main" })).await;
    assert_eq!(backend.count("CreateScene"), 2);
    assert!(backend.snapshot().scenes.contains_key("Main"));
}

#[test]
fn snapshot_json_round_trips() {
    let backend = MemoryBackend::new();
    backend.with_state(|s| {
        s.scenes.insert("Main".to_string(), SceneRecord::default());
    });
    let json = serde_json::to_string(&backend.snapshot()).unwrap();
    let restored: MemoryState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, backend.snapshot());
}
