use super::*;
use serde_json::json;

#[test]
fn test_request_omits_absent_fields() {
    let req = CdpRequest {
        id: 1,
        method: "Page.navigate",
        params: Some(json!({"url": "https://ssl.jobcan.jp/jbcoauth/login"})),
        session_id: None,
    };
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value["method"], "Page.navigate");
    assert!(value.get("sessionId").is_none());

    let routed = CdpRequest {
        id: 7,
        method: "Runtime.evaluate",
        params: None,
        session_id: Some("S1"),
    };
    let value = serde_json::to_value(&routed).unwrap();
    assert_eq!(value["sessionId"], "S1");
    assert!(value.get("params").is_none());
}

#[test]
fn test_reply_into_result() {
    let ok: CdpMessage = serde_json::from_str(r#"{"id": 1, "result": {"frameId": "F"}}"#).unwrap();
    assert_eq!(ok.into_result().unwrap()["frameId"], "F");

    let empty: CdpMessage = serde_json::from_str(r#"{"id": 2}"#).unwrap();
    assert_eq!(empty.into_result().unwrap(), Value::Null);

    let failed: CdpMessage = serde_json::from_str(
        r#"{"id": 3, "error": {"code": -32000, "message": "No node found", "data": "x"}}"#,
    )
    .unwrap();
    match failed.into_result() {
        Err(CdpError::Protocol { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "No node found");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_dialog_event() {
    let msg: CdpMessage = serde_json::from_str(
        r#"{
            "method": "Page.javascriptDialogOpening",
            "params": {"url": "https://app.slack.com", "message": "Open in app?", "type": "confirm", "hasBrowserHandler": false},
            "sessionId": "S1"
        }"#,
    )
    .unwrap();

    assert!(msg.is_event("Page.javascriptDialogOpening"));
    assert!(!msg.is_event("Page.loadEventFired"));
    assert_eq!(msg.session_id.as_deref(), Some("S1"));

    let dialog: DialogOpening = msg.event_params().unwrap();
    assert_eq!(dialog.kind, "confirm");
    assert!(msg.event_params::<TargetDestroyed>().is_none());
}

#[test]
fn test_lifecycle_event() {
    let msg: CdpMessage = serde_json::from_str(
        r#"{
            "method": "Page.lifecycleEvent",
            "params": {"frameId": "F1", "loaderId": "L2", "name": "DOMContentLoaded", "timestamp": 12.5},
            "sessionId": "S1"
        }"#,
    )
    .unwrap();

    let event: PageLifecycle = msg.event_params().unwrap();
    assert_eq!(event.loader_id, "L2");
    assert_eq!(event.name, "DOMContentLoaded");
}

#[test]
fn test_target_info_ignores_extra_keys() {
    let info: TargetInfo = serde_json::from_str(
        r#"{
            "targetId": "T1", "type": "page", "title": "Slack", "url": "https://app.slack.com/",
            "attached": true, "browserContextId": "C1", "canAccessOpener": false
        }"#,
    )
    .unwrap();
    assert!(info.is_page());
    assert_eq!(info.browser_context_id.as_deref(), Some("C1"));
}

#[test]
fn test_input_enums_serialize_camel_case() {
    assert_eq!(json!(MouseButton::Left), json!("left"));
    assert_eq!(json!(MouseEventType::MousePressed), json!("mousePressed"));
    assert_eq!(json!(KeyEventType::KeyUp), json!("keyUp"));
}

#[test]
fn test_named_keys() {
    let enter = KeyDefinition::named("Enter").unwrap();
    assert_eq!(enter.key_code, 13);
    assert_eq!(enter.text, Some("\r"));
    assert_eq!(KeyDefinition::named("Tab").map(|k| k.key_code), Some(9));
    assert!(KeyDefinition::named("F13").is_none());
}
