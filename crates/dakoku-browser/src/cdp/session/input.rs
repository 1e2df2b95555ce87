//! Input (mouse and keyboard) operations for CDP page session.

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{KeyDefinition, KeyEventType, MouseButton, MouseEventType};

use super::PageSession;

impl PageSession {
    /// Click at coordinates. `click_count` of 2 or 3 produces double/triple clicks.
    pub async fn click_at(&self, x: f64, y: f64, click_count: u32) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseMoved,
                "x": x,
                "y": y,
                "button": MouseButton::None,
            })),
        )
        .await?;

        for n in 1..=click_count.max(1) {
            for event_type in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
                self.call(
                    "Input.dispatchMouseEvent",
                    Some(json!({
                        "type": event_type,
                        "x": x,
                        "y": y,
                        "button": MouseButton::Left,
                        "clickCount": n,
                    })),
                )
                .await?;
            }
        }

        debug!("Clicked at ({}, {}) x{}", x, y, click_count);
        Ok(())
    }

    /// Insert text at the caret, replacing any selection.
    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        debug!("Typed {} characters", text.chars().count());
        Ok(())
    }

    /// Press and release a key on the focused element.
    pub async fn press_key(&self, key: &str) -> Result<(), CdpError> {
        let down = match KeyDefinition::named(key) {
            Some(def) => {
                let mut params = json!({
                    "type": KeyEventType::KeyDown,
                    "key": def.key,
                    "code": def.key,
                    "windowsVirtualKeyCode": def.key_code,
                    "nativeVirtualKeyCode": def.key_code,
                });
                if let Some(text) = def.text {
                    params["text"] = json!(text);
                    params["unmodifiedText"] = json!(text);
                }
                params
            }
            None => json!({
                "type": KeyEventType::KeyDown,
                "key": key,
            }),
        };

        let mut up = down.clone();
        up["type"] = json!(KeyEventType::KeyUp);
        if let Some(obj) = up.as_object_mut() {
            obj.remove("text");
            obj.remove("unmodifiedText");
        }

        self.call("Input.dispatchKeyEvent", Some(down)).await?;
        self.call("Input.dispatchKeyEvent", Some(up)).await?;
        Ok(())
    }
}
