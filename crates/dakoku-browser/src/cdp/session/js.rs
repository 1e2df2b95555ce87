//! Runtime domain: evaluating script and walking the objects it returns.

use serde_json::{Value, json};

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{PropertyDescriptor, RemoteObject};

use super::PageSession;

impl PageSession {
    /// Run a Runtime command and surface a thrown exception as an error.
    async fn run_script(&self, method: &str, params: Value) -> Result<RemoteObject, CdpError> {
        let reply = self.call(method, Some(params)).await?;

        if let Some(details) = reply.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script threw");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(serde_json::from_value(reply["result"].clone())?)
    }

    /// Evaluate `expression` in the page, awaiting promises, and return its
    /// JSON value (`Null` for `undefined`).
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let object = self
            .run_script(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    /// Evaluate `expression` and keep the result in the page as a handle.
    pub async fn evaluate_handle(&self, expression: &str) -> Result<RemoteObject, CdpError> {
        self.run_script(
            "Runtime.evaluate",
            json!({ "expression": expression, "returnByValue": false }),
        )
        .await
    }

    /// Call `function` with `this` bound to a remote object.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function: &str,
        args: Option<Vec<Value>>,
    ) -> Result<Value, CdpError> {
        let arguments: Vec<Value> = args
            .unwrap_or_default()
            .into_iter()
            .map(|value| json!({ "value": value }))
            .collect();

        let object = self
            .run_script(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "arguments": arguments,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    /// Own properties of a remote object. Array elements are named "0", "1", ...
    pub async fn get_properties(&self, object_id: &str) -> Result<Vec<PropertyDescriptor>, CdpError> {
        let reply = self
            .call(
                "Runtime.getProperties",
                Some(json!({ "objectId": object_id, "ownProperties": true })),
            )
            .await?;
        Ok(serde_json::from_value(reply["result"].clone())?)
    }

    pub async fn release_object(&self, object_id: &str) -> Result<(), CdpError> {
        self.call("Runtime.releaseObject", Some(json!({ "objectId": object_id })))
            .await
            .map(|_| ())
    }
}
