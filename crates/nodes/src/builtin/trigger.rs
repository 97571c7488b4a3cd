//! Manual and webhook triggers: always succeed with a synthesized payload.

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::kind::{ManualTriggerConfig, WebhookTriggerConfig, HANDLE_OUTPUT};
use crate::NodeOutcome;

pub fn manual(config: &ManualTriggerConfig) -> NodeOutcome {
    let mut payload = trigger_envelope("manual");
    extend(&mut payload, &config.payload);
    NodeOutcome::fired(Value::Object(payload), HANDLE_OUTPUT)
}

pub fn webhook(config: &WebhookTriggerConfig) -> NodeOutcome {
    let mut payload = trigger_envelope("webhook");
    payload.insert("path".into(), json!(config.path));
    payload.insert("method".into(), json!(config.method));
    payload.insert("body".into(), Value::Object(config.payload.clone()));
    extend(&mut payload, &config.payload);
    NodeOutcome::fired(Value::Object(payload), HANDLE_OUTPUT)
}

fn trigger_envelope(trigger_type: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("triggered".into(), json!(true));
    payload.insert("trigger_type".into(), json!(trigger_type));
    payload.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
    payload
}

fn extend(payload: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (k, v) in extra {
        payload.insert(k.clone(), v.clone());
    }
}
