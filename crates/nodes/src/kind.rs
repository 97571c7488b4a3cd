//! Node kinds and the node-type registry.
//!
//! [`NodeKind`] is the closed set of node variants, each carrying its own
//! configuration shape.  [`NodeType`] is the fieldless tag of a kind and
//! answers the structural questions the validator and the controller ask:
//! which category a node belongs to, how many inputs it takes, and which
//! output handles it can fire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Handle names
// ---------------------------------------------------------------------------

pub const HANDLE_OUTPUT: &str = "output";
pub const HANDLE_SUCCESS: &str = "success";
pub const HANDLE_ERROR: &str = "error";
pub const HANDLE_TRUE: &str = "true";
pub const HANDLE_FALSE: &str = "false";

/// Default key used when an upstream edge carries no source handle.
pub const HANDLE_INPUT: &str = "input";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Broad grouping shown in the node palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Trigger,
    Action,
    Logic,
}

/// Tag of a [`NodeKind`] without its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    ManualTrigger,
    WebhookTrigger,
    HttpRequest,
    SendEmail,
    SendSms,
    Delay,
    Condition,
    Transform,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::ManualTrigger,
        NodeType::WebhookTrigger,
        NodeType::HttpRequest,
        NodeType::SendEmail,
        NodeType::SendSms,
        NodeType::Delay,
        NodeType::Condition,
        NodeType::Transform,
    ];

    pub fn category(self) -> NodeCategory {
        match self {
            NodeType::ManualTrigger | NodeType::WebhookTrigger => NodeCategory::Trigger,
            NodeType::HttpRequest | NodeType::SendEmail | NodeType::SendSms => NodeCategory::Action,
            NodeType::Delay | NodeType::Condition | NodeType::Transform => NodeCategory::Logic,
        }
    }

    /// Number of input ports: triggers take none, everything else one.
    pub fn input_ports(self) -> usize {
        match self.category() {
            NodeCategory::Trigger => 0,
            NodeCategory::Action | NodeCategory::Logic => 1,
        }
    }

    /// Every handle this type can fire, in declaration order.
    pub fn output_handles(self) -> &'static [&'static str] {
        match self {
            NodeType::ManualTrigger
            | NodeType::WebhookTrigger
            | NodeType::Delay
            | NodeType::Transform => &[HANDLE_OUTPUT],
            NodeType::HttpRequest | NodeType::SendEmail | NodeType::SendSms => {
                &[HANDLE_SUCCESS, HANDLE_ERROR]
            }
            NodeType::Condition => &[HANDLE_TRUE, HANDLE_FALSE],
        }
    }

    /// Handle an edge leaves from when it names none.
    pub fn default_handle(self) -> &'static str {
        self.output_handles()[0]
    }

    pub fn has_handle(self, handle: &str) -> bool {
        self.output_handles().contains(&handle)
    }

    /// The handle failures are routed to, if this type has one.
    pub fn error_handle(self) -> Option<&'static str> {
        self.has_handle(HANDLE_ERROR).then_some(HANDLE_ERROR)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::ManualTrigger => "manual-trigger",
            NodeType::WebhookTrigger => "webhook-trigger",
            NodeType::HttpRequest => "http-request",
            NodeType::SendEmail => "send-email",
            NodeType::SendSms => "send-sms",
            NodeType::Delay => "delay",
            NodeType::Condition => "condition",
            NodeType::Transform => "transform",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Per-kind configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualTriggerConfig {
    /// Sample data the trigger emits, merged into its payload.
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookTriggerConfig {
    pub path: String,
    pub method: String,
    /// Simulated request body.
    pub payload: Map<String, Value>,
}

impl Default for WebhookTriggerConfig {
    fn default() -> Self {
        Self {
            path: "/webhook".into(),
            method: "POST".into(),
            payload: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRequestConfig {
    pub url: String,
    pub method: String,
    pub headers: Map<String, Value>,
    pub body: Option<Value>,
}

impl Default for HttpRequestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".into(),
            headers: Map::new(),
            body: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendEmailConfig {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendSmsConfig {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    pub fn millis_per_unit(self) -> f64 {
        match self {
            DelayUnit::Milliseconds => 1.0,
            DelayUnit::Seconds => 1_000.0,
            DelayUnit::Minutes => 60_000.0,
            DelayUnit::Hours => 3_600_000.0,
            DelayUnit::Days => 86_400_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub duration: f64,
    pub unit: DelayUnit,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            duration: 1.0,
            unit: DelayUnit::Seconds,
        }
    }
}

/// Comparison applied by a condition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    /// Anything unrecognised; evaluates the looked-up value's truthiness.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// Dot path into the node input, e.g. `user.address.city`.
    pub expression: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOperation {
    Set,
    Delete,
    Rename,
    Uppercase,
    Lowercase,
    Trim,
    Concat,
    Split,
    Replace,
    Increment,
    Decrement,
    Multiply,
    Divide,
    /// Unrecognised operations leave the data untouched.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub field: String,
    pub operation: TransformOperation,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Transformation {
    pub fn new(field: impl Into<String>, operation: TransformOperation) -> Self {
        Self {
            field: field.into(),
            operation,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub transformations: Vec<Transformation>,
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// A node's type together with its configuration.
///
/// Serialised adjacently tagged, e.g.
/// `{"type": "delay", "config": {"duration": 2, "unit": "seconds"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "kebab-case")]
pub enum NodeKind {
    ManualTrigger(ManualTriggerConfig),
    WebhookTrigger(WebhookTriggerConfig),
    HttpRequest(HttpRequestConfig),
    SendEmail(SendEmailConfig),
    SendSms(SendSmsConfig),
    Delay(DelayConfig),
    Condition(ConditionConfig),
    Transform(TransformConfig),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::ManualTrigger(_) => NodeType::ManualTrigger,
            NodeKind::WebhookTrigger(_) => NodeType::WebhookTrigger,
            NodeKind::HttpRequest(_) => NodeType::HttpRequest,
            NodeKind::SendEmail(_) => NodeType::SendEmail,
            NodeKind::SendSms(_) => NodeType::SendSms,
            NodeKind::Delay(_) => NodeType::Delay,
            NodeKind::Condition(_) => NodeType::Condition,
            NodeKind::Transform(_) => NodeType::Transform,
        }
    }

    pub fn manual_trigger() -> Self {
        NodeKind::ManualTrigger(ManualTriggerConfig::default())
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn triggers_have_no_inputs() {
        for ty in NodeType::ALL {
            let expected = if ty.category() == NodeCategory::Trigger { 0 } else { 1 };
            assert_eq!(ty.input_ports(), expected, "{ty}");
        }
    }

    #[test]
    fn port_shapes_match_node_types() {
        assert_eq!(NodeType::Delay.output_handles(), &["output"]);
        assert_eq!(NodeType::HttpRequest.output_handles(), &["success", "error"]);
        assert_eq!(NodeType::Condition.output_handles(), &["true", "false"]);
        assert_eq!(NodeType::SendSms.error_handle(), Some("error"));
        assert_eq!(NodeType::Condition.error_handle(), None);
        assert!(!NodeType::Transform.has_handle("true"));
    }

    #[test]
    fn kind_deserialises_adjacently_tagged() {
        let kind: NodeKind = serde_json::from_value(json!({
            "type": "condition",
            "config": { "expression": "user.age", "operator": "greater_than", "value": 18 }
        }))
        .expect("valid condition");

        match kind {
            NodeKind::Condition(cfg) => {
                assert_eq!(cfg.expression, "user.age");
                assert_eq!(cfg.operator, ConditionOperator::GreaterThan);
                assert_eq!(cfg.value, json!(18));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn unrecognised_operators_fall_back() {
        let op: ConditionOperator = serde_json::from_value(json!("matches_regex")).unwrap();
        assert_eq!(op, ConditionOperator::Unknown);

        let op: TransformOperation = serde_json::from_value(json!("reverse")).unwrap();
        assert_eq!(op, TransformOperation::Unknown);
    }

    #[test]
    fn node_type_string_matches_serde_tag() {
        for ty in NodeType::ALL {
            assert_eq!(serde_json::to_value(ty).unwrap(), json!(ty.as_str()));
        }
    }
}
