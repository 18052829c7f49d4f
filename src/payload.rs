//! Inbound payload shapes and tolerant field extraction.
//!
//! The same logical event arrives in two wire shapes depending on the model
//! family:
//!
//! - **JSON** (MQTT family): an untyped [`serde_json::Value`], usually an
//!   object, sometimes wrapped in a `body.data` envelope.
//! - **Attribute bag** (legacy XMPP family): a named element with string
//!   attributes and child elements, pre-parsed by the transport collaborator.
//!
//! Decoders never assume a closed schema. Field access goes through the
//! accessors below, which take a priority-ordered list of candidate keys and
//! accept the first that matches. Numeric wire fields arrive as strings or
//! numbers interchangeably, so all numeric access coerces defensively.

use serde_json::Value;
use std::collections::HashMap;

/// Pre-parsed XML element from the legacy transport: name, string attributes,
/// child elements.
#[derive(Debug, Clone, Default)]
pub struct AttrBag {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub children: Vec<AttrBag>,
}

impl AttrBag {
    /// Create an empty element with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute insertion
    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    /// Builder-style child insertion
    pub fn child(mut self, child: AttrBag) -> Self {
        self.children.push(child);
        self
    }
}

/// One inbound payload in either wire shape
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Attrs(AttrBag),
}

impl Payload {
    /// Wrap a JSON value
    pub fn json(value: Value) -> Self {
        Payload::Json(value)
    }

    /// Strip the `body.data` envelope the MQTT family wraps around most
    /// payloads. Returns the payload unchanged when no envelope is present.
    pub fn unwrap_envelope(self) -> Payload {
        if let Payload::Json(ref value) = self {
            if let Some(data) = value.pointer("/body/data") {
                return Payload::Json(data.clone());
            }
            if let Some(body) = value.get("body") {
                if body.is_object() && body.get("data").is_none() && body.get("code").is_some() {
                    // body without data: status-only response, keep the body
                    return Payload::Json(body.clone());
                }
            }
        }
        self
    }

    /// First matching key that holds a scalar, rendered as a string
    pub fn str_of(&self, keys: &[&str]) -> Option<String> {
        for key in keys {
            match self {
                Payload::Json(value) => {
                    if let Some(v) = value.get(*key) {
                        if let Some(s) = coerce_string(v) {
                            return Some(s);
                        }
                    }
                }
                Payload::Attrs(bag) => {
                    if let Some(s) = bag.attrs.get(*key) {
                        return Some(s.clone());
                    }
                }
            }
        }
        None
    }

    /// First matching key coerced to f64 (string-or-number)
    pub fn f64_of(&self, keys: &[&str]) -> Option<f64> {
        for key in keys {
            match self {
                Payload::Json(value) => {
                    if let Some(n) = value.get(*key).and_then(coerce_f64) {
                        return Some(n);
                    }
                }
                Payload::Attrs(bag) => {
                    if let Some(n) = bag.attrs.get(*key).and_then(|s| parse_f64(s)) {
                        return Some(n);
                    }
                }
            }
        }
        None
    }

    /// First matching key coerced to i64 (string-or-number)
    pub fn i64_of(&self, keys: &[&str]) -> Option<i64> {
        self.f64_of(keys).map(|n| n as i64)
    }

    /// First matching key coerced to bool (`true`/`false`, 0/1)
    pub fn bool_of(&self, keys: &[&str]) -> Option<bool> {
        for key in keys {
            let parsed = match self {
                Payload::Json(value) => value.get(*key).and_then(coerce_bool),
                Payload::Attrs(bag) => bag.attrs.get(*key).and_then(|s| parse_bool(s)),
            };
            if parsed.is_some() {
                return parsed;
            }
        }
        None
    }

    /// Whether any of the keys is present at all
    pub fn has(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| match self {
            Payload::Json(value) => value.get(*key).is_some(),
            Payload::Attrs(bag) => bag.attrs.contains_key(*key),
        })
    }

    /// The payload itself as a scalar string, for JSON payloads that are a
    /// bare string or number rather than an object.
    pub fn as_scalar(&self) -> Option<String> {
        match self {
            Payload::Json(value) => coerce_string(value),
            Payload::Attrs(_) => None,
        }
    }

    /// Substructure lookup: JSON object field, or first child element with a
    /// matching name.
    pub fn sub(&self, key: &str) -> Option<Payload> {
        match self {
            Payload::Json(value) => value.get(key).map(|v| Payload::Json(v.clone())),
            Payload::Attrs(bag) => bag
                .children
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(key))
                .map(|c| Payload::Attrs(c.clone())),
        }
    }

    /// All substructures under a key: JSON array elements, or every child
    /// element with a matching name.
    pub fn sub_list(&self, key: &str) -> Vec<Payload> {
        match self {
            Payload::Json(value) => match value.get(key) {
                Some(Value::Array(items)) => {
                    items.iter().map(|v| Payload::Json(v.clone())).collect()
                }
                Some(other) => vec![Payload::Json(other.clone())],
                None => Vec::new(),
            },
            Payload::Attrs(bag) => bag
                .children
                .iter()
                .filter(|c| c.name.eq_ignore_ascii_case(key))
                .map(|c| Payload::Attrs(c.clone()))
                .collect(),
        }
    }
}

/// Render a scalar JSON value as a string
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a JSON value to f64, accepting numeric strings
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_f64(s),
        _ => None,
    }
}

/// Coerce a JSON value to bool, accepting 0/1 and "true"/"false"
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => parse_bool(s),
        _ => None,
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" => Some(true),
        "0" => Some(false),
        other => other.to_ascii_lowercase().parse::<bool>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_order_takes_first_match() {
        let payload = Payload::json(json!({"val": "42", "total": 100}));
        // "left" missing, falls through to "val"
        assert_eq!(payload.f64_of(&["left", "val"]), Some(42.0));
    }

    #[test]
    fn test_numeric_coercion_string_or_number() {
        let payload = Payload::json(json!({"power": "095", "x": -13.5}));
        assert_eq!(payload.f64_of(&["power"]), Some(95.0));
        assert_eq!(payload.f64_of(&["x"]), Some(-13.5));
    }

    #[test]
    fn test_attr_bag_access() {
        let bag = AttrBag::new("battery").attr("power", "87");
        let payload = Payload::Attrs(bag);
        assert_eq!(payload.f64_of(&["value", "power"]), Some(87.0));
        assert!(payload.str_of(&["missing"]).is_none());
    }

    #[test]
    fn test_sub_and_sub_list() {
        let payload = Payload::json(json!({
            "cleanState": {"motionState": "working"},
            "subsets": [{"mssid": "0"}, {"mssid": "1"}]
        }));
        let clean = payload.sub("cleanState").unwrap();
        assert_eq!(clean.str_of(&["motionState"]), Some("working".into()));
        assert_eq!(payload.sub_list("subsets").len(), 2);

        let bag = AttrBag::new("ctl")
            .child(AttrBag::new("clean").attr("type", "auto"))
            .child(AttrBag::new("clean").attr("type", "border"));
        let payload = Payload::Attrs(bag);
        assert_eq!(payload.sub_list("clean").len(), 2);
        assert_eq!(
            payload.sub("clean").unwrap().str_of(&["type"]),
            Some("auto".into())
        );
    }

    #[test]
    fn test_envelope_unwrap() {
        let payload = Payload::json(json!({"body": {"data": {"value": 71}}}));
        let inner = payload.unwrap_envelope();
        assert_eq!(inner.f64_of(&["value"]), Some(71.0));

        let plain = Payload::json(json!({"value": 3})).unwrap_envelope();
        assert_eq!(plain.f64_of(&["value"]), Some(3.0));
    }

    #[test]
    fn test_bool_coercion() {
        let payload = Payload::json(json!({"isCharging": 1, "invalid": "0", "low": true}));
        assert_eq!(payload.bool_of(&["isCharging"]), Some(true));
        assert_eq!(payload.bool_of(&["invalid"]), Some(false));
        assert_eq!(payload.bool_of(&["low"]), Some(true));
    }
}
