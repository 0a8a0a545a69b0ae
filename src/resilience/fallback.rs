//! Safe default results per operation name.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// A conservative placeholder standing in for an operation's real result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeDefault {
    pub operation: String,
    pub value: Value,
}

/// Static mapping from operation name to safe default.
#[derive(Debug, Clone)]
pub struct FallbackResolver {
    defaults: HashMap<String, Value>,
}

impl Default for FallbackResolver {
    fn default() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(
            "platform.get_product".to_string(),
            json!({
                "id": null,
                "title": "Product unavailable",
                "available": false,
                "status": "unavailable",
                "fallback": true,
            }),
        );
        defaults.insert(
            "platform.list_products".to_string(),
            json!({ "products": [], "fallback": true }),
        );
        defaults.insert(
            "platform.get_inventory".to_string(),
            json!({ "quantity": 0, "available": false, "fallback": true }),
        );
        defaults.insert(
            "registry.get".to_string(),
            json!({ "status": "pending", "items": [], "fallback": true }),
        );
        defaults.insert(
            "registry.create".to_string(),
            json!({ "id": null, "status": "pending", "fallback": true }),
        );
        defaults.insert(
            "email.send".to_string(),
            json!({ "sent": false, "fallback": true }),
        );
        defaults.insert(
            "webhook.deliver".to_string(),
            json!({ "delivered": false, "fallback": true }),
        );
        Self { defaults }
    }
}

impl FallbackResolver {
    pub fn empty() -> Self {
        Self {
            defaults: HashMap::new(),
        }
    }

    /// Register or replace the default for `operation`.
    pub fn with_default(mut self, operation: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(operation.into(), value);
        self
    }

    pub fn resolve(&self, operation: &str) -> SafeDefault {
        let value = self
            .defaults
            .get(operation)
            .cloned()
            .unwrap_or_else(|| json!({ "success": false, "fallback": true }));
        SafeDefault {
            operation: operation.to_string(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_operation() {
        let resolved = FallbackResolver::default().resolve("platform.get_product");
        assert_eq!(resolved.value["status"], "unavailable");
        assert_eq!(resolved.value["available"], false);
    }

    #[test]
    fn test_unknown_operation_generic_marker() {
        let resolved = FallbackResolver::default().resolve("nope.nothing");
        assert_eq!(resolved.value, json!({ "success": false, "fallback": true }));
        assert_eq!(resolved.operation, "nope.nothing");
    }

    #[test]
    fn test_custom_default_overrides() {
        let resolver = FallbackResolver::empty().with_default("registry.get", json!({ "status": "cached" }));
        assert_eq!(resolver.resolve("registry.get").value["status"], "cached");
    }
}
