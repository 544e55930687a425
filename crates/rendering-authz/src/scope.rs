//! Scope filters attached to a collection within a rendering.
//!
//! A scope is a filter the server applies to every query on a collection.
//! Condition values may reference the current user (`$currentUser.*`); those
//! placeholders are resolved from the per-user values shipped alongside the
//! filter.
use crate::{AuthzError, AuthzResult, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const CURRENT_USER_PREFIX: &str = "$currentUser";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilter {
    pub filter: ConditionTree,
    #[serde(default)]
    pub dynamic_scopes_values: DynamicScopeValues,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionTree {
    #[serde(default)]
    pub aggregator: Aggregator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

/// Per-user values for `$currentUser.*` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicScopeValues {
    #[serde(default)]
    pub users: HashMap<UserId, HashMap<String, Value>>,
}

impl ScopeFilter {
    /// Produce the concrete filter for `user`.
    ///
    /// # Errors
    /// - [`AuthzError::UnresolvedScopeValue`] when a condition references a
    ///   `$currentUser` key the snapshot carries no value for. Callers must
    ///   deny rather than drop the condition.
    pub fn resolve_for(&self, user: &UserId) -> AuthzResult<ConditionTree> {
        let values = self.dynamic_scopes_values.users.get(user);
        let mut conditions = Vec::with_capacity(self.filter.conditions.len());
        for condition in &self.filter.conditions {
            let value = match condition.value.as_str() {
                Some(key) if key.starts_with(CURRENT_USER_PREFIX) => values
                    .and_then(|values| values.get(key))
                    .cloned()
                    .ok_or_else(|| AuthzError::UnresolvedScopeValue {
                        user: user.to_string(),
                        key: key.to_string(),
                    })?,
                _ => condition.value.clone(),
            };
            conditions.push(Condition {
                field: condition.field.clone(),
                operator: condition.operator.clone(),
                value,
            });
        }
        Ok(ConditionTree {
            aggregator: self.filter.aggregator,
            conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team_scope() -> ScopeFilter {
        serde_json::from_value(json!({
            "filter": {
                "aggregator": "and",
                "conditions": [
                    {"field": "team", "operator": "equal", "value": "$currentUser.team"},
                    {"field": "archived", "operator": "equal", "value": false}
                ]
            },
            "dynamicScopesValues": {
                "users": {"7": {"$currentUser.team": "ops"}}
            }
        }))
        .expect("decode scope")
    }

    #[test]
    fn resolves_current_user_placeholders() {
        let resolved = team_scope()
            .resolve_for(&UserId::new("7"))
            .expect("resolve");
        assert_eq!(resolved.aggregator, Aggregator::And);
        assert_eq!(resolved.conditions[0].value, json!("ops"));
        assert_eq!(resolved.conditions[1].value, json!(false));
    }

    #[test]
    fn missing_user_value_is_an_error() {
        let err = team_scope()
            .resolve_for(&UserId::new("8"))
            .expect_err("unknown user");
        assert!(matches!(
            err,
            AuthzError::UnresolvedScopeValue { ref key, .. } if key == "$currentUser.team"
        ));
    }

    #[test]
    fn static_scope_needs_no_user_values() {
        let scope: ScopeFilter = serde_json::from_value(json!({
            "filter": {"aggregator": "or", "conditions": [
                {"field": "country", "operator": "in", "value": ["FR", "DE"]}
            ]}
        }))
        .expect("decode");
        let resolved = scope.resolve_for(&UserId::new("1")).expect("resolve");
        assert_eq!(resolved, scope.filter);
    }
}
