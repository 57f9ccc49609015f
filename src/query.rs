// src/query.rs

use serde::Serialize;
use serde_json::{Map, Value};

/// Controls whether a query consults the client's local result cache,
/// the network, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Always go to the network; the cache is neither read nor written.
    #[default]
    IgnoreCache,
    /// Return the cached result when present, otherwise fetch from the
    /// network and cache the response.
    CacheElseNetwork,
    /// Fetch from the network and cache the response; fall back to the
    /// cache only when the network call fails.
    NetworkElseCache,
    /// Only consult the cache; a miss is an error.
    CacheOnly,
    /// Always fetch from the network, refreshing the cache.
    NetworkOnly,
}

/// Sort direction for a single order-by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One `{field, direction}` pair of a multi-key sort. The first key
/// supplied to a query is the primary sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Represents a query to be performed against a Parse Server class.
///
/// A query is owned exclusively by the operation executing it; clones
/// made for paging windows never escape that operation.
#[derive(Debug, Clone)]
pub struct ParseQuery {
    class_name: String,
    conditions: Map<String, Value>,
    limit: Option<u64>,
    skip: Option<u64>,
    order: Option<String>,
    include: Option<String>,
    keys: Option<String>,
    cache_policy: CachePolicy,
}

impl ParseQuery {
    /// Creates a new `ParseQuery` for the specified class name.
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            conditions: Map::new(),
            limit: None,
            skip: None,
            order: None,
            include: None,
            keys: None,
            cache_policy: CachePolicy::default(),
        }
    }

    /// Returns the class name this query targets.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Sets the cache policy this query is executed under.
    pub fn set_cache_policy(&mut self, policy: CachePolicy) -> &mut Self {
        self.cache_policy = policy;
        self
    }

    // Helper to add a simple condition like "field": "value"
    fn add_simple_condition(&mut self, key: &str, value: Value) -> &mut Self {
        self.conditions.insert(key.to_string(), value);
        self
    }

    // Helper to add an operator condition like "field": {"$op": "value"}
    fn add_operator_condition(&mut self, key: &str, operator: &str, value: Value) -> &mut Self {
        let mut op_map = Map::new();
        op_map.insert(operator.to_string(), value);
        self.conditions
            .insert(key.to_string(), Value::Object(op_map));
        self
    }

    /// Adds a constraint that a field must be equal to a specified value.
    pub fn equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_simple_condition(key, json_val),
            Err(_) => self,
        }
    }

    /// Adds a constraint that a field must not be equal to a specified value.
    pub fn not_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$ne", json_val),
            Err(_) => self,
        }
    }

    /// Adds a constraint that a field must exist.
    pub fn exists(&mut self, key: &str) -> &mut Self {
        self.add_operator_condition(key, "$exists", Value::Bool(true))
    }

    /// Adds a constraint for finding objects where a field's value is
    /// greater than the provided value.
    pub fn greater_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$gt", json_val),
            Err(_) => self,
        }
    }

    /// Adds a constraint for finding objects where a field's value is
    /// less than the provided value.
    pub fn less_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$lt", json_val),
            Err(_) => self,
        }
    }

    /// Adds a constraint for finding objects where a field's value is
    /// contained in the provided list of values.
    pub fn contained_in<V: Serialize>(&mut self, key: &str, values: Vec<V>) -> &mut Self {
        match serde_json::to_value(values) {
            Ok(json_val_array) => self.add_operator_condition(key, "$in", json_val_array),
            Err(_) => self,
        }
    }

    /// Adds a constraint for finding objects where a string field starts
    /// with a given prefix.
    pub fn starts_with(&mut self, key: &str, prefix: &str) -> &mut Self {
        self.add_operator_condition(
            key,
            "$regex",
            Value::String(format!("^{}", regex::escape(prefix))),
        )
    }

    /// Adds a constraint for finding objects where a string field
    /// contains a given substring.
    pub fn contains(&mut self, key: &str, substring: &str) -> &mut Self {
        self.add_operator_condition(
            key,
            "$regex",
            Value::String(format!(".*{}.*", regex::escape(substring))),
        )
    }

    // --- Pagination and sorting ---

    /// Sets the maximum number of results to return.
    pub fn limit(&mut self, count: u64) -> &mut Self {
        self.limit = Some(count);
        self
    }

    /// Sets the number of results to skip before returning.
    pub fn skip(&mut self, count: u64) -> &mut Self {
        self.skip = Some(count);
        self
    }

    // Helper to append to the order string
    fn append_order_key(&mut self, key: &str, descending: bool) {
        let prefix = if descending { "-" } else { "" };
        let new_order_key = format!("{}{}", prefix, key);
        if let Some(existing_order) = &mut self.order {
            if !existing_order.is_empty() {
                existing_order.push(',');
            }
            existing_order.push_str(&new_order_key);
        } else {
            self.order = Some(new_order_key);
        }
    }

    /// Adds a key to sort the results by in ascending order. Appends to
    /// the existing sort order.
    pub fn add_ascending_order(&mut self, key: &str) -> &mut Self {
        self.append_order_key(key, false);
        self
    }

    /// Adds a key to sort the results by in descending order. Appends to
    /// the existing sort order.
    pub fn add_descending_order(&mut self, key: &str) -> &mut Self {
        self.append_order_key(key, true);
        self
    }

    /// Appends the given sort keys in caller order; the first key
    /// supplied (here or earlier) is the primary sort key.
    pub fn order_by(&mut self, keys: &[SortKey]) -> &mut Self {
        for key in keys {
            match key.direction {
                SortDirection::Ascending => self.add_ascending_order(&key.field),
                SortDirection::Descending => self.add_descending_order(&key.field),
            };
        }
        self
    }

    /// Includes nested objects for the given pointer key(s).
    pub fn include(&mut self, keys_to_include: &[&str]) -> &mut Self {
        let current_include = self.include.take().unwrap_or_default();
        let mut include_parts: Vec<&str> = current_include
            .split(',')
            .filter(|s| !s.is_empty())
            .collect();
        include_parts.extend(keys_to_include.iter().cloned());
        include_parts.sort_unstable();
        include_parts.dedup();
        self.include = Some(include_parts.join(","));
        self
    }

    /// Restricts the fields returned for all matching objects.
    pub fn select(&mut self, keys_to_select: &[&str]) -> &mut Self {
        let current_keys = self.keys.take().unwrap_or_default();
        let mut select_parts: Vec<&str> =
            current_keys.split(',').filter(|s| !s.is_empty()).collect();
        select_parts.extend(keys_to_select.iter().cloned());
        select_parts.sort_unstable();
        select_parts.dedup();
        self.keys = Some(select_parts.join(","));
        self
    }

    // Internal helper to build query parameters for reqwest
    pub(crate) fn build_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.conditions.is_empty() {
            if let Ok(where_json) = serde_json::to_string(&self.conditions) {
                params.push(("where".to_string(), where_json));
            }
        }
        if let Some(limit_val) = self.limit {
            params.push(("limit".to_string(), limit_val.to_string()));
        }
        if let Some(skip_val) = self.skip {
            params.push(("skip".to_string(), skip_val.to_string()));
        }
        if let Some(order_val) = &self.order {
            params.push(("order".to_string(), order_val.clone()));
        }
        if let Some(include_val) = &self.include {
            params.push(("include".to_string(), include_val.clone()));
        }
        if let Some(keys_val) = &self.keys {
            params.push(("keys".to_string(), keys_val.clone()));
        }
        params
    }

    /// A stable identity for this query's result set, used as the
    /// client cache key. Skip/limit are part of the fingerprint: two
    /// paging windows over the same class cache independently.
    pub(crate) fn cache_fingerprint(&self) -> String {
        let mut fingerprint = format!("classes/{}", self.class_name);
        for (key, value) in self.build_query_params() {
            fingerprint.push('&');
            fingerprint.push_str(&key);
            fingerprint.push('=');
            fingerprint.push_str(&value);
        }
        fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_keys_append_in_caller_order() {
        let mut query = ParseQuery::new("Game");
        query.order_by(&[SortKey::ascending("score"), SortKey::descending("name")]);
        let params = query.build_query_params();
        let order = params
            .iter()
            .find(|(k, _)| k == "order")
            .map(|(_, v)| v.as_str());
        assert_eq!(order, Some("score,-name"));
    }

    #[test]
    fn skip_and_limit_become_params() {
        let mut query = ParseQuery::new("Game");
        query.skip(100).limit(100);
        let params = query.build_query_params();
        assert!(params.contains(&("limit".to_string(), "100".to_string())));
        assert!(params.contains(&("skip".to_string(), "100".to_string())));
    }

    #[test]
    fn fingerprint_distinguishes_paging_windows() {
        let mut first = ParseQuery::new("Game");
        first.skip(0).limit(1000);
        let mut second = ParseQuery::new("Game");
        second.skip(1000).limit(1000);
        assert_ne!(first.cache_fingerprint(), second.cache_fingerprint());
    }

    #[test]
    fn conditions_serialize_into_where() {
        let mut query = ParseQuery::new("Game");
        query.equal_to("name", "test").greater_than("score", 10);
        let params = query.build_query_params();
        let where_param = params
            .iter()
            .find(|(k, _)| k == "where")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        assert!(where_param.contains("\"name\":\"test\""));
        assert!(where_param.contains("\"$gt\":10"));
    }
}
