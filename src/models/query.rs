//! Query-string parameters for SMAX entity queries.

use serde::Serialize;

/// Optional query parameters accepted by the `/ems` read endpoints.
///
/// Unset fields are never transmitted: they are skipped both by
/// [`to_pairs`](Self::to_pairs) and by serde serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams {
    /// Comma-separated list of fields to return (e.g., `Id,DisplayLabel`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    /// SMAX filter expression (e.g., `Status = 'RequestStatusReady'`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Grouping expression, used by aggregation queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Sort expression (e.g., `Id desc`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// Maximum number of records to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    /// Number of records to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,

    /// Metadata selector (e.g., `totalCount`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl QueryParams {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field layout.
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Sets the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the grouping expression.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the sort expression.
    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Sets the maximum number of records.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the number of records to skip.
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the metadata selector.
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    /// Returns true if no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Returns the set parameters as name/value pairs, ready for the query string.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((name, value));
            }
        };

        push("layout", self.layout.clone());
        push("filter", self.filter.clone());
        push("group", self.group.clone());
        push("order", self.order.clone());
        push("size", self.size.map(|v| v.to_string()));
        push("skip", self.skip.map(|v| v.to_string()));
        push("meta", self.meta.clone());

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_params_produce_no_pairs() {
        let params = QueryParams::new();
        assert!(params.is_empty());
        assert_eq!(params.to_pairs(), Vec::<(&str, String)>::new());
    }

    #[test]
    fn test_only_set_params_are_emitted() {
        let params = QueryParams::new()
            .with_layout("Id,DisplayLabel")
            .with_size(25);

        assert_eq!(
            params.to_pairs(),
            vec![
                ("layout", "Id,DisplayLabel".to_string()),
                ("size", "25".to_string()),
            ]
        );
    }

    #[test]
    fn test_zero_values_are_still_sent() {
        let params = QueryParams::new().with_skip(0);
        assert_eq!(params.to_pairs(), vec![("skip", "0".to_string())]);
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let params = QueryParams::new().with_filter("Priority = 'High'");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({ "filter": "Priority = 'High'" }));
    }
}
