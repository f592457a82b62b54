//! Query strings for list and availability endpoints.
//!
//! The API treats an absent parameter as "no filter", so nothing here ever
//! emits an empty or `false` value.

use std::fmt::Display;

/// Chained builder for the query pairs of a [`RequestSpec`](crate::client::RequestSpec).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    /// An empty query.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Add `key` when a filter value is given.
    #[must_use]
    pub fn filter(mut self, key: &'static str, value: Option<impl Display>) -> Self {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    /// Add `key=true` when `enabled`; a disabled flag is left out.
    #[must_use]
    pub fn flag(mut self, key: &'static str, enabled: bool) -> Self {
        if enabled {
            self.pairs.push((key, "true".to_string()));
        }
        self
    }

    /// Whether nothing was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl From<Query> for Vec<(&'static str, String)> {
    fn from(query: Query) -> Self {
        query.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::Query;
    use crate::constants::InstanceStatus;

    #[test]
    fn absent_filter_and_cleared_flag_are_omitted() {
        let query = Query::new()
            .filter("status", Option::<InstanceStatus>::None)
            .flag("is_spot", false);
        assert!(query.is_empty());
    }

    #[test]
    fn values_use_wire_format() {
        let pairs: Vec<_> = Query::new()
            .filter("status", Some(InstanceStatus::NoCapacity))
            .flag("is_spot", true)
            .into();
        assert_eq!(
            pairs,
            vec![
                ("status", "no_capacity".to_string()),
                ("is_spot", "true".to_string())
            ]
        );
    }
}
