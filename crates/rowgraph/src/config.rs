//! Mapper configuration.

use rowgraph_core::{Error, Result};
use rowgraph_query::{DEFAULT_WHERE, PagingConfig};
use serde::{Deserialize, Serialize};

/// Settings shared by every operation of a [`Mapper`](crate::Mapper).
///
/// Missing keys take their defaults when deserialized:
///
/// ```ignore
/// let config = MapperConfig::from_json(r#"{ "paging": { "rownum_alias": "rn" } }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// WHERE clause used when a join is issued without one.
    pub default_where: String,
    pub paging: PagingConfig,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            default_where: DEFAULT_WHERE.to_string(),
            paging: PagingConfig::default(),
        }
    }
}

impl MapperConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapperConfig::default();
        assert_eq!(config.default_where, "1 = 1");
        assert_eq!(config.paging.fallback_order, "ORDER BY (SELECT NULL)");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MapperConfig::from_json(r#"{ "paging": { "rownum_alias": "rn" } }"#).unwrap();
        assert_eq!(config.default_where, "1 = 1");
        assert_eq!(config.paging.rownum_alias, "rn");
        assert_eq!(config.paging.paged_alias, "__rowgraph_paged");
    }

    #[test]
    fn test_json_round_trip() {
        let config = MapperConfig {
            default_where: "deleted = 0".into(),
            ..MapperConfig::default()
        };
        let parsed = MapperConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_json_is_a_config_error() {
        let err = MapperConfig::from_json(r#"{ "default_where": 5 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
