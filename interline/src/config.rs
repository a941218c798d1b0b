use serde::{Deserialize, Serialize};

/// Tunables for an [`AdornmentManager`](crate::AdornmentManager).
///
/// Deserializes from any serde format; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Consecutive follow-up layouts allowed to end with changes still deferred before the
    /// manager stops scheduling more. Counting restarts once a layout settles or a tag
    /// source reports a change.
    pub max_follow_up_layouts: u32,

    /// Panic when a tag source returns a span that is not a single point inside the queried
    /// line. When off, such tags are logged and ignored.
    pub strict_tag_spans: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_follow_up_layouts: 8,
            strict_tag_spans: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ManagerConfig = serde_json::from_str(r#"{"max_follow_up_layouts": 3}"#).unwrap();

        assert_eq!(config.max_follow_up_layouts, 3);
        assert_eq!(config.strict_tag_spans, cfg!(debug_assertions));
    }

    #[test]
    fn empty_object_is_default() {
        let config: ManagerConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn serializes_every_field() {
        let config = ManagerConfig {
            max_follow_up_layouts: 2,
            strict_tag_spans: false,
        };

        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["max_follow_up_layouts"], 2);
        assert_eq!(json["strict_tag_spans"], false);
    }
}
