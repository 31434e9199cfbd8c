//! Scene configuration.
//!
//! Every field has a default, so a JSON document only needs the fields it
//! changes:
//!
//! ```
//! use riptide_engine::config::SceneConfig;
//!
//! let config = SceneConfig::from_json(r#"{ "world_width": 640, "collision_iterations": 2 }"#).unwrap();
//! assert_eq!(config.world_width, 640.0);
//! assert_eq!(config.collision_iterations, 2);
//! assert_eq!(config.cell_shift, 4);
//! ```

use riptide_ecs::entity::MAX_SLOTS;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Parameters fixed at scene construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// World extent covered by the collision grid, in world units.
    pub world_width: f32,
    pub world_height: f32,
    /// Grid cells are `1 << cell_shift` units across.
    pub cell_shift: u32,
    /// Entity slot capacity, at most 65536.
    pub max_entities: usize,
    /// Resolver iterations per frame.
    pub collision_iterations: u32,
    /// Fraction of the approaching relative velocity removed when two
    /// dynamic bodies collide.
    pub elasticity: f32,
    /// Resolve each unordered pair at most once per iteration.
    pub dedup_pairs: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            world_width: 1024.0,
            world_height: 1024.0,
            cell_shift: 4,
            max_entities: 4096,
            collision_iterations: 1,
            elasticity: 0.01,
            dedup_pairs: true,
        }
    }
}

impl SceneConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| Err(ConfigError::Invalid { field, reason });

        if !(self.world_width > 0.0 && self.world_width.is_finite()) {
            return invalid("world_width", format!("must be positive and finite, got {}", self.world_width));
        }
        if !(self.world_height > 0.0 && self.world_height.is_finite()) {
            return invalid("world_height", format!("must be positive and finite, got {}", self.world_height));
        }
        if self.cell_shift >= 16 {
            return invalid("cell_shift", format!("must be below 16, got {}", self.cell_shift));
        }
        if self.max_entities == 0 || self.max_entities > MAX_SLOTS {
            return invalid(
                "max_entities",
                format!("must be in 1..={MAX_SLOTS}, got {}", self.max_entities),
            );
        }
        if !(0.0..=1.0).contains(&self.elasticity) {
            return invalid("elasticity", format!("must be in 0..=1, got {}", self.elasticity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SceneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.elasticity, 0.01);
        assert!(config.dedup_pairs);
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(SceneConfig::from_json("{}").unwrap(), SceneConfig::default());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SceneConfig::from_json("{ world_width: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let err = SceneConfig::from_json(r#"{ "max_entities": 70000 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_entities", .. }));

        let err = SceneConfig::from_json(r#"{ "world_height": -1 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "world_height", .. }));

        let err = SceneConfig::from_json(r#"{ "cell_shift": 16 }"#).unwrap_err();
        assert!(err.to_string().contains("cell_shift"));
    }

    #[test]
    fn zero_iterations_is_allowed() {
        let config = SceneConfig::from_json(r#"{ "collision_iterations": 0 }"#).unwrap();
        assert_eq!(config.collision_iterations, 0);
    }
}
