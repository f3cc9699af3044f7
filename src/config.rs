use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::filter::{FilterParams, DEFAULT_BENCH_COLUMN, DEFAULT_PATTERN_COLUMN};
use crate::data::store::{AttributeSpec, StoreOptions};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Session configuration
// ---------------------------------------------------------------------------

/// Everything needed to turn a delimited file into a filtered point store.
///
/// Every field has a default matching the measure-while-drilling export
/// layout, so a JSON file only needs to list what differs:
///
/// ```json
/// { "chunk_size": 50000, "filter": { "field_to_filter": "rop", "range": [10, 40] } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub delimiter: char,
    /// Columns coerced to numbers while reading.
    pub numeric_fields: Vec<String>,
    pub position: PositionColumns,
    pub attributes: Vec<AttributeBinding>,
    pub store: StoreOptions,
    /// Records read between two publishes.
    pub chunk_size: usize,
    pub bench_column: String,
    pub pattern_column: String,
    pub filter: FilterParams,
    /// Attribute used for coloring; the first attribute when unset.
    pub color_column: Option<String>,
}

/// Columns providing the x, y and z coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionColumns {
    pub x: String,
    pub y: String,
    pub z: String,
}

/// One stored attribute and the record columns it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeBinding {
    pub name: String,
    #[serde(default = "one")]
    pub components: usize,
    /// One column per component. Empty means the column named like the
    /// attribute feeds component 0.
    #[serde(default)]
    pub columns: Vec<String>,
}

fn one() -> usize {
    1
}

impl AttributeBinding {
    pub fn scalar(name: &str) -> Self {
        AttributeBinding {
            name: name.to_string(),
            components: 1,
            columns: Vec::new(),
        }
    }

    /// Source column of each component; `None` where nothing is bound.
    pub fn sources(&self) -> impl Iterator<Item = Option<&str>> {
        let components = self.components.max(1);
        (0..components).map(move |j| {
            if self.columns.is_empty() {
                (j == 0).then_some(self.name.as_str())
            } else {
                self.columns.get(j).map(String::as_str)
            }
        })
    }
}

const MWD_NUMERIC_FIELDS: &[&str] = &[
    "Bench",
    "Pattern",
    "Northing (Actual)",
    "Easting (Actual)",
    "Collar Elevation",
    "air_pressure",
    "blastability",
    "computed_elevation",
    "end_depth",
    "rop",
    "rpm",
    "torque",
    "vibration",
    "weight_on_bit",
    "MSE",
];

const MWD_ATTRIBUTES: &[&str] = &[
    "Collar Elevation",
    "air_pressure",
    "blastability",
    "rop",
    "rpm",
    "torque",
    "vibration",
    "weight_on_bit",
    "MSE",
    "Pattern",
    "Bench",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: ',',
            numeric_fields: MWD_NUMERIC_FIELDS.iter().map(|s| s.to_string()).collect(),
            position: PositionColumns::default(),
            attributes: MWD_ATTRIBUTES
                .iter()
                .map(|name| AttributeBinding::scalar(name))
                .collect(),
            store: StoreOptions {
                initial_capacity: 2_000_000,
                growth_increment: 2_000_000,
                generate_cells: true,
            },
            chunk_size: 2_000_000,
            bench_column: DEFAULT_BENCH_COLUMN.to_string(),
            pattern_column: DEFAULT_PATTERN_COLUMN.to_string(),
            filter: FilterParams::default(),
            color_column: None,
        }
    }
}

impl Default for PositionColumns {
    fn default() -> Self {
        Self {
            x: "computed_elevation".to_string(),
            y: "Northing (Actual)".to_string(),
            z: "Easting (Actual)".to_string(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject attribute bindings that would not map one-to-one onto store
    /// columns.
    pub fn validate(&self) -> Result<()> {
        for (i, binding) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|b| b.name == binding.name) {
                return Err(Error::DuplicateAttribute(binding.name.clone()));
            }
        }
        Ok(())
    }

    /// Attribute layout for the point store, in binding order.
    pub fn attribute_spec(&self) -> AttributeSpec {
        self.attributes
            .iter()
            .map(|b| (b.name.clone(), b.components))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_mwd_exports() {
        let config = Config::default();
        assert_eq!(config.position.x, "computed_elevation");
        assert_eq!(config.attributes.len(), 11);
        assert!(config.numeric_fields.iter().any(|f| f == "MSE"));
        assert!(config.store.generate_cells);

        let spec = config.attribute_spec();
        assert_eq!(spec.names().next(), Some("Collar Elevation"));
        assert_eq!(spec.width(), 11);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(
            r#"{
                "delimiter": ";",
                "chunk_size": 500,
                "store": { "initial_capacity": 10 },
                "attributes": [
                    { "name": "rop" },
                    { "name": "vel", "components": 3, "columns": ["vx", "vy", "vz"] }
                ],
                "filter": { "field_to_filter": "rop", "range": [10, 40], "selected_blocks": "1200" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.delimiter, ';');
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.store.initial_capacity, 10);
        assert_eq!(config.store.growth_increment, 100_000);
        assert_eq!(config.position, PositionColumns::default());
        assert_eq!(config.filter.range, [10.0, 40.0]);
        assert_eq!(config.filter.selected_blocks.as_deref(), Some("1200"));
        assert_eq!(config.attribute_spec().width(), 4);
    }

    #[test]
    fn binding_sources() {
        let scalar = AttributeBinding::scalar("rop");
        assert_eq!(scalar.sources().collect::<Vec<_>>(), [Some("rop")]);

        let vector = AttributeBinding {
            name: "vel".into(),
            components: 3,
            columns: vec!["vx".into(), "vy".into()],
        };
        assert_eq!(vector.sources().collect::<Vec<_>>(), [Some("vx"), Some("vy"), None]);

        let unbound = AttributeBinding {
            name: "normal".into(),
            components: 2,
            columns: Vec::new(),
        };
        assert_eq!(unbound.sources().collect::<Vec<_>>(), [Some("normal"), None]);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{ \"chunk_size\": \"lots\" }").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn duplicate_attribute_names_are_rejected() {
        let err = Config::from_json(
            r#"{ "attributes": [
                { "name": "a" },
                { "name": "b" },
                { "name": "a", "components": 2, "columns": ["c", "c"] }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateAttribute(name) if name == "a"));
        assert!(Config::default().validate().is_ok());
    }
}
