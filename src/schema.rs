//! Form Schema - Declarative Field Contracts
//!
//! A schema describes the field/group tree once, up front. The engine
//! builds its live state from it; the schema itself stays immutable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::engine::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default = "default_schema_name")]
    pub name: String,
    pub root: GroupSpec,
}

fn default_schema_name() -> String {
    "form".to_string()
}

impl Schema {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// A named composite of fields and nested groups.
///
/// Child order is preserved for iteration/display; it has no effect on
/// validity. Keys must be unique within the group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    #[serde(default)]
    pub validators: Vec<GroupValidatorSpec>,
    #[serde(default)]
    pub surface: SurfacePolicy,
    #[serde(default)]
    pub children: Vec<ChildSpec>,
}

impl GroupSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, spec: FieldSpec) -> Self {
        self.children.push(ChildSpec {
            name: name.to_string(),
            node: SchemaNode::Field(spec),
        });
        self
    }

    pub fn group(mut self, name: &str, spec: GroupSpec) -> Self {
        self.children.push(ChildSpec {
            name: name.to_string(),
            node: SchemaNode::Group(spec),
        });
        self
    }

    pub fn validator(mut self, spec: GroupValidatorSpec) -> Self {
        self.validators.push(spec);
        self
    }

    pub fn surface(mut self, policy: SurfacePolicy) -> Self {
        self.surface = policy;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSpec {
    pub name: String,
    #[serde(flatten)]
    pub node: SchemaNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SchemaNode {
    Field(FieldSpec),
    Group(GroupSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Initial value; `null` models "no value yet".
    #[serde(default)]
    pub initial: Value,
    #[serde(default)]
    pub validators: Vec<ValidatorSpec>,
    #[serde(default)]
    pub disabled: bool,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self, value: Value) -> Self {
        self.initial = value;
        self
    }

    pub fn validator(mut self, spec: ValidatorSpec) -> Self {
        self.validators.push(spec);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Declarative form of a single-field validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule")]
pub enum ValidatorSpec {
    Required,
    MinLength { min: usize },
    MaxLength { max: usize },
    Pattern { pattern: String },
    Range { min: f64, max: f64 },
}

/// Declarative form of a group-level (cross-field) validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule")]
pub enum GroupValidatorSpec {
    /// Two sibling fields must hold equal values once both are dirty.
    FieldsMatch { left: String, right: String },
}

/// When error feedback becomes visible for fields of a group.
///
/// The gate applies to display only; error sets are always maintained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfacePolicy {
    Touched,
    Dirty,
    #[default]
    TouchedOrDirty,
    TouchedAndDirty,
}

impl SurfacePolicy {
    pub fn surfaced(&self, dirty: bool, touched: bool) -> bool {
        match self {
            SurfacePolicy::Touched => touched,
            SurfacePolicy::Dirty => dirty,
            SurfacePolicy::TouchedOrDirty => touched || dirty,
            SurfacePolicy::TouchedAndDirty => touched && dirty,
        }
    }
}
