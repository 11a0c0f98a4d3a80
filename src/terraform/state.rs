//! Terraform state model and decoder.
//!
//! Parses state v4 documents as written by `terraform apply -state=<file>`. Resource and
//! instance order is kept exactly as it appears in the document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TerraformError;
use super::value::{AttributeValue, ValueError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformState {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub serial: Option<u64>,
    #[serde(default)]
    pub lineage: Option<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, StateOutput>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateOutput {
    pub value: AttributeValue,
    #[serde(default)]
    pub sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<AttributeValue>,
    #[serde(default)]
    pub schema_version: u64,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl TerraformState {
    /// Decodes raw state JSON.
    ///
    /// Fails with [`TerraformError::MalformedState`] when `resources` is missing, when a
    /// resource has no `type`, `name` or instances, or when an instance has no attribute object.
    pub fn decode(raw: &str) -> Result<Self, TerraformError> {
        let state: TerraformState = serde_json::from_str(raw)
            .map_err(|e| TerraformError::MalformedState(e.to_string()))?;

        if let Some(empty) = state.resources.iter().find(|r| r.instances.is_empty()) {
            return Err(TerraformError::MalformedState(format!(
                "resource {} has no instances",
                empty.address()
            )));
        }

        Ok(state)
    }

    pub fn resource(&self, resource_type: &str, name: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    pub fn instance_count(&self) -> usize {
        self.resources.iter().map(|r| r.instances.len()).sum()
    }
}

impl Resource {
    /// Terraform address, e.g. `coder_script.windows-rdp` or `data.coder_workspace.me`.
    pub fn address(&self) -> String {
        let prefix = match self.mode {
            ResourceMode::Managed => String::new(),
            ResourceMode::Data => "data.".to_string(),
        };
        let local = format!("{}{}.{}", prefix, self.resource_type, self.name);
        match &self.module {
            Some(module) => format!("{module}.{local}"),
            None => local,
        }
    }
}

impl Instance {
    pub fn attribute(&self, name: &str) -> Result<&AttributeValue, ValueError> {
        self.attributes
            .get(name)
            .ok_or_else(|| ValueError::NotFound(name.to_string()))
    }

    pub fn str_attribute(&self, name: &str) -> Result<&str, ValueError> {
        self.attribute(name)?.as_str()
    }
}
