//! Predicate-based lookup of resource instances.
//!
//! Matching is always first-wins under the state's resource order, then the resource's
//! instance order, so two decodes of the same apply resolve to the same instance.

use std::collections::BTreeMap;

use crate::terraform::{AttributeValue, Instance, Resource, TerraformState};

/// A located instance together with the resource that declares it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located<'a> {
    pub resource: &'a Resource,
    pub instance: &'a Instance,
    pub index: usize,
}

impl<'a> Located<'a> {
    pub fn attribute(&self, name: &str) -> Option<&'a AttributeValue> {
        self.instance.attributes.get(name)
    }
}

pub fn find<'a, P>(state: &'a TerraformState, predicate: P) -> Option<Located<'a>>
where
    P: Fn(&Resource, &Instance) -> bool,
{
    state.resources.iter().find_map(|resource| {
        resource
            .instances
            .iter()
            .enumerate()
            .find(|&(_, instance)| predicate(resource, instance))
            .map(|(index, instance)| Located {
                resource,
                instance,
                index,
            })
    })
}

/// Attributes of the first instance of the first resource with the given type (and name).
pub fn find_resource_instance<'a>(
    state: &'a TerraformState,
    resource_type: &str,
    name: Option<&str>,
) -> Option<&'a BTreeMap<String, AttributeValue>> {
    state
        .resources
        .iter()
        .find(|r| r.resource_type == resource_type && name.is_none_or(|n| r.name == n))
        .and_then(|r| r.instances.first())
        .map(|instance| &instance.attributes)
}

/// Declarative predicate: every populated field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceQuery {
    resource_type: Option<String>,
    name: Option<String>,
    attributes: Vec<(String, String)>,
}

impl ResourceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Requires a string attribute with exactly this value.
    pub fn attribute_eq(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((attribute.into(), value.into()));
        self
    }

    pub fn matches(&self, resource: &Resource, instance: &Instance) -> bool {
        self.resource_type
            .as_deref()
            .is_none_or(|t| resource.resource_type == t)
            && self.name.as_deref().is_none_or(|n| resource.name == n)
            && self.attributes.iter().all(|(key, expected)| {
                instance
                    .attributes
                    .get(key)
                    .is_some_and(|v| v.str_eq(expected))
            })
    }

    pub fn find<'a>(&self, state: &'a TerraformState) -> Option<Located<'a>> {
        find(state, |resource, instance| self.matches(resource, instance))
    }

    /// String value of `attribute` on the first match. `None` if nothing matches or the
    /// attribute is missing or not a string.
    pub fn find_str<'a>(&self, state: &'a TerraformState, attribute: &str) -> Option<&'a str> {
        self.find(state)?.attribute(attribute)?.as_str().ok()
    }
}

impl std::fmt::Display for ResourceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}",
            self.resource_type.as_deref().unwrap_or("*"),
            self.name.as_deref().unwrap_or("*")
        )?;
        for (key, value) in &self.attributes {
            write!(f, "[{key}={value:?}]")?;
        }
        Ok(())
    }
}
