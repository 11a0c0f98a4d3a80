use tabled::settings::Style;
use tabled::{Table, Tabled};
use termtree::Tree;

use tfharness::validator::{ValidationError, VariableCheck};
use tfharness::{AttributeValue, Facts, TerraformState};

use crate::cli::OutputFormat;

const PREVIEW_WIDTH: usize = 60;

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Instances")]
    instances: usize,
    #[tabled(rename = "Provider")]
    provider: String,
}

#[derive(Tabled)]
struct FactRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Variable")]
    variable: String,
    #[tabled(rename = "Result")]
    result: String,
}

pub fn render_state(state: &TerraformState, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Tree => Ok(state_tree(state).to_string()),
        OutputFormat::Table => Ok(state_table(state)),
        OutputFormat::Json => serde_json::to_string_pretty(state),
    }
}

fn state_tree(state: &TerraformState) -> Tree<String> {
    let root = match &state.terraform_version {
        Some(version) => format!("state (terraform {version})"),
        None => "state".to_string(),
    };
    let mut tree = Tree::new(root);

    for resource in &state.resources {
        let mut node = Tree::new(resource.address());
        for (index, instance) in resource.instances.iter().enumerate() {
            let label = match &instance.index_key {
                Some(key) => format!("[{key}]"),
                None => format!("[{index}]"),
            };
            let mut instance_node = Tree::new(label);
            for (name, value) in &instance.attributes {
                instance_node.push(format!("{name} = {}", preview(value)));
            }
            node.push(instance_node);
        }
        tree.push(node);
    }

    tree
}

fn state_table(state: &TerraformState) -> String {
    let rows: Vec<ResourceRow> = state
        .resources
        .iter()
        .map(|resource| ResourceRow {
            address: resource.address(),
            instances: resource.instances.len(),
            provider: resource.provider.clone().unwrap_or_default(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn facts_table(facts: &Facts) -> String {
    let rows: Vec<FactRow> = facts
        .iter()
        .map(|(group, value)| FactRow {
            group: group.clone(),
            value: value.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn checks_table(checks: &[(VariableCheck, Option<ValidationError>)]) -> String {
    let rows: Vec<CheckRow> = checks
        .iter()
        .map(|(check, error)| CheckRow {
            variable: check.name.clone(),
            result: match error {
                None => "required".to_string(),
                Some(e) => e.to_string(),
            },
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

// First line of a value, shortened for display.
fn preview(value: &AttributeValue) -> String {
    let text = match value {
        AttributeValue::String(s) => format!("{s:?}"),
        other => other.to_string(),
    };
    let multiline = matches!(value, AttributeValue::String(s) if s.contains('\n'));
    let mut short: String = text.chars().take(PREVIEW_WIDTH).collect();
    if multiline || text.chars().count() > PREVIEW_WIDTH {
        short.push_str("...");
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TerraformState {
        TerraformState::decode(
            r#"{"terraform_version": "1.9.5", "resources": [
                {"type": "coder_script", "name": "windows-rdp", "provider": "coder",
                 "instances": [{"attributes": {"display_name": "windows-rdp", "run_on_start": true}}]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_state_tree_lists_resources_and_attributes() {
        let rendered = render_state(&state(), OutputFormat::Tree).unwrap();
        assert!(rendered.starts_with("state (terraform 1.9.5)"));
        assert!(rendered.contains("coder_script.windows-rdp"));
        assert!(rendered.contains("display_name = \"windows-rdp\""));
        assert!(rendered.contains("run_on_start = true"));
    }

    #[test]
    fn test_state_table_has_address_column() {
        let rendered = render_state(&state(), OutputFormat::Table).unwrap();
        assert!(rendered.contains("Address"));
        assert!(rendered.contains("coder_script.windows-rdp"));
    }

    #[test]
    fn test_json_output_round_trips_through_decoder() {
        let rendered = render_state(&state(), OutputFormat::Json).unwrap();
        assert_eq!(TerraformState::decode(&rendered).unwrap(), state());
    }

    #[test]
    fn test_preview_marks_multiline_scripts() {
        let value = AttributeValue::from("line one\nline two");
        assert_eq!(preview(&value), "\"line one\\nline two\"...");
    }

    #[test]
    fn test_facts_table() {
        let facts = Facts::from([("username".to_string(), "crouton".to_string())]);
        let rendered = facts_table(&facts);
        assert!(rendered.contains("username"));
        assert!(rendered.contains("crouton"));
    }
}
