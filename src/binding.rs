//! Structured checks on the contents of deployment configuration files.
//!
//! Files are parsed in their own format and normalized to a JSON value tree,
//! so a rule never matches text inside comments and never depends on
//! whitespace or quoting.

use std::io;
use std::path::Path;

use serde_json::Value;

use crate::config::{Binding, Format, Rule};
use crate::error::CheckFailure;

/// Evidence that a binding held, rendered as the success line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingMatch {
    pub label: String,
    pub summary: String,
}

pub async fn check_binding(root: &Path, binding: &Binding) -> Result<BindingMatch, CheckFailure> {
    let path = root.join(&binding.file);
    let format = binding
        .format
        .or_else(|| Format::infer(&binding.file))
        .unwrap_or(Format::Json);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CheckFailure::MissingConfigFile {
                path: binding.file.clone(),
            });
        }
        Err(err) => {
            tracing::debug!(file=%path.display(), "binding: read failed: {}", err);
            return Err(CheckFailure::UnreadableConfig {
                file: binding.file.clone(),
                format,
                reason: err.to_string(),
            });
        }
    };
    let doc = parse_document(&content, format).map_err(|reason| {
        CheckFailure::UnreadableConfig {
            file: binding.file.clone(),
            format,
            reason,
        }
    })?;
    evaluate(binding, &doc)
}

pub fn parse_document(content: &str, format: Format) -> Result<Value, String> {
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| e.to_string())?;
            serde_json::to_value(yaml).map_err(|e| e.to_string())
        }
        Format::Toml => {
            let toml: toml::Value = toml::from_str(content).map_err(|e| e.to_string())?;
            serde_json::to_value(toml).map_err(|e| e.to_string())
        }
    }
}

pub fn evaluate(binding: &Binding, doc: &Value) -> Result<BindingMatch, CheckFailure> {
    let file = binding.file.display().to_string();
    match &binding.rule {
        Rule::Contains { value } => {
            if contains_string(doc, value) {
                Ok(BindingMatch {
                    label: binding.label.clone(),
                    summary: format!("{} found in {}", value, file),
                })
            } else {
                Err(CheckFailure::BindingMismatch {
                    file: binding.file.clone(),
                    detail: format!("BINDING ERROR: {} mapping missing in {}", value, file),
                })
            }
        }
        Rule::Equals { field, value } => {
            let found = resolve(doc, field);
            if found.iter().any(|v| scalar_eq(v, value)) {
                return Ok(BindingMatch {
                    label: binding.label.clone(),
                    summary: format!("{} → {} = {}", file, field, value),
                });
            }
            let seen = if found.is_empty() {
                "field is absent".to_string()
            } else {
                let rendered: Vec<String> = found.iter().map(|v| v.to_string()).collect();
                format!("found {}", rendered.join(", "))
            };
            Err(CheckFailure::BindingMismatch {
                file: binding.file.clone(),
                detail: format!(
                    "PATH ERROR: {} does not set {} to {} ({})",
                    file, field, value, seen
                ),
            })
        }
        Rule::Present { field } => {
            if resolve(doc, field).is_empty() {
                Err(CheckFailure::BindingMismatch {
                    file: binding.file.clone(),
                    detail: format!("BINDING ERROR: {} missing in {}", field, file),
                })
            } else {
                Ok(BindingMatch {
                    label: binding.label.clone(),
                    summary: format!("{} defines {}", file, field),
                })
            }
        }
    }
}

fn contains_string(doc: &Value, needle: &str) -> bool {
    match doc {
        Value::String(s) => s == needle,
        Value::Array(items) => items.iter().any(|v| contains_string(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_string(v, needle)),
        _ => false,
    }
}

/// Resolve a dotted path. Arrays met along the way fan out over their elements.
fn resolve<'a>(doc: &'a Value, field: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for key in field.split('.').filter(|k| !k.is_empty()) {
        let mut next = Vec::new();
        for value in current {
            collect_key(value, key, &mut next);
        }
        current = next;
    }
    current
}

fn collect_key<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(v) = map.get(key) {
                out.push(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_key(item, key, out);
            }
        }
        _ => {}
    }
}

fn scalar_eq(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        _ => false,
    }
}
