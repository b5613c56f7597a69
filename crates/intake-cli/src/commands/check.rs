//! `intake check` command implementation

use anyhow::Result;
use clap::Args;
use intake_api::EndpointRegistry;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Arguments for `intake check`
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Definition file (.yaml, .yml or .json)
    pub definitions: PathBuf,

    /// Also list every field and parameter with its type
    #[arg(short, long)]
    pub verbose: bool,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let registry = super::load_registry(&args.definitions)?;
    print!("{}", summary(&registry, args.verbose));
    Ok(())
}

/// Render the models (leaves first) and endpoints of a compiled registry
pub fn summary(registry: &EndpointRegistry, verbose: bool) -> String {
    let schemas = registry.schemas();
    let mut out = String::new();

    let _ = writeln!(out, "Models ({}):", schemas.len());
    for name in schemas.nesting_order() {
        let Some(model) = schemas.get(name) else {
            continue;
        };
        let _ = writeln!(out, "  {}", model.name);
        if verbose {
            for field in &model.fields {
                let _ = writeln!(out, "    {}: {}{}", field.name, field.field_type, marker(field.required));
            }
        }
    }

    let _ = writeln!(out, "Endpoints ({}):", registry.len());
    for endpoint in registry.endpoints() {
        match &endpoint.name {
            Some(name) => {
                let _ = writeln!(out, "  {} ({})", endpoint, name);
            }
            None => {
                let _ = writeln!(out, "  {}", endpoint);
            }
        }
        if verbose {
            for spec in &endpoint.params {
                let field = &spec.field;
                let _ = writeln!(
                    out,
                    "    [{}] {}: {}{}{}",
                    field.source,
                    field.input_name(),
                    field.field_type,
                    marker(field.required),
                    if spec.embed { " (embed)" } else { "" }
                );
            }
        }
    }
    out
}

fn marker(required: bool) -> &'static str {
    if required {
        ""
    } else {
        " = default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_api::Definitions;

    const DEFS: &str = r#"
models:
  - name: Image
    fields:
      - { name: url, type: HttpUrl }
  - name: Item
    fields:
      - { name: name, type: str }
      - { name: image, type: Image | None }
endpoints:
  - method: GET
    path: /items/{item_id}
    name: read_item
    params:
      - { name: item_id, type: int }
      - { name: q, type: str | None }
  - method: PATCH
    path: /items/{item_id}
    params:
      - { name: item_id, type: int }
      - { name: item, type: Item, embed: true }
"#;

    #[test]
    fn test_summary_lists_leaves_first() {
        let registry = Definitions::from_yaml_str(DEFS).unwrap().build().unwrap();
        let text = summary(&registry, false);
        assert_eq!(
            text,
            "Models (2):\n  Image\n  Item\nEndpoints (2):\n  GET /items/{item_id} (read_item)\n  PATCH /items/{item_id}\n"
        );
    }

    #[test]
    fn test_summary_verbose() {
        let registry = Definitions::from_yaml_str(DEFS).unwrap().build().unwrap();
        let text = summary(&registry, true);
        assert!(text.contains("    image: Image | None = default\n"));
        assert!(text.contains("    [path] item_id: int\n"));
        assert!(text.contains("    [query] q: str | None = default\n"));
        assert!(text.contains("    [body] item: Item (embed)\n"));
    }
}
