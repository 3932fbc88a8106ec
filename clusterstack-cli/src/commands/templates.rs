use anyhow::{Context, Result};
use clusterstack_orchestrations::templates::{Template, TemplateKind};

use crate::cli::OutputFormat;
use crate::config::Config;

pub fn run_list(config: &Config, output: OutputFormat) -> Result<()> {
    let provider = config.template_provider();
    let templates = TemplateKind::ALL
        .iter()
        .map(|kind| {
            provider
                .template(*kind)
                .with_context(|| format!("Failed to load the {} template", kind))
        })
        .collect::<Result<Vec<Template>>>()?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    for template in &templates {
        println!("{} ({})", template.kind, template.kind.file_name());
        if template.parameters.is_empty() {
            println!("  (no parameters)");
        }
        for parameter in &template.parameters {
            println!("  - {}", parameter);
        }
        println!();
    }

    Ok(())
}
