//! Template bodies for the network and cluster stacks
//!
//! Bodies are opaque to the orchestrator; the only thing read out of them is the list of
//! declared parameter names.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Network,
    Cluster,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 2] = [TemplateKind::Network, TemplateKind::Cluster];

    pub fn name(&self) -> &'static str {
        match self {
            TemplateKind::Network => "network",
            TemplateKind::Cluster => "cluster",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateKind::Network => "network-stack.json",
            TemplateKind::Cluster => "ecs-cluster.json",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub kind: TemplateKind,
    #[serde(skip)]
    pub body: String,
    /// Parameter names declared by the template, in declaration order
    pub parameters: Vec<String>,
}

impl Template {
    pub fn from_body(kind: TemplateKind, body: impl Into<String>) -> Result<Self, ProvisionError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(ProvisionError::Template {
                name: kind.name().to_string(),
                reason: "template body is empty".to_string(),
            });
        }

        // JSON templates are valid YAML, so one parser covers both formats
        let document: serde_yaml::Value =
            serde_yaml::from_str(&body).map_err(|e| ProvisionError::Template {
                name: kind.name().to_string(),
                reason: format!("failed to parse template: {}", e),
            })?;

        let parameters = document
            .get("Parameters")
            .and_then(|p| p.as_mapping())
            .map(|mapping| {
                mapping
                    .keys()
                    .filter_map(|key| key.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { kind, body, parameters })
    }

    pub fn declares(&self, parameter: &str) -> bool {
        self.parameters.iter().any(|p| p == parameter)
    }
}

/// Source of template bodies
pub trait TemplateProvider: Send + Sync {
    fn template(&self, kind: TemplateKind) -> Result<Template, ProvisionError>;
}

/// Templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl TemplateProvider for EmbeddedTemplates {
    fn template(&self, kind: TemplateKind) -> Result<Template, ProvisionError> {
        let body = match kind {
            TemplateKind::Network => include_str!("../templates/network-stack.json"),
            TemplateKind::Cluster => include_str!("../templates/ecs-cluster.json"),
        };
        Template::from_body(kind, body)
    }
}

/// Templates read from a local directory at call time, for iterating on template changes
/// without rebuilding
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateProvider for DirectoryTemplates {
    fn template(&self, kind: TemplateKind) -> Result<Template, ProvisionError> {
        let path = self.dir.join(kind.file_name());
        let body = std::fs::read_to_string(&path).map_err(|e| ProvisionError::Template {
            name: kind.name().to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Template::from_body(kind, body)
    }
}
