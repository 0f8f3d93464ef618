//! Pipeline definition loaded from the checked-out repository

use crate::core::StageKind;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Fixed name of the definition file at the workspace root
pub const DEFINITION_FILE: &str = "bomba.yml";

/// Errors raised while loading a pipeline definition
///
/// Every variant exposes whatever step names could still be recovered from
/// the document, so the caller can mark those checks as `error`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pipeline definition not found at {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read pipeline definition {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse pipeline definition: {message}")]
    Parse {
        message: String,
        salvaged: DeclaredSteps,
    },

    #[error("invalid pipeline definition: {reason}")]
    Invalid {
        reason: String,
        salvaged: DeclaredSteps,
    },
}

impl ConfigError {
    /// Step names recovered from the broken definition
    pub fn salvaged(&self) -> DeclaredSteps {
        match self {
            ConfigError::Missing { .. } | ConfigError::Unreadable { .. } => DeclaredSteps::default(),
            ConfigError::Parse { salvaged, .. } | ConfigError::Invalid { salvaged, .. } => {
                salvaged.clone()
            }
        }
    }
}

/// Step names per stage, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredSteps {
    pub build: Vec<String>,
    pub test: Vec<String>,
}

impl DeclaredSteps {
    pub fn get(&self, kind: StageKind) -> &[String] {
        match kind {
            StageKind::Build => &self.build,
            StageKind::Test => &self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.build.len() + self.test.len()
    }

    /// Recover step names from a document that failed strict parsing
    fn salvage(doc: &Value) -> Self {
        Self {
            build: salvage_stage(doc.get("build")),
            test: salvage_stage(doc.get("test")),
        }
    }
}

fn salvage_stage(stage: Option<&Value>) -> Vec<String> {
    let items = match stage {
        Some(Value::Sequence(items)) => items,
        Some(Value::Mapping(map)) => match map.get("steps") {
            Some(Value::Sequence(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| item.get("name").and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Top-level pipeline definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Environment file to copy into the workspace root before execution
    #[serde(
        default,
        rename = "env",
        alias = "env_file",
        alias = "envFile",
        skip_serializing_if = "Option::is_none"
    )]
    pub env_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Stage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Stage>,
}

/// One phase of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StageDefinition")]
pub struct Stage {
    /// Runs once before any step; failure abandons the stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialize: Option<String>,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Runs once after all steps when initialize did not fail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<String>,
}

/// A stage is written either as a mapping with hooks or as a bare step list
#[derive(Deserialize)]
#[serde(untagged)]
enum StageDefinition {
    Steps(Vec<Step>),
    Full {
        #[serde(default)]
        initialize: Option<String>,
        #[serde(default)]
        steps: Vec<Step>,
        #[serde(default)]
        finalize: Option<String>,
    },
}

impl From<StageDefinition> for Stage {
    fn from(def: StageDefinition) -> Self {
        match def {
            StageDefinition::Steps(steps) => Stage {
                initialize: None,
                steps,
                finalize: None,
            },
            StageDefinition::Full {
                initialize,
                steps,
                finalize,
            } => Stage {
                initialize,
                steps,
                finalize,
            },
        }
    }
}

/// One named shell command within a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the stage; part of the status-check context
    pub name: String,

    /// Shell command run from the workspace root
    pub command: String,
}

impl Stage {
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }
}

impl PipelineConfig {
    /// Load the definition file from a workspace root
    pub fn load(workspace: &Path) -> Result<Self, ConfigError> {
        Self::from_file(workspace.join(DEFINITION_FILE))
    }

    /// Load a pipeline definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a pipeline definition
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let doc: Value = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
            salvaged: DeclaredSteps::default(),
        })?;

        // A comment-only file parses as null and means "no stages"
        if doc.is_null() {
            return Ok(Self::default());
        }

        let config: PipelineConfig =
            serde_yaml::from_value(doc.clone()).map_err(|e| ConfigError::Parse {
                message: e.to_string(),
                salvaged: DeclaredSteps::salvage(&doc),
            })?;

        config.validate().map_err(|reason| ConfigError::Invalid {
            reason,
            salvaged: DeclaredSteps::salvage(&doc),
        })?;

        Ok(config)
    }

    /// Check structural rules serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        for (kind, stage) in self.stages() {
            let mut seen = HashSet::new();
            for step in &stage.steps {
                if step.name.trim().is_empty() {
                    return Err(format!("{} stage has a step with an empty name", kind));
                }
                if !seen.insert(step.name.as_str()) {
                    return Err(format!("duplicate {} step name: {}", kind, step.name));
                }
                if step.command.trim().is_empty() {
                    return Err(format!("{} step '{}' has an empty command", kind, step.name));
                }
            }

            for (hook, command) in [("initialize", &stage.initialize), ("finalize", &stage.finalize)] {
                if command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    return Err(format!("{} {} hook is empty", kind, hook));
                }
            }
        }

        if let Some(env_file) = &self.env_file {
            let path = Path::new(env_file);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if env_file.trim().is_empty() || escapes {
                return Err(format!(
                    "env file must be a relative path inside the repository: '{}'",
                    env_file
                ));
            }
        }

        Ok(())
    }

    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        match kind {
            StageKind::Build => self.build.as_ref(),
            StageKind::Test => self.test.as_ref(),
        }
    }

    /// Present stages in execution order
    pub fn stages(&self) -> impl Iterator<Item = (StageKind, &Stage)> {
        StageKind::ORDER
            .into_iter()
            .filter_map(move |kind| self.stage(kind).map(|stage| (kind, stage)))
    }

    /// Names of all declared steps, per stage
    pub fn declared_steps(&self) -> DeclaredSteps {
        DeclaredSteps {
            build: self.build.as_ref().map(Stage::step_names).unwrap_or_default(),
            test: self.test.as_ref().map(Stage::step_names).unwrap_or_default(),
        }
    }
}
