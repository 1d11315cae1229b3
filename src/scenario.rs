use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json as json;
use url::Url;

use crate::session::Selector;
use crate::wait::Timeout;

pub mod builtin;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        #[serde(deserialize_with = "crate::target::deserialize_url")]
        url: Url,
    },
    InjectGlobal {
        name: String,
        value: json::Value,
    },
    Evaluate {
        script: String,
    },
    WaitForVisible {
        selector: Selector,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<Timeout>,
    },
    WaitForCount {
        selector: Selector,
        count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<Timeout>,
    },
    WaitForFunction {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<Timeout>,
    },
    WaitFixed {
        duration: Timeout,
    },
    AssertVisible {
        selector: Selector,
    },
    AssertText {
        selector: Selector,
        text: String,
    },
    AssertCount {
        selector: Selector,
        count: usize,
    },
    /// Relative paths resolve against the runner's output directory.
    Screenshot {
        path: PathBuf,
    },
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Navigate { url } => write!(f, "navigate to {}", url),
            Step::InjectGlobal { name, value } => {
                write!(f, "set globalThis.{} = {}", name, value)
            }
            Step::Evaluate { script } => write!(f, "evaluate `{}`", script),
            Step::WaitForVisible { selector, .. } => {
                write!(f, "wait for {:?} to be visible", selector.as_str())
            }
            Step::WaitForCount {
                selector, count, ..
            } => write!(
                f,
                "wait for {} elements matching {:?}",
                count,
                selector.as_str()
            ),
            Step::WaitForFunction { expression, .. } => {
                write!(f, "wait for `{}`", expression)
            }
            Step::WaitFixed { duration } => write!(f, "wait {}ms", duration.0),
            Step::AssertVisible { selector } => {
                write!(f, "assert {:?} is visible", selector.as_str())
            }
            Step::AssertText { selector, text } => write!(
                f,
                "assert {:?} has text {:?}",
                selector.as_str(),
                text
            ),
            Step::AssertCount { selector, count } => write!(
                f,
                "assert {} elements match {:?}",
                count,
                selector.as_str()
            ),
            Step::Screenshot { path } => {
                write!(f, "screenshot to {}", path.display())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Scenario {
            name: name.into(),
            steps,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read scenario {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("parse scenario {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(json::from_str(contents)?)
    }

    /// Screenshot paths in the order the steps write them.
    pub fn screenshots(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Screenshot { path } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}
