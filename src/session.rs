use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json as json;
use url::Url;

use crate::result::Result;

#[cfg(test)]
pub(crate) mod fake;

/// A CSS selector, matched with `document.querySelectorAll`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn new(selector: impl Into<String>) -> Self {
        Selector(selector.into())
    }

    /// Scopes this selector to descendants of `ancestor`.
    pub fn within(&self, ancestor: &Selector) -> Self {
        Selector(format!("{} {}", ancestor.0, self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Selector::new(value)
    }
}

/// What a selector currently matches. Visibility and text describe the first
/// match only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementProbe {
    pub count: usize,
    pub visible: bool,
    pub text: Option<String>,
}

impl ElementProbe {
    pub fn absent() -> Self {
        ElementProbe::default()
    }

    pub fn state(&self) -> &'static str {
        match (self.count, self.visible) {
            (0, _) => "absent",
            (_, true) => "visible",
            (_, false) => "hidden",
        }
    }
}

/// One open document in one browser tab. The runner only talks to the page
/// through this trait.
#[allow(async_fn_in_trait)]
pub trait PageSession {
    async fn navigate(&mut self, url: &Url) -> Result<()>;

    /// Assigns `value` to `globalThis[name]`.
    async fn inject_global(
        &mut self,
        name: &str,
        value: &json::Value,
    ) -> Result<()>;

    async fn evaluate(&mut self, script: &str) -> Result<json::Value>;

    async fn probe(&mut self, selector: &Selector) -> Result<ElementProbe>;

    /// Captures the viewport as PNG.
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    async fn close(self) -> anyhow::Result<()>;
}
