use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use serde_json as json;
use url::Url;

use crate::result::{Result, StepError};
use crate::session::{ElementProbe, PageSession, Selector};

/// Scripted in-memory page. Each selector replays its queued probes in
/// order and then keeps answering with the last one.
#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    probes: HashMap<Selector, VecDeque<ElementProbe>>,
    results: HashMap<String, json::Value>,
    throwing: HashSet<String>,
    unreachable: HashSet<Url>,
    pub globals: HashMap<String, json::Value>,
    pub calls: Vec<String>,
    pub probe_count: usize,
    closed: Rc<Cell<bool>>,
}

impl FakeSession {
    pub fn new() -> Self {
        FakeSession::default()
    }

    /// Flips to `true` once the session is closed, which consumes it.
    pub fn closed(&self) -> Rc<Cell<bool>> {
        self.closed.clone()
    }

    pub fn with_element(
        mut self,
        selector: &str,
        text: Option<&str>,
        visible: bool,
    ) -> Self {
        self.probes.insert(
            Selector::new(selector),
            VecDeque::from([ElementProbe {
                count: 1,
                visible,
                text: text.map(str::to_string),
            }]),
        );
        self
    }

    pub fn with_probes(
        mut self,
        selector: &str,
        probes: impl IntoIterator<Item = ElementProbe>,
    ) -> Self {
        self.probes
            .insert(Selector::new(selector), probes.into_iter().collect());
        self
    }

    pub fn with_result(mut self, script: &str, value: json::Value) -> Self {
        self.results.insert(script.to_string(), value);
        self
    }

    pub fn with_throwing(mut self, script: &str) -> Self {
        self.throwing.insert(script.to_string());
        self
    }

    pub fn with_unreachable(mut self, url: &Url) -> Self {
        self.unreachable.insert(url.clone());
        self
    }
}

impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        self.calls.push(format!("navigate {}", url));
        if self.unreachable.contains(url) {
            return Err(StepError::Navigation {
                url: url.to_string(),
                reason: "unreachable".to_string(),
            });
        }
        Ok(())
    }

    async fn inject_global(
        &mut self,
        name: &str,
        value: &json::Value,
    ) -> Result<()> {
        self.calls.push(format!("inject {}", name));
        self.globals.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<json::Value> {
        self.calls.push(format!("evaluate {}", script));
        if self.throwing.contains(script) {
            return Err(StepError::Evaluation(format!(
                "Uncaught ReferenceError in {}",
                script
            )));
        }
        let value = self.results.get(script).cloned();
        Ok(value.unwrap_or(json::Value::Null))
    }

    async fn probe(&mut self, selector: &Selector) -> Result<ElementProbe> {
        self.probe_count += 1;
        let Some(queue) = self.probes.get_mut(selector) else {
            return Ok(ElementProbe::absent());
        };
        let probe = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(probe.unwrap_or_default())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.calls.push("screenshot".to_string());
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn close(self) -> anyhow::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}
