use std::fmt::Display;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json as json;
use tokio::time::{Instant, sleep};

use crate::result::{Result, StepError};
use crate::session::{PageSession, Selector};

pub const DEFAULT_TIMEOUT: Timeout = Timeout(5_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A duration in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeout(pub u64);

impl Timeout {
    pub fn from_secs(secs: u64) -> Self {
        Timeout(secs.saturating_mul(1000))
    }

    pub fn to_duration(&self) -> Duration {
        let Timeout(millis) = self;
        Duration::from_millis(*millis)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Visible(Selector),
    Count(Selector, usize),
    /// A page expression that must evaluate to a truthy value.
    Function(String),
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Visible(selector) => {
                write!(f, "{:?} to be visible", selector.as_str())
            }
            Condition::Count(selector, count) => {
                write!(f, "{} elements matching {:?}", count, selector.as_str())
            }
            Condition::Function(expression) => {
                write!(f, "{:?} to be truthy", expression)
            }
        }
    }
}

struct Observation {
    satisfied: bool,
    description: String,
}

impl Condition {
    async fn observe<S: PageSession>(
        &self,
        session: &mut S,
    ) -> Result<Observation> {
        Ok(match self {
            Condition::Visible(selector) => {
                let probe = session.probe(selector).await?;
                Observation {
                    satisfied: probe.visible,
                    description: probe.state().to_string(),
                }
            }
            Condition::Count(selector, expected) => {
                let probe = session.probe(selector).await?;
                Observation {
                    satisfied: probe.count == *expected,
                    description: format!("{} elements", probe.count),
                }
            }
            Condition::Function(expression) => {
                let value = session.evaluate(expression).await?;
                Observation {
                    satisfied: is_truthy(&value),
                    description: value.to_string(),
                }
            }
        })
    }
}

fn is_truthy(value: &json::Value) -> bool {
    match value {
        json::Value::Null => false,
        json::Value::Bool(b) => *b,
        json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        json::Value::String(s) => !s.is_empty(),
        json::Value::Array(_) | json::Value::Object(_) => true,
    }
}

/// Polls `condition` until it holds or `timeout` elapses. The condition is
/// checked once before the first sleep, so an already-satisfied condition
/// returns without waiting.
pub async fn wait_for<S: PageSession>(
    session: &mut S,
    condition: &Condition,
    timeout: Timeout,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout.to_duration();
    loop {
        let observation = condition.observe(session).await?;
        if observation.satisfied {
            log::debug!("{} holds ({})", condition, observation.description);
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(StepError::Timeout {
                condition: condition.to_string(),
                timeout,
                last: observation.description,
            });
        }
        sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Sleeps unconditionally. Only for states that have no observable
/// readiness signal; prefer `wait_for`.
pub async fn wait_fixed(duration: Timeout) {
    log::debug!("waiting a fixed {}ms", duration.0);
    sleep(duration.to_duration()).await;
}
