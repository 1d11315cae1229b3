//! Single-shot checks against the current page. None of these wait or
//! retry; put a `wait_for` in front when the state may still be settling.

use crate::result::{Result, StepError};
use crate::session::{PageSession, Selector};

pub async fn assert_visible<S: PageSession>(
    session: &mut S,
    selector: &Selector,
) -> Result<()> {
    let probe = session.probe(selector).await?;
    if probe.visible {
        Ok(())
    } else {
        Err(StepError::Assertion {
            selector: selector.to_string(),
            expected: "visible".to_string(),
            actual: probe.state().to_string(),
        })
    }
}

/// Exact comparison against the first match's `textContent`.
pub async fn assert_text<S: PageSession>(
    session: &mut S,
    selector: &Selector,
    expected: &str,
) -> Result<()> {
    let probe = session.probe(selector).await?;
    match probe.text {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(StepError::Assertion {
            selector: selector.to_string(),
            expected: format!("text {:?}", expected),
            actual: format!("text {:?}", actual),
        }),
        None => Err(StepError::Assertion {
            selector: selector.to_string(),
            expected: format!("text {:?}", expected),
            actual: "no matching element".to_string(),
        }),
    }
}

pub async fn assert_count<S: PageSession>(
    session: &mut S,
    selector: &Selector,
    expected: usize,
) -> Result<()> {
    let probe = session.probe(selector).await?;
    if probe.count == expected {
        Ok(())
    } else {
        Err(StepError::Assertion {
            selector: selector.to_string(),
            expected: format!("{} elements", expected),
            actual: format!("{} elements", probe.count),
        })
    }
}
