use chromiumoxide::{Page, cdp::js_protocol::runtime};
use serde::de::DeserializeOwned;
use serde_json as json;

use crate::result::{Result, StepError};

/// Evaluates `expression` in the page's main world and returns its value
/// serialized as JSON. Promises are awaited; `undefined` comes back as
/// `null`.
pub async fn evaluate_expression(
    page: &Page,
    expression: impl Into<String>,
) -> Result<json::Value> {
    let returns: runtime::EvaluateReturns = page
        .execute(
            runtime::EvaluateParams::builder()
                .expression(expression)
                .return_by_value(true)
                .await_promise(true)
                .build()
                .map_err(StepError::Evaluation)?,
        )
        .await?
        .result;
    if let Some(exception) = returns.exception_details {
        let message = exception
            .exception
            .and_then(|object| object.description)
            .unwrap_or(exception.text);
        return Err(StepError::Evaluation(message));
    }
    Ok(remote_object_to_json(returns.result))
}

/// Converts a by-value evaluation result into JSON. Values JSON can't carry
/// keep their JavaScript truthiness: `NaN` becomes `null`, `-0` stays a
/// zero, `Infinity` and bigints outside the `i64`/`u64` range become
/// strings. Functions and symbols come back as their description.
pub fn remote_object_to_json(object: runtime::RemoteObject) -> json::Value {
    if let Some(value) = object.value {
        return value;
    }
    if let Some(unserializable) = &object.unserializable_value {
        return unserializable_to_json(unserializable.inner());
    }
    match (object.r#type, object.subtype) {
        (runtime::RemoteObjectType::Undefined, _)
        | (_, Some(runtime::RemoteObjectSubtype::Null)) => json::Value::Null,
        _ => object
            .description
            .map(json::Value::String)
            .unwrap_or(json::Value::Null),
    }
}

fn unserializable_to_json(literal: &str) -> json::Value {
    match literal {
        "NaN" => json::Value::Null,
        "-0" => json::Number::from_f64(-0.0)
            .map(json::Value::Number)
            .unwrap_or(json::Value::Null),
        bigint if bigint.ends_with('n') => {
            let digits = &bigint[..bigint.len() - 1];
            if let Ok(n) = digits.parse::<i64>() {
                json::Value::from(n)
            } else if let Ok(n) = digits.parse::<u64>() {
                json::Value::from(n)
            } else {
                json::Value::String(bigint.to_string())
            }
        }
        other => json::Value::String(other.to_string()),
    }
}

/// Calls `function_expression` with JSON-encoded `arguments` and decodes
/// the return value.
pub async fn evaluate_function_call<Output: DeserializeOwned>(
    page: &Page,
    function_expression: impl Into<String>,
    arguments: Vec<json::Value>,
) -> Result<Output> {
    let mut arguments_json = Vec::with_capacity(arguments.len());
    for arg in arguments {
        arguments_json.push(json::to_string(&arg)?);
    }
    let expression = format!(
        "({})({})",
        function_expression.into(),
        arguments_json.join(", ")
    );

    let value = evaluate_expression(page, expression).await?;
    Ok(json::from_value(value)?)
}
