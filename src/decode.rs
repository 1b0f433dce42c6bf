use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Action, DEFAULT_WAIT_SECS, GridPoint};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("model response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("model response is JSON but not an object")]
    NotAnObject,
    #[error("`{action}` has no recognised coordinates")]
    Coordinates { action: String },
    #[error("`{action}` is missing required field `{field}`")]
    MissingField { action: String, field: &'static str },
    #[error("`{action}` has an invalid `{field}`: {reason}")]
    InvalidField {
        action: String,
        field: &'static str,
        reason: &'static str,
    },
}

impl DecodeError {
    /// Fatal errors end the task; the rest only skip the current step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::Malformed(_) | DecodeError::NotAnObject)
    }
}

/// Key family a point can be spelled with: two scalar keys, or a pair under
/// either the first scalar key or a dedicated pair key.
struct PointKeys {
    x: &'static str,
    y: &'static str,
    pair: &'static str,
}

const TARGET: PointKeys = PointKeys {
    x: "x",
    y: "y",
    pair: "coordinate",
};
const DRAG_FROM: PointKeys = PointKeys {
    x: "from_x",
    y: "from_y",
    pair: "from",
};
const DRAG_TO: PointKeys = PointKeys {
    x: "to_x",
    y: "to_y",
    pair: "to",
};

type PointStrategy = fn(&Map<String, Value>, &PointKeys) -> Option<GridPoint>;

/// Tried in order; the first that yields a point wins.
const POINT_STRATEGIES: [PointStrategy; 3] = [scalar_fields, pair_under_x, pair_under_pair_key];

fn scalar_fields(obj: &Map<String, Value>, keys: &PointKeys) -> Option<GridPoint> {
    let x = obj.get(keys.x)?.as_f64()?;
    let y = obj.get(keys.y)?.as_f64()?;
    Some(GridPoint::new(x, y))
}

fn pair_under_x(obj: &Map<String, Value>, keys: &PointKeys) -> Option<GridPoint> {
    as_pair(obj.get(keys.x)?)
}

fn pair_under_pair_key(obj: &Map<String, Value>, keys: &PointKeys) -> Option<GridPoint> {
    as_pair(obj.get(keys.pair)?)
}

fn as_pair(value: &Value) -> Option<GridPoint> {
    match value.as_array()?.as_slice() {
        [x, y] => Some(GridPoint::new(x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

fn extract_point(
    obj: &Map<String, Value>,
    keys: &PointKeys,
    action: &str,
) -> Result<GridPoint, DecodeError> {
    POINT_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(obj, keys))
        .ok_or_else(|| DecodeError::Coordinates {
            action: action.to_string(),
        })
}

/// Strip whitespace and markdown code fences the model sometimes adds.
pub fn strip_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Decode raw model text into an [`Action`].
pub fn decode_response(text: &str) -> Result<Action, DecodeError> {
    let value: Value = serde_json::from_str(strip_fences(text))?;
    decode_value(&value)
}

/// Decode an already parsed JSON value into an [`Action`].
pub fn decode_value(value: &Value) -> Result<Action, DecodeError> {
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let Some(name) = obj.get("action").and_then(Value::as_str) else {
        return Ok(Action::Unknown {
            name: obj.get("action").map(|v| v.to_string()),
        });
    };

    let action = match name {
        "click" => Action::Click(extract_point(obj, &TARGET, name)?),
        "double_click" => Action::DoubleClick(extract_point(obj, &TARGET, name)?),
        "right_click" => Action::RightClick(extract_point(obj, &TARGET, name)?),
        "type" => {
            let text = required(obj, "text", name)?
                .as_str()
                .ok_or_else(|| invalid(name, "text", "expected a string"))?;
            Action::Type {
                text: text.to_string(),
            }
        }
        "hotkey" => {
            let keys = required(obj, "keys", name)?
                .as_array()
                .ok_or_else(|| invalid(name, "keys", "expected an array of key names"))?
                .iter()
                .map(|k| k.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid(name, "keys", "expected an array of key names"))?;
            if keys.is_empty() {
                return Err(invalid(name, "keys", "no keys given"));
            }
            Action::Hotkey { keys }
        }
        "scroll" => Action::Scroll {
            dx: optional_int(obj, "dx", name)?,
            dy: optional_int(obj, "dy", name)?,
        },
        "drag" => Action::Drag {
            from: extract_point(obj, &DRAG_FROM, name)?,
            to: extract_point(obj, &DRAG_TO, name)?,
        },
        "navigate" => {
            let url = required(obj, "url", name)?
                .as_str()
                .ok_or_else(|| invalid(name, "url", "expected a string"))?;
            Action::Navigate {
                url: url.to_string(),
            }
        }
        "wait" => {
            let seconds = match obj.get("seconds") {
                None | Some(Value::Null) => DEFAULT_WAIT_SECS,
                Some(v) => v
                    .as_f64()
                    .ok_or_else(|| invalid(name, "seconds", "expected a number"))?,
            };
            Action::Wait {
                seconds: seconds.max(0.0),
            }
        }
        "done" => Action::Done {
            result: match obj.get("result") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            },
        },
        other => Action::Unknown {
            name: Some(other.to_string()),
        },
    };

    Ok(action)
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
    action: &str,
) -> Result<&'a Value, DecodeError> {
    obj.get(field).ok_or_else(|| DecodeError::MissingField {
        action: action.to_string(),
        field,
    })
}

fn optional_int(
    obj: &Map<String, Value>,
    field: &'static str,
    action: &str,
) -> Result<i64, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| invalid(action, field, "expected an integer")),
    }
}

fn invalid(action: &str, field: &'static str, reason: &'static str) -> DecodeError {
    DecodeError::InvalidField {
        action: action.to_string(),
        field,
        reason,
    }
}
