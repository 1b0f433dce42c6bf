//! Best-effort mining of the model's free-text `done` result. Lossy and
//! order-sensitive; nothing downstream relies on it for correctness.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub status: ReportStatus,
    pub price: Option<f64>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub quantity: Option<u64>,
    pub configuration: BTreeMap<String, Value>,
    pub message: String,
    /// Fields of a JSON result that have no typed slot above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// How a price pattern's match is turned into a number.
enum Capture {
    Whole,
    Group,
}

static PRICE_PATTERNS: LazyLock<Vec<(Regex, Capture)>> = LazyLock::new(|| {
    [
        (r"\$[\d,]+\.?\d*", Capture::Whole),
        (r"(?i)[\d,]+\.?\d*\s*dollars?", Capture::Whole),
        (r"(?i)price[:\s]+\$?([\d,]+\.?\d*)", Capture::Group),
        (r"(?i)total[:\s]+\$?([\d,]+\.?\d*)", Capture::Group),
    ]
    .into_iter()
    .map(|(pattern, capture)| (Regex::new(pattern).expect("valid price pattern"), capture))
    .collect()
});

static QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"quantity[:\s]+(\d+)").expect("valid quantity pattern"));

const SUCCESS_WORDS: [&str; 3] = ["success", "complete", "done"];
const FAILURE_WORDS: [&str; 3] = ["fail", "error", "unable"];

/// The first matching pattern decides the price, even when its text does not
/// parse as a number.
fn find_price(text: &str) -> Option<f64> {
    for (re, capture) in PRICE_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let raw = match capture {
            Capture::Whole => caps.get(0),
            Capture::Group => caps.get(1),
        }?
        .as_str();
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        return cleaned.parse().ok();
    }
    None
}

pub fn extract(result: &str) -> TaskReport {
    let lower = result.to_lowercase();

    let price = find_price(result);
    let quantity = QUANTITY
        .captures(&lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let status = if SUCCESS_WORDS.iter().any(|w| lower.contains(w)) {
        ReportStatus::Success
    } else if FAILURE_WORDS.iter().any(|w| lower.contains(w)) {
        ReportStatus::Failed
    } else if price.is_some() {
        ReportStatus::Success
    } else {
        ReportStatus::Unknown
    };

    let mut report = TaskReport {
        status,
        price,
        unit_price: None,
        total_price: price,
        quantity,
        configuration: BTreeMap::new(),
        message: result.to_string(),
        extra: BTreeMap::new(),
    };

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(result.trim()) {
        report.apply_fields(fields);
    }
    report
}

impl TaskReport {
    /// Fields from a structured result override the heuristics. Keys with a
    /// typed slot always land in that slot; `extra` only holds the rest.
    fn apply_fields(&mut self, fields: serde_json::Map<String, Value>) {
        for (key, value) in fields {
            match key.as_str() {
                "status" => {
                    let status = value.as_str().unwrap_or_default().to_lowercase();
                    self.status = match status.as_str() {
                        "success" => ReportStatus::Success,
                        "failed" | "failure" | "error" => ReportStatus::Failed,
                        _ => ReportStatus::Unknown,
                    };
                }
                "price" => self.price = json_amount(&value),
                "unit_price" => self.unit_price = json_amount(&value),
                "total_price" => self.total_price = json_amount(&value),
                "quantity" => {
                    self.quantity = match &value {
                        Value::String(s) => s.trim().parse().ok(),
                        v => v.as_u64(),
                    }
                }
                "configuration" => {
                    self.configuration = match value {
                        Value::Object(map) => map.into_iter().collect(),
                        _ => BTreeMap::new(),
                    }
                }
                "message" => {
                    self.message = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    }
                }
                _ => {
                    self.extra.insert(key, value);
                }
            }
        }
    }
}

/// A number, or a string such as `"$1,200.50"`; anything else clears the slot.
fn json_amount(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            cleaned.parse().ok()
        }
        v => v.as_f64(),
    }
}
