use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// An editable score cell. Interactive edits may leave a cell blank, so the
/// wire form is either a JSON number or a string; an empty string is the
/// blank sentinel. Unparseable strings normalize to `Empty` on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScoreValue {
    #[default]
    Empty,
    Number(f64),
}

impl ScoreValue {
    pub fn from_f64(v: Option<f64>) -> Self {
        match v {
            Some(n) => ScoreValue::Number(n),
            None => ScoreValue::Empty,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScoreValue::Empty => None,
            ScoreValue::Number(n) => Some(*n),
        }
    }
}

impl Serialize for ScoreValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScoreValue::Empty => serializer.serialize_str(""),
            ScoreValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for ScoreValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => {
                if !n.is_finite() {
                    return Err(D::Error::custom("score must be finite"));
                }
                Ok(ScoreValue::Number(n))
            }
            Raw::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(ScoreValue::Empty);
                }
                Ok(t.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(ScoreValue::Number)
                    .unwrap_or(ScoreValue::Empty))
            }
        }
    }
}

/// One graded item inside a class. `weight` is the category weight shared by
/// every assignment in that category, not a per-assignment value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub date: String,
    pub weight: f64,
    pub earned_score: ScoreValue,
    pub total_score: ScoreValue,
}

/// A class and its assignments in chronological order (oldest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
    pub assignments: Vec<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_visited: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_value_accepts_numbers_and_blank_strings() {
        let v: ScoreValue = serde_json::from_value(serde_json::json!(7.5)).expect("number");
        assert_eq!(v, ScoreValue::Number(7.5));

        let v: ScoreValue = serde_json::from_value(serde_json::json!("")).expect("blank");
        assert_eq!(v, ScoreValue::Empty);

        let v: ScoreValue = serde_json::from_value(serde_json::json!(" 12.5 ")).expect("string");
        assert_eq!(v, ScoreValue::Number(12.5));

        let v: ScoreValue = serde_json::from_value(serde_json::json!("n/a")).expect("junk");
        assert_eq!(v, ScoreValue::Empty);
    }

    #[test]
    fn score_value_round_trips_blank_as_empty_string() {
        let blank = serde_json::to_value(ScoreValue::Empty).expect("serialize");
        assert_eq!(blank, serde_json::json!(""));

        let num = serde_json::to_value(ScoreValue::Number(85.0)).expect("serialize");
        assert_eq!(num, serde_json::json!(85.0));
    }
}
