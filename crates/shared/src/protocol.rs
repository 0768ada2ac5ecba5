use std::fmt;

use serde::{
    de::{DeserializeOwned, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// Label to probability mapping that keeps the order the service sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityMap(pub Vec<(String, f64)>);

impl ProbabilityMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(label, p)| (label.as_str(), *p))
    }
}

impl<L: Into<String>> FromIterator<(L, f64)> for ProbabilityMap {
    fn from_iter<T: IntoIterator<Item = (L, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(l, p)| (l.into(), p)).collect())
    }
}

impl Serialize for ProbabilityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, probability) in &self.0 {
            map.serialize_entry(label, probability)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProbabilityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ProbabilityMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of label to probability")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, probability)) = access.next_entry::<String, f64>()? {
                    entries.push((label, probability));
                }
                Ok(ProbabilityMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Each field is read on its own; a null or mistyped field becomes `None`
/// without discarding the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model_loaded: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub model_path: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Class name, confidence and optional mapping, either at the top level of a
/// response or nested inside a [`PredictEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatPrediction {
    pub class_name: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<ProbabilityMap>,
}

/// `{ success, data?, error?, message? }`. `T` is the shape expected inside
/// `data`; decode with `IgnoredAny` to inspect only the success flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PredictEnvelope<T = FlatPrediction> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilitiesOnly {
    pub probabilities: ProbabilityMap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Services report codes as strings or numbers.
    pub fn code_text(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(code) => Some(code.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base64ClassifyRequest {
    pub image: String,
}
