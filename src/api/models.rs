use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Response from the DeliveryInfo.aspx endpoint.
///
/// Every field is optional: the payload shape varies between sessions and
/// Panopto deployments. Scalars of an unexpected type read as absent rather
/// than failing the whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeliveryInfoResponse {
    #[serde(default)]
    pub error_code: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "lenient_record")]
    pub delivery: Option<Delivery>,
}

impl DeliveryInfoResponse {
    /// Upstream signals failure with any truthy `ErrorCode`.
    pub fn has_error(&self) -> bool {
        match &self.error_code {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(code)) => code.as_f64() != Some(0.0),
            Some(Value::String(code)) => !code.is_empty(),
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Delivery {
    #[serde(default, rename = "PublicID", deserialize_with = "lenient_string")]
    pub public_id: Option<String>,
    #[serde(default, rename = "SessionID", deserialize_with = "lenient_string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub session_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub duration: Option<f64>,
    /// Tri-state upstream; only an explicit `true` counts.
    #[serde(default)]
    pub is_audio_podcast_encode_complete: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub podcast_streams: Vec<StreamEntry>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub streams: Vec<StreamEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_http_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub stream_variants: Vec<StreamVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamVariant {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_url: Option<String>,
}

type DeResult<T, E> = std::result::Result<T, E>;

/// Strings as-is, numbers in their JSON spelling, anything else absent.
fn lenient_string<'de, D>(deserializer: D) -> DeResult<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => Some(value),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    })
}

/// Numbers, or strings that parse as one; anything else absent.
fn lenient_number<'de, D>(deserializer: D) -> DeResult<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(value)) => value.as_f64(),
        Some(Value::String(value)) => value.trim().parse().ok(),
        _ => None,
    })
}

/// Objects that fit `T`; anything else absent.
fn lenient_record<'de, D, T>(deserializer: D) -> DeResult<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

/// Arrays keep the entries that fit `T`; `null` or any other type is empty.
fn lenient_list<'de, D, T>(deserializer: D) -> DeResult<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Configuration for the delivery-info client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Resolved against the page origin.
    pub delivery_info_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            delivery_info_path: "/Panopto/Pages/Viewer/DeliveryInfo.aspx".to_string(),
        }
    }
}
