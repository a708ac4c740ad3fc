use serde::{Deserialize, Deserializer, Serialize};

/// a status report as read back from the collection
///
/// every field is optional on read: the store owns the data and partial
/// records are still displayed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// identifier assigned by the store (string or number on the wire)
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    /// display label of the reporting device
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    /// short status label (e.g. "online")
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,

    /// public ip of the device, if it was known
    #[serde(default, deserialize_with = "lenient_string")]
    pub ip: Option<String>,

    /// `YYYY-MM-DD HH:mm:ss` in the writer's fixed timezone
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
}

impl Record {
    /// sort key for newest-first ordering
    ///
    /// plain string comparison: dates are zero-padded with a fixed field
    /// order, so lexicographic order is chronological order.
    pub fn date_key(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }
}

/// the create payload, `{name, status, ip, date}`
///
/// `ip` is always serialized, as `null` when unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewRecord {
    pub name: String,
    pub status: String,
    pub ip: Option<String>,
    pub date: String,
}

/// accept strings, numbers and booleans; anything else is kept as its json text
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
