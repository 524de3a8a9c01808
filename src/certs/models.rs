//! Records persisted in the certificate dashboard store.
//!
//! Stored records are decoded leniently: a field with an unexpected type
//! falls back to its default instead of failing the whole document, so one
//! hand-edited value never makes the store read as empty.

use serde::{Deserialize, Serialize};

mod lenient {
    use serde::{de::DeserializeOwned, Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    /// Strings as-is, numbers and booleans rendered, anything else empty.
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(value) => value,
            value @ (Value::Number(_) | Value::Bool(_)) => value.to_string(),
            _ => String::new(),
        })
    }

    /// The decoded value, or the default when it does not fit (unknown status).
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(T::deserialize(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    /// Unknown link states fail closed.
    pub fn link_status<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<super::LinkStatus, D::Error> {
        Ok(
            super::LinkStatus::deserialize(Value::deserialize(deserializer)?)
                .unwrap_or(super::LinkStatus::Revoked),
        )
    }

    /// Array entries that decode as records; anything else is skipped.
    pub fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                warn!("cert store collection is not a list, ignoring: {other}");
                Vec::new()
            }
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match T::deserialize(item) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!("skipping unreadable cert store record: {err}");
                    None
                }
            })
            .collect())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Requested,
    Issued,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Active,
    Expired,
    Revoked,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Active,
}

/// A device holding an issued client certificate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Device {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub request_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub platform: String,
    #[serde(deserialize_with = "lenient::string")]
    pub cert_cn: String,
    #[serde(deserialize_with = "lenient::string")]
    pub issued_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub expires_at: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: DeviceStatus,
    #[serde(deserialize_with = "lenient::string")]
    pub created_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub updated_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CertRequest {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub device_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub platform: String,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: RequestStatus,
    #[serde(deserialize_with = "lenient::string")]
    pub requested_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub issued_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub expires_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub device_id: String,
}

/// Time-limited link that lets a device owner fetch install instructions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DistributionLink {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub request_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub token: String,
    #[serde(deserialize_with = "lenient::link_status")]
    pub status: LinkStatus,
    #[serde(deserialize_with = "lenient::string")]
    pub created_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub expires_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
    #[serde(deserialize_with = "lenient::string")]
    pub distribution_url_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AuditRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub actor: String,
    #[serde(deserialize_with = "lenient::string")]
    pub action: String,
    #[serde(deserialize_with = "lenient::string")]
    pub target_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub target_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub detail: String,
}

/// What an unauthenticated distribution link reveals.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub request_id: String,
    pub device_name: String,
    pub platform: String,
    pub note: String,
    pub status: RequestStatus,
    pub manual_steps: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StoreState {
    #[serde(deserialize_with = "lenient::records")]
    pub devices: Vec<Device>,
    #[serde(deserialize_with = "lenient::records")]
    pub requests: Vec<CertRequest>,
    #[serde(deserialize_with = "lenient::records")]
    pub links: Vec<DistributionLink>,
    #[serde(deserialize_with = "lenient::records")]
    pub audit: Vec<AuditRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn partial_state_fills_missing_collections() -> Result<()> {
        let state: StoreState =
            serde_json::from_str(r#"{"requests": [{"id": "r1", "device_name": "phone"}]}"#)?;
        assert!(state.devices.is_empty());
        assert_eq!(state.requests[0].status, RequestStatus::Requested);
        assert!(state.requests[0].issued_at.is_empty());
        Ok(())
    }

    #[test]
    fn mistyped_fields_fall_back_instead_of_failing() -> Result<()> {
        let state: StoreState = serde_json::from_str(
            r#"{
                "requests": [
                    {"id": "r1", "device_name": "phone", "note": null, "status": "pending"},
                    {"id": 7, "device_name": "tablet", "platform": ["ios"], "status": "issued"},
                    "garbage"
                ],
                "links": [{"id": "l1", "token": "t", "status": "paused"}],
                "audit": {"not": "a list"}
            }"#,
        )?;
        assert_eq!(state.requests.len(), 2);
        assert_eq!(state.requests[0].note, "");
        assert_eq!(state.requests[0].status, RequestStatus::Requested);
        assert_eq!(state.requests[1].id, "7");
        assert!(state.requests[1].platform.is_empty());
        assert_eq!(state.requests[1].status, RequestStatus::Issued);
        assert_eq!(state.links[0].status, LinkStatus::Revoked);
        assert!(state.audit.is_empty());
        Ok(())
    }

    #[test]
    fn statuses_are_lowercase() -> Result<()> {
        assert_eq!(serde_json::to_value(LinkStatus::Revoked)?, "revoked");
        assert_eq!(serde_json::to_value(RequestStatus::Issued)?, "issued");
        Ok(())
    }
}
