//! Payment gateway deposit notifications
//!
//! The gateway posts a JSON envelope such as:
//!
//! ```json
//! {
//!   "event": "charge.success",
//!   "data": { "reference": "D1", "amount": 50000, "metadata": { "userId": "user-1" } }
//! }
//! ```
//!
//! Amounts are in minor units. Only `charge.success` moves money; every other
//! event is acknowledged and ignored. Signature checks happen before the
//! payload reaches this module.

use crate::{
    error::{Error, Result},
    types::OwnerId,
};
use serde::{Deserialize, Serialize};

/// Event name that credits a wallet
pub const CHARGE_SUCCESS: &str = "charge.success";

/// Webhook envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositNotification {
    /// Gateway event name
    pub event: String,

    /// Event payload
    pub data: ChargeData,
}

/// Charge payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeData {
    /// Gateway-assigned deposit reference
    pub reference: String,

    /// Amount in minor units
    pub amount: i64,

    /// Metadata attached when the charge was initialised
    #[serde(default)]
    pub metadata: Option<ChargeMetadata>,
}

/// Charge metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeMetadata {
    /// Owner whose wallet is credited
    #[serde(rename = "userId", default, deserialize_with = "owner_from_json")]
    pub user_id: Option<String>,
}

/// Gateways send user IDs as either strings or numbers
fn owner_from_json<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl DepositNotification {
    /// Decode a raw webhook body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("malformed deposit notification: {}", e)))
    }

    /// Whether this event should credit a wallet
    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS
    }

    /// Owner named in the metadata, if any
    pub fn owner(&self) -> Option<OwnerId> {
        self.data
            .metadata
            .as_ref()
            .and_then(|m| m.user_id.as_deref())
            .and_then(|id| OwnerId::parse(id).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_charge_success() {
        let body = br#"{
            "event": "charge.success",
            "data": {"reference": "D1", "amount": 50000, "metadata": {"userId": "user-1"}}
        }"#;

        let notification = DepositNotification::from_slice(body).unwrap();
        assert!(notification.is_charge_success());
        assert_eq!(notification.data.reference, "D1");
        assert_eq!(notification.data.amount, 50000);
        assert_eq!(notification.owner(), Some(OwnerId::new("user-1")));
    }

    #[test]
    fn test_numeric_user_id_and_missing_metadata() {
        let numeric = br#"{"event":"charge.success","data":{"reference":"D2","amount":1,"metadata":{"userId":42}}}"#;
        assert_eq!(
            DepositNotification::from_slice(numeric).unwrap().owner(),
            Some(OwnerId::new("42"))
        );

        let bare = br#"{"event":"transfer.failed","data":{"reference":"D3","amount":1}}"#;
        let notification = DepositNotification::from_slice(bare).unwrap();
        assert!(!notification.is_charge_success());
        assert!(notification.owner().is_none());
    }

    #[test]
    fn test_malformed_body_is_validation_error() {
        assert!(matches!(
            DepositNotification::from_slice(b"{not json"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            DepositNotification::from_slice(br#"{"event":"charge.success"}"#),
            Err(Error::Validation(_))
        ));
    }
}
