//! Shipping address models.

use delguur_core::AddressId;
use serde::{Deserialize, Serialize};

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub receiver_name: String,
    pub phone: String,
    /// Aimag or the capital city.
    pub province: String,
    /// Sum or district.
    pub district: String,
    #[serde(default)]
    pub khoroo: Option<String>,
    pub detail: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Single-line rendering for summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.province.as_str(), self.district.as_str()];
        if let Some(khoroo) = self.khoroo.as_deref() {
            parts.push(khoroo);
        }
        parts.push(self.detail.as_str());
        parts.retain(|p| !p.is_empty());
        parts.join(", ")
    }
}

/// Fields for creating or replacing an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub receiver_name: String,
    pub phone: String,
    pub province: String,
    pub district: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub khoroo: Option<String>,
    pub detail: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Reject inputs the backend would refuse anyway.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("receiver name", &self.receiver_name),
            ("phone", &self.phone),
            ("province", &self.province),
            ("district", &self.district),
            ("detail", &self.detail),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("{name} is required"));
        }
        if !self.phone.chars().all(|c| c.is_ascii_digit() || c == '+') {
            return Err("phone may only contain digits".to_string());
        }
        Ok(())
    }
}
