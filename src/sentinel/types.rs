// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sentinel gateway request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AllowanceDetails {
    pub expiration: Option<DateTime<Utc>>,
}

/// A fee-grant allowance reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Allowance {
    pub grantee: String,
    pub granter: String,
    #[serde(default)]
    pub allowance: AllowanceDetails,
}

impl Allowance {
    /// Whether this allowance was granted to `grantee` by `granter`.
    pub fn is_grant(&self, grantee: &str, granter: &str) -> bool {
        self.grantee == grantee && self.granter == granter
    }
}

/// Broadcast transaction summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentinelTransaction {
    pub height: i64,
    pub txhash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SentinelApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// `{success, error?, result}` envelope used by every gateway endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SentinelEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub error: Option<SentinelApiError>,
    pub result: Option<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeeGrantRequest<'a> {
    pub mnemonic: &'a str,
    pub acc_addresses: &'a [String],
    pub allowed_msgs: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct TransferRequest<'a> {
    pub mnemonic: &'a str,
    pub to_addresses: &'a [String],
    pub amounts: &'a [String],
    pub memo: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowance_decodes_with_and_without_expiration() {
        let raw = r#"[
            {"grantee": "sent1a", "granter": "sent1g", "allowance": {"expiration": "2030-01-01T00:00:00Z"}},
            {"grantee": "sent1b", "granter": "sent1g", "allowance": {"expiration": null}},
            {"grantee": "sent1c", "granter": "sent1x"}
        ]"#;
        let allowances: Vec<Allowance> = serde_json::from_str(raw).unwrap();
        assert!(allowances[0].allowance.expiration.is_some());
        assert!(allowances[1].allowance.expiration.is_none());
        assert!(allowances[1].is_grant("sent1b", "sent1g"));
        assert!(!allowances[2].is_grant("sent1c", "sent1g"));
    }

    #[test]
    fn failed_envelope_keeps_error_message() {
        let env: SentinelEnvelope<SentinelTransaction> = serde_json::from_str(
            r#"{"success": false, "error": {"code": 5, "message": "insufficient funds"}}"#,
        )
        .unwrap();
        assert!(!env.success);
        assert_eq!(env.error.unwrap().message, "insufficient funds");
        assert!(env.result.is_none());
    }
}
