use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Account record read from the CRM for inclusion in the call context.
///
/// `fields` is `None` when the record could not be fetched; the account id is
/// still known from the webhook in that case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmAccountSnapshot {
    pub account_id: String,
    pub fields: Option<BTreeMap<String, String>>,
}

impl CrmAccountSnapshot {
    pub fn fetched(account_id: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self { account_id: account_id.into(), fields: Some(fields) }
    }

    pub fn unavailable(account_id: impl Into<String>) -> Self {
        Self { account_id: account_id.into(), fields: None }
    }

    pub fn is_available(&self) -> bool {
        self.fields.is_some()
    }
}
