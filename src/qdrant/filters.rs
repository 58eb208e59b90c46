//! Tenant-scoped filter builders.
//!
//! Every filter starts with the tenant condition; there is no builder for an unscoped filter.

use serde_json::{Value, json};

use crate::index::SearchScope;
use crate::model::TenantKey;

/// Payload key holding the tenant partition.
pub const TENANT_KEY: &str = "tenant";
/// Payload key holding the source document id.
pub const DOCUMENT_KEY: &str = "document_id";

fn tenant_condition(tenant: &TenantKey) -> Value {
    json!({
        "key": TENANT_KEY,
        "match": { "value": tenant.as_str() }
    })
}

/// Filter matching every point owned by `tenant`.
pub fn build_tenant_filter(tenant: &TenantKey) -> Value {
    json!({ "must": [tenant_condition(tenant)] })
}

/// Conjunction filter matching one document of one tenant.
pub fn build_document_filter(tenant: &TenantKey, document_id: &str) -> Value {
    json!({
        "must": [
            tenant_condition(tenant),
            {
                "key": DOCUMENT_KEY,
                "match": { "value": document_id }
            }
        ]
    })
}

/// Search filter: tenant always, plus an any-of document condition when the scope lists ids.
pub fn build_scope_filter(scope: &SearchScope) -> Value {
    let mut must = vec![tenant_condition(scope.tenant_key())];
    if !scope.document_ids().is_empty() {
        must.push(json!({
            "key": DOCUMENT_KEY,
            "match": { "any": scope.document_ids() }
        }));
    }
    json!({ "must": must })
}
