//! Tenant metadata attached to log entries

use super::fields::Fields;
use serde::{Deserialize, Serialize};

/// Field name used for the trace name passed alongside a tenant
pub const TRACE_NAME_FIELD: &str = "trace_name";

/// Fixed attribute bundle describing the tenant a log entry belongs to.
///
/// Owned by the caller and shared by reference; the normalizer copies its
/// attributes into each record without mutating it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantContext {
    pub company_id: i64,
    pub tenant_id: String,
    #[serde(rename = "store_schema")]
    pub shop_schema: String,
    pub shop_name: String,
    pub subdomain: String,
    pub domain: String,
    pub store_name: String,
    pub db_host: String,
    pub store_logo: String,
    pub is_domain_active: bool,
    pub is_email_active: bool,
    pub charge_fee_to: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    /// Flatten the tenant into log fields, one field per attribute.
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with_field("company_id", self.company_id)
            .with_field("tenant_id", self.tenant_id.as_str())
            .with_field("shop_schema", self.shop_schema.as_str())
            .with_field("shop_name", self.shop_name.as_str())
            .with_field("subdomain", self.subdomain.as_str())
            .with_field("domain", self.domain.as_str())
            .with_field("store_name", self.store_name.as_str())
            .with_field("db_host", self.db_host.as_str())
            .with_field("store_logo", self.store_logo.as_str())
            .with_field("is_domain_active", self.is_domain_active)
            .with_field("is_email_active", self.is_email_active)
            .with_field("charge_fee_to", self.charge_fee_to.as_str())
    }
}
