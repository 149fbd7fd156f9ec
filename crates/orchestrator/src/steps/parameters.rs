use std::collections::BTreeMap;
use std::str::FromStr;

use landing_zone_core::CoreError;

use crate::error::Result;

pub const VNET_ADDRESS_SPACE: &str = "VNET_ADDRESS_SPACE";
pub const POSTGRESQL_SUBNET: &str = "POSTGRESQL_SUBNET";
pub const COMPUTE_SUBNET: &str = "COMPUTE_SUBNET";
pub const POSTGRES_SERVER_SKU: &str = "POSTGRES_SERVER_SKU";
pub const POSTGRES_VERSION: &str = "POSTGRES_VERSION";
pub const POSTGRES_STORAGE_SIZE_GB: &str = "POSTGRES_STORAGE_SIZE_GB";
pub const AUDIT_LOG_RETENTION_DAYS: &str = "AUDIT_LOG_RETENTION_DAYS";

const DEFAULTS: &[(&str, &str)] = &[
    (VNET_ADDRESS_SPACE, "10.1.0.0/27"),
    (POSTGRESQL_SUBNET, "10.1.0.0/29"),
    (COMPUTE_SUBNET, "10.1.0.16/28"),
    (POSTGRES_SERVER_SKU, "Standard_D2ds_v5"),
    (POSTGRES_VERSION, "14"),
    (POSTGRES_STORAGE_SIZE_GB, "32"),
    (AUDIT_LOG_RETENTION_DAYS, "90"),
];

/// Request parameters with defaults filled in.
pub struct ParametersResolver<'a> {
    parameters: &'a BTreeMap<String, String>,
}

impl<'a> ParametersResolver<'a> {
    pub fn new(parameters: &'a BTreeMap<String, String>) -> Self {
        Self { parameters }
    }

    pub fn get(&self, key: &str) -> &str {
        self.parameters
            .get(key)
            .map(String::as_str)
            .or_else(|| DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v))
            .unwrap_or_default()
    }

    pub fn parse<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.get(key);
        raw.parse().map_err(|_| {
            CoreError::Validation(format!("parameter {key} has invalid value '{raw}'")).into()
        })
    }
}
