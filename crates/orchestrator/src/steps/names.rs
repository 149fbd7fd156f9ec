use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Zone Azure resolves flexible server private endpoints through
pub const POSTGRES_PRIVATE_DNS_ZONE: &str = "privatelink.postgres.database.azure.com";

/// Resource names derived from the landing-zone id, so every retry and
/// every resumed flight asks for the same names.
#[derive(Debug, Clone)]
pub struct ResourceNames {
    suffix: String,
}

impl ResourceNames {
    pub fn new(landing_zone_id: Uuid) -> Self {
        let digest = Sha256::digest(landing_zone_id.as_bytes());
        let hex = hex::encode(digest);
        Self {
            suffix: hex[..16].to_string(),
        }
    }

    fn unique(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.suffix)
    }

    pub fn vnet(&self) -> String {
        self.unique("vnet")
    }

    pub fn postgres_server(&self) -> String {
        self.unique("pg")
    }

    pub fn postgres_private_endpoint(&self) -> String {
        self.unique("pe-pg")
    }

    pub fn dns_zone(&self) -> String {
        POSTGRES_PRIVATE_DNS_ZONE.to_string()
    }

    /// `zone/link`, the link being a child of the zone
    pub fn dns_zone_link(&self) -> String {
        format!("{}/{}", POSTGRES_PRIVATE_DNS_ZONE, self.unique("link"))
    }

    pub fn log_analytics_workspace(&self) -> String {
        self.unique("law")
    }

    /// `workspace/export`
    pub fn data_export(&self) -> String {
        format!("{}/{}", self.log_analytics_workspace(), self.unique("export"))
    }

    pub fn postgres_diagnostic_setting(&self) -> String {
        self.unique("pg-logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_stable_per_landing_zone() {
        let id = Uuid::new_v4();
        assert_eq!(ResourceNames::new(id).vnet(), ResourceNames::new(id).vnet());
        assert_ne!(
            ResourceNames::new(id).vnet(),
            ResourceNames::new(Uuid::new_v4()).vnet()
        );
        assert!(ResourceNames::new(id).data_export().starts_with("law-"));
    }
}
