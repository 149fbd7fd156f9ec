use serde::{Deserialize, Serialize};

/// Tag keys written on every resource a landing zone owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKey {
    /// Identifier of the owning landing zone
    LandingZoneId,
    /// What the resource (or subnet) is used for
    Purpose,
}

impl TagKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LandingZoneId => "WLZ-ID",
            Self::Purpose => "WLZ-PURPOSE",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourcePurpose {
    PostgresSubnet,
    ComputeSubnet,
    SharedResource,
    ProtectedData,
}

impl ResourcePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgresSubnet => "POSTGRESQL_SUBNET",
            Self::ComputeSubnet => "COMPUTE_SUBNET",
            Self::SharedResource => "SHARED_RESOURCE",
            Self::ProtectedData => "PROTECTED_DATA",
        }
    }
}
