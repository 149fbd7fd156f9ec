use landing_zone_core::{ContainerRef, LandingZone};
use uuid::Uuid;

use super::{datetime_to_timestamp, timestamp_to_datetime};
use crate::error::{DbError, Result};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LandingZoneRow {
    pub id: String,
    pub definition: String,
    pub version: String,
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub region: String,
    pub created_at: i64,
}

impl LandingZoneRow {
    pub fn into_domain(self) -> Result<LandingZone> {
        let parse = |value: &str| {
            Uuid::parse_str(value).map_err(|e| DbError::CorruptRow {
                table: "landing_zones",
                reason: e.to_string(),
            })
        };

        Ok(LandingZone {
            id: parse(&self.id)?,
            definition: self.definition,
            version: self.version,
            container: ContainerRef {
                tenant_id: parse(&self.tenant_id)?,
                subscription_id: parse(&self.subscription_id)?,
                resource_group: self.resource_group,
                region: self.region,
            },
            created_at: timestamp_to_datetime(self.created_at),
        })
    }
}

impl From<&LandingZone> for LandingZoneRow {
    fn from(zone: &LandingZone) -> Self {
        Self {
            id: zone.id.to_string(),
            definition: zone.definition.clone(),
            version: zone.version.clone(),
            tenant_id: zone.container.tenant_id.to_string(),
            subscription_id: zone.container.subscription_id.to_string(),
            resource_group: zone.container.resource_group.clone(),
            region: zone.container.region.clone(),
            created_at: datetime_to_timestamp(zone.created_at),
        }
    }
}
