pub mod flight;
pub mod flight_map;
pub mod landing_zone;
pub mod resource;
pub mod resource_types;
pub mod tags;

pub use flight::{FlightClass, FlightRecord, FlightStatus};
pub use flight_map::FlightMap;
pub use landing_zone::{ContainerRef, DeployedLandingZone, LandingZone, LandingZoneRequest};
pub use resource::{ManagedResource, PrivateEndpoint, ResourceSpec};
pub use tags::{ResourcePurpose, TagKey};
