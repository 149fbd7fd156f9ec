mod deletion_lock_repository;
mod flight_repository;
mod landing_zone_repository;

pub use deletion_lock_repository::DeletionLockRepository;
pub use flight_repository::FlightRepository;
pub use landing_zone_repository::LandingZoneRepository;
