mod definitions;
mod health;
mod jobs;
mod landing_zones;
pub mod sse;

pub use definitions::*;
pub use health::*;
pub use jobs::*;
pub use landing_zones::*;
