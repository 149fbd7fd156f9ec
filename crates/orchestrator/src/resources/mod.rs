//! RAII resource guards.

mod deletion_lock;

pub use deletion_lock::DeletionLockGuard;
