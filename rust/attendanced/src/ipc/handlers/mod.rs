pub mod attendance;
pub mod backup;
pub mod core;
pub mod export;
pub mod roster;
pub mod summary;
