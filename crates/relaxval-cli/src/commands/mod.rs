pub mod analyze;
pub mod discover;
pub mod dockq;
pub mod figures;
pub mod trials;
pub mod validate;
