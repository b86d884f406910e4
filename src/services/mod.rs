pub mod access;
pub mod hub;
pub mod reaper;
