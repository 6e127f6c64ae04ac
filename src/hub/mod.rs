pub mod log;
pub mod poll;
pub mod reaper;
pub mod registry;
