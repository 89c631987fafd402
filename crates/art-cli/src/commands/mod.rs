//! CLI command implementations

pub mod add_target;
pub mod add_targets_dir;
pub mod info;
pub mod track;
