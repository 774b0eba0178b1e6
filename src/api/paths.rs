//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const TRANSLATE: &str = "/translate";
pub const QUEUE_STATUS: &str = "/queue-status";
