pub mod api;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod settings;
pub mod translator;
