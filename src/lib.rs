pub mod cli;
pub mod downloader;

#[cfg(feature = "gui")]
mod gui;

#[cfg(feature = "gui")]
pub use gui::run;
