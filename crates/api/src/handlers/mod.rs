pub mod completions;
pub mod media;
pub mod models;
