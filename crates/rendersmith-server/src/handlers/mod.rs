//! Command handlers, kept out of `main.rs` so they can be tested

pub mod video;

pub use video::{load_request, render_to_file, run_video};
