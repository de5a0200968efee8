pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod render;
pub mod tween;
pub mod tasks {
    pub mod loader;
    pub mod watch;
}
