pub mod changelog;
pub mod config;
pub mod github;
pub mod models;
pub mod releaser;
pub mod server;
pub mod version;

pub use config::{Config, ConfigError, Resolution};
pub use github::{AppClientFactory, ClientFactory, GithubClient, GithubError, OctocrabClient};
pub use models::*;
pub use releaser::{BatchOutcome, ReleaseAction, ReleaseError, Releaser};
pub use server::{router, serve, AppState};
