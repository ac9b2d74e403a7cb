// ABOUTME: Library root for the OrchesityAI backend-generator client
// ABOUTME: Exposes the REST client, status poller, job tracker, config and credentials

pub mod auth;
pub mod config;
pub mod error;
pub mod remote;
pub mod tracker;

pub use auth::AuthContext;
pub use config::ClientConfig;
pub use error::ClientError;
pub use remote::{GeneratorClient, PollingClient};
pub use tracker::{JobTracker, TrackerState};
