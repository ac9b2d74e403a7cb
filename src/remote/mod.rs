// ABOUTME: Remote backend-generator API module
// ABOUTME: REST client, wire models and the generic status poller

pub mod client;
pub mod models;
pub mod polling;

pub use client::GeneratorClient;
pub use models::{
    DownloadInfo, GenerationRequest, GenerationStatus, JobId, JobState, PreviewFile,
    ProjectPreview,
};
pub use polling::{
    Callbacks, PollHandle, PollObserver, PollOutcome, PollingClient, StatusSource, Terminal,
};
