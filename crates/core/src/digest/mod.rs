//! Digest pipeline: cohort grouping, statistics, summarizer input, and the
//! jobs that drive them.

pub mod cache_job;
pub mod chart;
#[cfg(test)]
pub(crate) mod fakes;
pub mod grouping;
pub mod input;
pub mod model;
pub mod orchestrator;
pub mod ports;
pub mod sampling;
pub mod stats;

pub use cache_job::{CacheSettings, DailyCacheJob};
pub use chart::ChartGenerator;
pub use grouping::{group_by_cohort, CohortKey, Cohorts, Granularity};
pub use model::{
    CacheReport, DigestEntry, FailureStage, RunReport, UnitFailure, WorkspaceDigest,
    NO_COMMENTS_SUMMARY,
};
pub use orchestrator::{DigestOrchestrator, DigestSettings};
pub use ports::{
    ArtifactUpload, ArtifactUploader, ChartError, ChartRenderer, DeliveryError, DeliveryReceipt,
    DeliveryTarget, DigestPublisher, DigestStore, EligibleWorkspace, StoreError, Summarizer,
    SummarizerError,
};
pub use sampling::SamplingLimiter;
pub use stats::{Delta, PeriodStats};
