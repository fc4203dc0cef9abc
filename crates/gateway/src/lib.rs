//! Adapters for the external services the digest pipeline depends on:
//! the AI responses endpoint and the chart toolchain.

pub mod chart;
pub mod summarizer;

pub use chart::PyxplotChartRenderer;
pub use summarizer::ResponsesSummarizer;
