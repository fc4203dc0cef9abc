use std::sync::Arc;

use tracing::debug;

use crate::digest::ports::{ArtifactUpload, ArtifactUploader, ChartError, ChartRenderer, DeliveryTarget};
use crate::domain::feedback::MonthlyPoint;

pub const MIN_CHART_POINTS: usize = 3;

/// Renders a cohort's monthly series and uploads it next to the digest.
#[derive(Clone)]
pub struct ChartGenerator {
    renderer: Arc<dyn ChartRenderer>,
    uploader: Arc<dyn ArtifactUploader>,
}

impl ChartGenerator {
    pub fn new(renderer: Arc<dyn ChartRenderer>, uploader: Arc<dyn ArtifactUploader>) -> Self {
        Self { renderer, uploader }
    }

    /// Returns the uploaded chart's private URL.
    pub async fn generate(
        &self,
        target: &DeliveryTarget,
        title: &str,
        points: &[MonthlyPoint],
    ) -> Result<String, ChartError> {
        if points.len() < MIN_CHART_POINTS {
            return Err(ChartError::NotEnoughData { points: points.len(), min: MIN_CHART_POINTS });
        }

        let bytes = self.renderer.render(title, points).await?;
        debug!(
            event_name = "digest.chart.rendered",
            workspace = %target.workspace,
            title,
            bytes = bytes.len(),
            "chart rendered"
        );

        let artifact =
            ArtifactUpload { file_name: chart_file_name(title), title: title.to_owned(), bytes };
        Ok(self.uploader.upload(target, artifact).await?)
    }
}

fn chart_file_name(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "chart.png".to_owned()
    } else {
        format!("{slug}.png")
    }
}
