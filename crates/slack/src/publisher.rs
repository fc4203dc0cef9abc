use async_trait::async_trait;
use tally_core::digest::{
    ArtifactUpload, ArtifactUploader, DeliveryError, DeliveryReceipt, DeliveryTarget,
    DigestPublisher, WorkspaceDigest,
};
use tracing::{info, warn};

use crate::chunking::{chunk_blocks, ChunkLimits};
use crate::client::{FileUpload, SlackWebClient};
use crate::digest::digest_message;

/// Posts digests as one or more `chat.postMessage` calls and uploads chart
/// images through the external upload flow.
#[derive(Clone, Debug)]
pub struct SlackDigestPublisher {
    client: SlackWebClient,
    limits: ChunkLimits,
}

impl SlackDigestPublisher {
    pub fn new(client: SlackWebClient) -> Self {
        Self { client, limits: ChunkLimits::default() }
    }

    pub fn with_limits(mut self, limits: ChunkLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl DigestPublisher for SlackDigestPublisher {
    async fn publish(
        &self,
        target: &DeliveryTarget,
        digest: &WorkspaceDigest,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let message = digest_message(digest);
        let chunks = chunk_blocks(&target.channel, &message.blocks, self.limits);
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            let part = index + 1;
            if let Err(error) =
                self.client.post_message(&target.bot_token, &target.channel, chunk).await
            {
                warn!(
                    event_name = "slack.digest.chunk_failed",
                    workspace = %target.workspace,
                    part,
                    total,
                    error = %error,
                    "aborting remaining digest messages"
                );
                return Err(DeliveryError::Chunk { part, total, source: Box::new(error.into()) });
            }
        }

        info!(
            event_name = "slack.digest.delivered",
            workspace = %target.workspace,
            cadence = %digest.cadence,
            messages = total,
            "digest delivered"
        );
        Ok(DeliveryReceipt { messages_sent: total })
    }
}

#[async_trait]
impl ArtifactUploader for SlackDigestPublisher {
    async fn upload(
        &self,
        target: &DeliveryTarget,
        artifact: ArtifactUpload,
    ) -> Result<String, DeliveryError> {
        let upload = FileUpload {
            file_name: artifact.file_name,
            title: artifact.title,
            bytes: artifact.bytes,
            channel_id: None,
            initial_comment: None,
        };
        Ok(self.client.upload_file(&target.bot_token, upload).await?)
    }
}
