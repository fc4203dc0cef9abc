//! Splits a digest into messages Slack will accept.

use serde::Serialize;

use crate::blocks::Block;

pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;
pub const MAX_MESSAGE_BYTES: usize = 13_200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_blocks: usize,
    pub max_bytes: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self { max_blocks: MAX_BLOCKS_PER_MESSAGE, max_bytes: MAX_MESSAGE_BYTES }
    }
}

/// The exact `chat.postMessage` body. Chunk sizes are measured on this same
/// value.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MessageBody<'a> {
    pub channel: &'a str,
    pub blocks: &'a [Block],
}

/// Size of the `chat.postMessage` body carrying `blocks` to `channel`.
pub fn serialized_len(channel: &str, blocks: &[Block]) -> usize {
    serde_json::to_vec(&MessageBody { channel, blocks }).map(|body| body.len()).unwrap_or(usize::MAX)
}

/// Bisects `blocks` until every piece fits `limits`. A single block that is
/// still too large is emitted on its own. Concatenating the result yields the
/// input.
pub fn chunk_blocks(channel: &str, blocks: &[Block], limits: ChunkLimits) -> Vec<Vec<Block>> {
    let mut chunks = Vec::new();
    bisect(channel, blocks, limits, &mut chunks);
    chunks
}

fn bisect(channel: &str, blocks: &[Block], limits: ChunkLimits, out: &mut Vec<Vec<Block>>) {
    if blocks.is_empty() {
        return;
    }
    let fits =
        blocks.len() <= limits.max_blocks && serialized_len(channel, blocks) <= limits.max_bytes;
    if fits || blocks.len() == 1 {
        out.push(blocks.to_vec());
        return;
    }
    let (left, right) = blocks.split_at(blocks.len() / 2);
    bisect(channel, left, limits, out);
    bisect(channel, right, limits, out);
}
