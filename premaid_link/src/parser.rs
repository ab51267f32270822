use serde::{Deserialize, Serialize};

use crate::packets::ReplyFrame;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParserConfig {
    /// Buffered bytes above this count that still do not form a frame are dropped.
    pub max_buffered: usize,
    /// Skip one byte after every frame. The device separates replies with 0x00.
    pub skip_separator: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_buffered: 50,
            skip_separator: true,
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_buffered < 2 {
            return Err("Parser buffer cap must hold at least two bytes.".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub frames: u64,
    pub noise_bytes: u64,
    pub resets: u64,
}

/// Cuts length-prefixed frames out of an arbitrarily chunked byte stream.
#[derive(Debug, Clone, Default)]
pub struct FrameParser {
    config: ParserConfig,
    buffer: Vec<u8>,
    skip_pending: bool,
    stats: ParserStats,
}

impl FrameParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            skip_pending: false,
            stats: ParserStats::default(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<ReplyFrame> {
        let mut chunk = chunk;
        if self.skip_pending {
            if let Some((_, rest)) = chunk.split_first() {
                chunk = rest;
                self.skip_pending = false;
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            let declared = match self.buffer.first() {
                Some(&len) => len as usize,
                None => break,
            };
            if declared == 0 {
                self.buffer.remove(0);
                self.stats.noise_bytes += 1;
                continue;
            }
            if declared > self.buffer.len() {
                break;
            }
            let bytes: Vec<u8> = self.buffer.drain(..declared).collect();
            frames.push(ReplyFrame::new(bytes));
            self.stats.frames += 1;
            if self.config.skip_separator {
                if self.buffer.is_empty() {
                    self.skip_pending = true;
                } else {
                    self.buffer.remove(0);
                }
            }
        }

        if self.buffer.len() > self.config.max_buffered {
            tracing::debug!("dropping {} unframed bytes", self.buffer.len());
            self.buffer.clear();
            self.stats.resets += 1;
        }
        frames
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.skip_pending = false;
    }
}
