//! Shard path derivation for destination storage layout.
//!
//! A flat cache key is spread into a bounded directory tree so that no
//! single directory accumulates an unbounded number of objects. The
//! derivation is a pure function of the key and the shard configuration;
//! previously stored data depends on it staying byte-stable.

use serde::{Deserialize, Serialize};

/// Directory sharding configuration, fixed at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Number of directory levels.
    pub depth: usize,
    /// Characters consumed per level.
    pub width: usize,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self { depth: 1, width: 1 }
    }
}

/// Split a flat key into path segments.
///
/// The first `depth` segments are successive `width`-character slices taken
/// from the front of `key`. If `rest_included` is true, a final segment with
/// the unconsumed remainder is appended. Keys shorter than `depth * width`
/// yield truncated output rather than padding; empty segments are dropped.
///
/// Slicing is by character so a multi-byte key never splits a codepoint.
pub fn shard(key: &str, width: usize, depth: usize, rest_included: bool) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut segments = Vec::with_capacity(depth + 1);
    let mut pos = 0;

    for _ in 0..depth {
        if pos >= chars.len() || width == 0 {
            break;
        }
        let end = (pos + width).min(chars.len());
        segments.push(chars[pos..end].iter().collect());
        pos = end;
    }

    if rest_included && pos < chars.len() {
        segments.push(chars[pos..].iter().collect());
    }

    segments
}

/// Derive the sharded destination path for a key, rest segment included,
/// segments joined with `/`.
pub fn shard_path(key: &str, config: &ShardConfig) -> String {
    shard(key, config.width, config.depth, true).join("/")
}
