// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use error::ErrorKind::IllegalArgument;
use error::Result;

use serde_json;

/// Default cadence, in documents, between two skip points.
pub const DEFAULT_SKIP_INTERVAL: u32 = 16;
/// Default ceiling on the skip list height.
pub const DEFAULT_MAX_SKIP_LEVELS: u32 = 10;
/// Terms with at most this many occurrences are inlined by default.
pub const DEFAULT_MAX_POSITIONS: u32 = 1;
/// Default number of ints per block of the fixed block int stream.
pub const DEFAULT_INT_BLOCK_SIZE: u32 = 128;

/// Construction options of the postings formats.
///
/// Only writers consult this. Readers recover every format constant from
/// the terms dictionary, where `init` wrote them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingsFormatConfig {
    pub skip_interval: u32,
    pub max_skip_levels: u32,
    /// Minimum doc freq for a term to carry skip data, defaults to `skip_interval`.
    pub skip_minimum: Option<u32>,
    /// Inclusive pulsing cutoff.
    pub max_positions: u32,
    pub int_block_size: u32,
}

impl Default for PostingsFormatConfig {
    fn default() -> Self {
        PostingsFormatConfig {
            skip_interval: DEFAULT_SKIP_INTERVAL,
            max_skip_levels: DEFAULT_MAX_SKIP_LEVELS,
            skip_minimum: None,
            max_positions: DEFAULT_MAX_POSITIONS,
            int_block_size: DEFAULT_INT_BLOCK_SIZE,
        }
    }
}

impl PostingsFormatConfig {
    /// Parses and validates a JSON config, missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<PostingsFormatConfig> {
        let config: PostingsFormatConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn skip_minimum(&self) -> u32 {
        self.skip_minimum.unwrap_or(self.skip_interval)
    }

    pub fn validate(&self) -> Result<()> {
        if self.skip_interval == 0 {
            bail!(IllegalArgument(format!(
                "skip_interval must be > 0, got {}",
                self.skip_interval
            )));
        }
        if self.max_skip_levels == 0 {
            bail!(IllegalArgument("max_skip_levels must be > 0".into()));
        }
        if self.skip_minimum() == 0 {
            bail!(IllegalArgument("skip_minimum must be > 0".into()));
        }
        if self.max_positions == 0 {
            bail!(IllegalArgument("max_positions must be > 0".into()));
        }
        if self.int_block_size == 0 {
            bail!(IllegalArgument("int_block_size must be > 0".into()));
        }
        if self.skip_interval > i32::max_value() as u32
            || self.skip_minimum() > i32::max_value() as u32
            || self.max_positions > i32::max_value() as u32
            || self.int_block_size > i32::max_value() as u32
        {
            bail!(IllegalArgument(format!("config value out of range: {:?}", self)));
        }
        Ok(())
    }
}
