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

use core::codec::postings::intblock::{
    FixedIntBlockStreamFactory, IntStreamFactory, VIntStreamFactory,
};
use core::codec::postings::sep::{SepPostingsReader, SepPostingsWriter, SepVersion};
use core::codec::postings::{
    PostingsFormat, PostingsFormatConfig, SEP_FIXED_INT_BLOCK_FORMAT_NAME, SEP_FORMAT_NAME,
};
use core::codec::segment_infos::{SegmentReadState, SegmentWriteState};
use core::store::directory::Directory;

use error::Result;

/// Postings format writing docs, freqs and positions into separate int
/// streams created by `F`.
#[derive(Clone, Debug)]
pub struct SepPostingsFormat<F: IntStreamFactory> {
    name: &'static str,
    factory: F,
    config: PostingsFormatConfig,
    version: SepVersion,
}

impl SepPostingsFormat<VIntStreamFactory> {
    /// Every int is written as a vint.
    pub fn vint(config: &PostingsFormatConfig) -> Self {
        SepPostingsFormat::new(SEP_FORMAT_NAME, VIntStreamFactory, config)
    }
}

impl SepPostingsFormat<FixedIntBlockStreamFactory> {
    /// Ints are written in zero padded blocks of `config.int_block_size`.
    pub fn fixed_int_block(config: &PostingsFormatConfig) -> Self {
        SepPostingsFormat::new(
            SEP_FIXED_INT_BLOCK_FORMAT_NAME,
            FixedIntBlockStreamFactory::new(config.int_block_size as usize),
            config,
        )
    }
}

impl Default for SepPostingsFormat<VIntStreamFactory> {
    fn default() -> Self {
        SepPostingsFormat::vint(&PostingsFormatConfig::default())
    }
}

impl<F: IntStreamFactory> SepPostingsFormat<F> {
    pub fn new(name: &'static str, factory: F, config: &PostingsFormatConfig) -> Self {
        SepPostingsFormat {
            name,
            factory,
            config: config.clone(),
            version: SepVersion::CURRENT,
        }
    }

    /// Writes new segments with an older on disk version.
    pub fn with_version(mut self, version: SepVersion) -> Self {
        self.version = version;
        self
    }

    pub fn config(&self) -> &PostingsFormatConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: IntStreamFactory> PostingsFormat for SepPostingsFormat<F> {
    type Writer = SepPostingsWriter<F>;
    type Reader = SepPostingsReader<F>;

    fn postings_writer<D: Directory>(
        &self,
        state: &SegmentWriteState<D>,
    ) -> Result<SepPostingsWriter<F>> {
        SepPostingsWriter::new(state, &self.factory, &self.config, self.version)
    }

    fn postings_reader<'a, D: Directory>(
        &self,
        state: &SegmentReadState<'a, D>,
    ) -> Result<SepPostingsReader<F>> {
        SepPostingsReader::new(state, &self.factory)
    }

    fn name(&self) -> &str {
        self.name
    }
}
