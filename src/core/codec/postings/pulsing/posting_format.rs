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

use core::codec::postings::intblock::VIntStreamFactory;
use core::codec::postings::pulsing::{PulsingPostingsReader, PulsingPostingsWriter, PulsingVersion};
use core::codec::postings::sep::SepPostingsFormat;
use core::codec::postings::{
    PostingsFormat, PostingsFormatConfig, NESTED_PULSING_FORMAT_NAME, PULSING_FORMAT_NAME,
};
use core::codec::segment_infos::{SegmentReadState, SegmentWriteState};
use core::store::directory::Directory;

use error::Result;

/// Inlines terms with at most `max_positions` occurrences, delegating the
/// rest to the wrapped format.
#[derive(Clone, Debug)]
pub struct PulsingPostingsFormat<P: PostingsFormat> {
    name: &'static str,
    wrapped: P,
    max_positions: u32,
    version: PulsingVersion,
}

impl<P: PostingsFormat> PulsingPostingsFormat<P> {
    pub fn new(wrapped: P, max_positions: u32) -> Self {
        PulsingPostingsFormat {
            name: PULSING_FORMAT_NAME,
            wrapped,
            max_positions,
            version: PulsingVersion::CURRENT,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Writes new segments with an older on disk version.
    pub fn with_version(mut self, version: PulsingVersion) -> Self {
        self.version = version;
        self
    }

    pub fn max_positions(&self) -> u32 {
        self.max_positions
    }

    pub fn wrapped(&self) -> &P {
        &self.wrapped
    }
}

impl PulsingPostingsFormat<PulsingPostingsFormat<SepPostingsFormat<VIntStreamFactory>>> {
    /// Two pulsing layers over the vint separate streams format. The inner
    /// layer inlines terms with one more occurrence than the outer one.
    pub fn nested(config: &PostingsFormatConfig) -> Self {
        let inner = PulsingPostingsFormat::new(
            SepPostingsFormat::vint(config),
            config.max_positions + 1,
        );
        PulsingPostingsFormat::new(inner, config.max_positions).with_name(NESTED_PULSING_FORMAT_NAME)
    }
}

impl<P: PostingsFormat> PostingsFormat for PulsingPostingsFormat<P> {
    type Writer = PulsingPostingsWriter<P::Writer>;
    type Reader = PulsingPostingsReader<P::Reader>;

    fn postings_writer<D: Directory>(
        &self,
        state: &SegmentWriteState<D>,
    ) -> Result<PulsingPostingsWriter<P::Writer>> {
        let wrapped = self.wrapped.postings_writer(state)?;
        PulsingPostingsWriter::new(state, wrapped, self.max_positions, self.version)
    }

    fn postings_reader<'a, D: Directory>(
        &self,
        state: &SegmentReadState<'a, D>,
    ) -> Result<PulsingPostingsReader<P::Reader>> {
        let wrapped = self.wrapped.postings_reader(state)?;
        PulsingPostingsReader::new(state, wrapped)
    }

    fn name(&self) -> &str {
        self.name
    }
}
