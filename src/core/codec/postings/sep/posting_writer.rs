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

use core::codec::codec_util;
use core::codec::field_infos::FieldInfo;
use core::codec::postings::intblock::{IntIndex, IntIndexOutput, IntStreamFactory};
use core::codec::postings::sep::{
    SepSkipListWriter, SepTermState, SepVersion, DOC_EXTENSION, FREQ_EXTENSION,
    PAYLOAD_EXTENSION, POS_EXTENSION, SEP_CODEC, SKIP_EXTENSION,
};
use core::codec::postings::{BlockTermState, PostingsFormatConfig, PostingsWriterBase};
use core::codec::segment_infos::SegmentWriteState;
use core::index::IndexOptions;
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexOutput};
use core::util::io::close_all;
use core::util::DocId;

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState, UnsupportedOperation};
use error::Result;

use std::borrow::Cow;
use std::io::Write;

/// Writes the postings of one segment into separate int streams.
///
/// Doc deltas, freqs and positions each go to an int stream created by the
/// `IntStreamFactory`, payload bytes and skip lists to byte files. Streams a
/// segment has no use for are never created: the freq stream only exists if
/// some field indexes freqs, the pos and payload files only if some field
/// indexes positions.
pub struct SepPostingsWriter<F: IntStreamFactory> {
    version: SepVersion,

    doc_out: F::Output,
    doc_index: F::Index,

    freq_out: Option<F::Output>,
    freq_index: F::Index,

    pos_out: Option<F::Output>,
    pos_index: F::Index,

    payload_out: Option<Box<dyn IndexOutput>>,

    skip_out: Box<dyn IndexOutput>,
    skip_list_writer: SepSkipListWriter<F::Index>,

    skip_interval: i32,
    max_skip_levels: i32,
    skip_minimum: i32,

    index_options: IndexOptions,
    store_payloads: bool,
    store_offsets: bool,

    last_payload_length: i32,
    last_position: i32,
    last_start_offset: i32,
    last_offset_length: i32,
    payload_start: i64,
    last_doc_id: DocId,
    df: i32,

    last_state: SepTermState<F::Index>,
    last_payload_fp: i64,
    last_skip_fp: i64,

    closed: bool,
}

impl<F: IntStreamFactory> SepPostingsWriter<F> {
    pub fn new<D: Directory>(
        state: &SegmentWriteState<D>,
        factory: &F,
        config: &PostingsFormatConfig,
        version: SepVersion,
    ) -> Result<SepPostingsWriter<F>> {
        config.validate()?;
        let dir = state.directory.as_ref();
        let context = &state.context;

        let doc_out = factory.create_output(dir, &state.file_name(DOC_EXTENSION), context)?;

        let freq_out = if state.field_infos.has_freq {
            Some(factory.create_output(dir, &state.file_name(FREQ_EXTENSION), context)?)
        } else {
            None
        };

        let (pos_out, payload_out) = if state.field_infos.has_prox {
            let pos_out = factory.create_output(dir, &state.file_name(POS_EXTENSION), context)?;
            let mut payload_out: Box<dyn IndexOutput> =
                Box::new(dir.create_output(&state.file_name(PAYLOAD_EXTENSION), context)?);
            codec_util::write_header(payload_out.as_mut(), SEP_CODEC, version.value())?;
            (Some(pos_out), Some(payload_out))
        } else {
            (None, None)
        };

        let mut skip_out: Box<dyn IndexOutput> =
            Box::new(dir.create_output(&state.file_name(SKIP_EXTENSION), context)?);
        codec_util::write_header(skip_out.as_mut(), SEP_CODEC, version.value())?;

        let skip_list_writer = SepSkipListWriter::new(
            config.skip_interval,
            config.max_skip_levels as usize,
            state.max_doc.max(0) as u32,
        );

        debug!(
            "opened sep postings writer for segment {} with {} streams",
            state.segment_name,
            factory.name()
        );

        let doc_index = doc_out.index();
        Ok(SepPostingsWriter {
            version,
            doc_out,
            doc_index,
            freq_out,
            freq_index: F::Index::default(),
            pos_out,
            pos_index: F::Index::default(),
            payload_out,
            skip_out,
            skip_list_writer,
            skip_interval: config.skip_interval as i32,
            max_skip_levels: config.max_skip_levels as i32,
            skip_minimum: config.skip_minimum() as i32,
            index_options: IndexOptions::Docs,
            store_payloads: false,
            store_offsets: false,
            last_payload_length: -1,
            last_position: 0,
            last_start_offset: 0,
            last_offset_length: -1,
            payload_start: 0,
            last_doc_id: 0,
            df: 0,
            last_state: SepTermState::default(),
            last_payload_fp: 0,
            last_skip_fp: 0,
            closed: false,
        })
    }

    pub fn version(&self) -> SepVersion {
        self.version
    }

    fn has_freqs(&self) -> bool {
        self.index_options.has_freqs()
    }

    fn has_positions(&self) -> bool {
        self.index_options.has_positions()
    }

    fn payload_file_pointer(&self) -> i64 {
        match self.payload_out {
            Some(ref out) => out.file_pointer(),
            None => 0,
        }
    }

    // bookmarks of the current write positions, unused streams stay at default
    fn current_indexes(&self) -> (F::Index, F::Index, F::Index) {
        let doc_index = self.doc_out.index();
        let mut freq_index = F::Index::default();
        let mut pos_index = F::Index::default();
        if self.has_freqs() {
            if let Some(ref out) = self.freq_out {
                out.mark(&mut freq_index);
            }
        }
        if self.has_positions() {
            if let Some(ref out) = self.pos_out {
                out.mark(&mut pos_index);
            }
        }
        (doc_index, freq_index, pos_index)
    }

    fn empty_state(&self) -> SepTermState<F::Index> {
        let (doc_index, freq_index, pos_index) = self.current_indexes();
        SepTermState {
            doc_index,
            freq_index,
            pos_index,
            payload_fp: 0,
            skip_fp: 0,
        }
    }
}

impl<F: IntStreamFactory> PostingsWriterBase for SepPostingsWriter<F> {
    type TermState = SepTermState<F::Index>;

    fn init(&mut self, terms_out: &mut impl DataOutput) -> Result<()> {
        codec_util::write_header(terms_out, SEP_CODEC, self.version.value())?;
        terms_out.write_int(self.skip_interval)?;
        terms_out.write_int(self.max_skip_levels)?;
        terms_out.write_int(self.skip_minimum)
    }

    fn new_term_state(&self) -> BlockTermState<SepTermState<F::Index>> {
        BlockTermState::new(SepTermState::default())
    }

    fn set_field(&mut self, field_info: &FieldInfo) -> Result<usize> {
        let options = field_info.index_options;
        if options == IndexOptions::Null {
            bail!(UnsupportedOperation(Cow::Owned(format!(
                "field '{}' is not indexed",
                field_info.name
            ))));
        }
        if field_info.has_store_payloads && !options.has_positions() {
            bail!(IllegalArgument(format!(
                "field '{}' stores payloads without indexing positions",
                field_info.name
            )));
        }
        if options.has_offsets() && !self.version.supports_offsets() {
            bail!(UnsupportedOperation(Cow::Owned(format!(
                "{} version {} cannot index offsets of field '{}'",
                SEP_CODEC,
                self.version.value(),
                field_info.name
            ))));
        }
        if (options.has_freqs() && self.freq_out.is_none())
            || (options.has_positions() && self.pos_out.is_none())
        {
            bail!(IllegalState(format!(
                "field '{}' indexes more than the segment field infos declared",
                field_info.name
            )));
        }

        self.index_options = options;
        self.skip_list_writer.set_index_options(options);
        self.store_payloads = field_info.has_store_payloads;
        self.store_offsets = options.has_offsets();
        self.last_payload_fp = 0;
        self.last_skip_fp = 0;
        self.last_state = self.empty_state();
        Ok(0)
    }

    fn start_term(&mut self) -> Result<()> {
        self.doc_out.mark(&mut self.doc_index);
        if self.index_options.has_freqs() {
            if let Some(ref out) = self.freq_out {
                out.mark(&mut self.freq_index);
            }
        }
        if self.index_options.has_positions() {
            if let Some(ref out) = self.pos_out {
                out.mark(&mut self.pos_index);
            }
            self.payload_start = self.payload_file_pointer();
            self.last_payload_length = -1;
        }
        self.skip_list_writer.reset_skip(
            &self.doc_index,
            &self.freq_index,
            &self.pos_index,
            self.payload_start,
        );
        Ok(())
    }

    fn start_doc(&mut self, doc_id: DocId, term_doc_freq: i32) -> Result<()> {
        let delta = doc_id - self.last_doc_id;
        if doc_id < 0 || (self.df > 0 && delta <= 0) {
            bail!(CorruptIndex(format!(
                "docs out of order ({} <= {})",
                doc_id, self.last_doc_id
            )));
        }
        if self.has_freqs() && term_doc_freq <= 0 {
            bail!(IllegalArgument(format!(
                "doc {} has invalid freq {}",
                doc_id, term_doc_freq
            )));
        }

        self.df += 1;
        if self.df % self.skip_interval == 0 {
            let (doc_index, freq_index, pos_index) = self.current_indexes();
            let payload_pointer = self.payload_file_pointer();
            self.skip_list_writer.set_skip_data(
                self.last_doc_id,
                self.store_payloads,
                self.last_payload_length,
                payload_pointer,
                &doc_index,
                &freq_index,
                &pos_index,
            );
            self.skip_list_writer.buffer_skip(self.df as u32)?;
        }

        self.last_doc_id = doc_id;
        self.doc_out.write(delta)?;
        if self.index_options.has_freqs() {
            if let Some(ref mut out) = self.freq_out {
                out.write(term_doc_freq)?;
            }
        }
        self.last_position = 0;
        self.last_start_offset = 0;
        self.last_offset_length = -1;
        Ok(())
    }

    fn add_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        if !self.index_options.has_positions() {
            bail!(IllegalState(
                "positions added to a field that does not index them".into()
            ));
        }
        let delta = position - self.last_position;
        if delta < 0 {
            bail!(CorruptIndex(format!(
                "position {} is before the last position {}",
                position, self.last_position
            )));
        }
        self.last_position = position;

        let pos_out = match self.pos_out {
            Some(ref mut out) => out,
            None => bail!(IllegalState("no position stream".into())),
        };

        let payload = payload.unwrap_or(&[]);
        let payload_length = payload.len() as i32;
        if self.store_payloads {
            if payload_length != self.last_payload_length {
                self.last_payload_length = payload_length;
                pos_out.write((delta << 1) | 1)?;
                pos_out.write(payload_length)?;
            } else {
                pos_out.write(delta << 1)?;
            }
        } else {
            pos_out.write(delta)?;
        }

        if self.store_offsets {
            let offset_delta = start_offset - self.last_start_offset;
            let offset_length = end_offset - start_offset;
            if offset_delta < 0 || offset_length < 0 {
                bail!(IllegalArgument(format!(
                    "invalid offsets [{}, {}) after start offset {}",
                    start_offset, end_offset, self.last_start_offset
                )));
            }
            if offset_length != self.last_offset_length {
                pos_out.write((offset_delta << 1) | 1)?;
                pos_out.write(offset_length)?;
            } else {
                pos_out.write(offset_delta << 1)?;
            }
            self.last_start_offset = start_offset;
            self.last_offset_length = offset_length;
        }

        if self.store_payloads && payload_length > 0 {
            if let Some(ref mut out) = self.payload_out {
                out.write_bytes(payload, 0, payload.len())?;
            }
        }
        Ok(())
    }

    fn finish_doc(&mut self) -> Result<()> {
        self.last_position = 0;
        Ok(())
    }

    fn finish_term(&mut self, state: &mut BlockTermState<SepTermState<F::Index>>) -> Result<()> {
        if self.df == 0 {
            bail!(IllegalState("finishing a term without docs".into()));
        }
        if state.doc_freq != self.df {
            bail!(IllegalState(format!(
                "term state doc freq {} does not match {} docs written",
                state.doc_freq, self.df
            )));
        }

        let term = &mut state.codec;
        term.doc_index.copy_from(&self.doc_index, false);
        if self.index_options.has_freqs() {
            term.freq_index.copy_from(&self.freq_index, false);
            if self.index_options.has_positions() {
                term.pos_index.copy_from(&self.pos_index, false);
            }
        }
        term.payload_fp = self.payload_start;
        term.skip_fp = if self.df >= self.skip_minimum {
            self.skip_list_writer.write_skip(&mut self.skip_out)?
        } else {
            -1
        };

        self.last_doc_id = 0;
        self.df = 0;
        Ok(())
    }

    fn encode_term(
        &mut self,
        _longs: &mut [i64],
        out: &mut impl DataOutput,
        _field_info: &FieldInfo,
        state: &BlockTermState<SepTermState<F::Index>>,
        absolute: bool,
    ) -> Result<()> {
        let term = &state.codec;
        if absolute {
            self.last_skip_fp = 0;
            self.last_payload_fp = 0;
            self.last_state.clone_from(term);
        }

        self.last_state.doc_index.copy_from(&term.doc_index, false);
        self.last_state.doc_index.write(out, absolute)?;
        if self.index_options.has_freqs() {
            self.last_state.freq_index.copy_from(&term.freq_index, false);
            self.last_state.freq_index.write(out, absolute)?;
            if self.index_options.has_positions() {
                self.last_state.pos_index.copy_from(&term.pos_index, false);
                self.last_state.pos_index.write(out, absolute)?;
                if self.store_payloads {
                    if absolute {
                        out.write_vlong(term.payload_fp)?;
                    } else {
                        out.write_vlong(term.payload_fp - self.last_payload_fp)?;
                    }
                    self.last_payload_fp = term.payload_fp;
                }
            }
        }
        if term.skip_fp != -1 {
            if absolute {
                out.write_vlong(term.skip_fp)?;
            } else {
                out.write_vlong(term.skip_fp - self.last_skip_fp)?;
            }
            self.last_skip_fp = term.skip_fp;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut actions: Vec<Box<dyn FnOnce() -> Result<()> + '_>> = Vec::with_capacity(5);
        let doc_out = &mut self.doc_out;
        actions.push(Box::new(move || doc_out.close()));
        if let Some(ref mut out) = self.freq_out {
            actions.push(Box::new(move || out.close()));
        }
        if let Some(ref mut out) = self.pos_out {
            actions.push(Box::new(move || out.close()));
        }
        if let Some(ref mut out) = self.payload_out {
            actions.push(Box::new(move || {
                codec_util::write_footer(out)?;
                out.flush()?;
                Ok(())
            }));
        }
        let skip_out = &mut self.skip_out;
        actions.push(Box::new(move || {
            codec_util::write_footer(skip_out)?;
            skip_out.flush()?;
            Ok(())
        }));
        close_all(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::postings::intblock::{VIntIndex, VIntStreamFactory};
    use core::codec::postings::test_util::{field_info, segment_write_state};
    use core::store::directory::RAMDirectory;
    use error::ErrorKind;

    use std::sync::Arc;

    fn writer(
        options: IndexOptions,
        version: SepVersion,
    ) -> (Arc<RAMDirectory>, SepPostingsWriter<VIntStreamFactory>) {
        let dir = Arc::new(RAMDirectory::new());
        let state = segment_write_state(&dir, &[field_info("body", 0, options, false)], 100);
        let config = PostingsFormatConfig::default();
        let writer = SepPostingsWriter::new(&state, &VIntStreamFactory, &config, version).unwrap();
        (dir, writer)
    }

    #[test]
    fn test_only_needed_streams_are_created() {
        let (dir, mut w) = writer(IndexOptions::Docs, SepVersion::CURRENT);
        w.close().unwrap();
        let mut files = dir.list_all().unwrap();
        files.sort();
        assert_eq!(files, vec!["_0.doc", "_0.skp"]);

        let (dir, mut w) = writer(IndexOptions::DocsAndFreqsAndPositions, SepVersion::CURRENT);
        w.close().unwrap();
        // closing twice is a no-op
        w.close().unwrap();
        let mut files = dir.list_all().unwrap();
        files.sort();
        assert_eq!(
            files,
            vec!["_0.doc", "_0.frq", "_0.pos", "_0.pyl", "_0.skp"]
        );
    }

    #[test]
    fn test_docs_out_of_order() {
        let (_dir, mut w) = writer(IndexOptions::DocsAndFreqs, SepVersion::CURRENT);
        let fi = field_info("body", 0, IndexOptions::DocsAndFreqs, false);
        w.set_field(&fi).unwrap();
        w.start_term().unwrap();
        w.start_doc(5, 1).unwrap();
        w.finish_doc().unwrap();
        match w.start_doc(5, 1) {
            Err(e) => match *e.kind() {
                ErrorKind::CorruptIndex(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(()) => panic!("duplicate doc accepted"),
        }
    }

    #[test]
    fn test_field_validation() {
        let (_dir, mut w) = writer(IndexOptions::DocsAndFreqsAndPositions, SepVersion::Start);
        let offsets = field_info(
            "body",
            0,
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets,
            false,
        );
        match w.set_field(&offsets) {
            Err(e) => match *e.kind() {
                ErrorKind::UnsupportedOperation(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("offsets accepted by the start version"),
        }

        let mut payloads = field_info("body", 0, IndexOptions::DocsAndFreqs, false);
        payloads.has_store_payloads = true;
        match w.set_field(&payloads) {
            Err(e) => match *e.kind() {
                ErrorKind::IllegalArgument(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("payloads without positions accepted"),
        }

        let (_dir, mut docs_only) = writer(IndexOptions::Docs, SepVersion::CURRENT);
        let positions = field_info("body", 0, IndexOptions::DocsAndFreqsAndPositions, false);
        match docs_only.set_field(&positions) {
            Err(e) => match *e.kind() {
                ErrorKind::IllegalState(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("missing streams not detected"),
        }
    }

    #[test]
    fn test_short_terms_have_no_skip_data() {
        let (_dir, mut w) = writer(IndexOptions::Docs, SepVersion::CURRENT);
        let fi = field_info("body", 0, IndexOptions::Docs, false);
        assert_eq!(w.set_field(&fi).unwrap(), 0);

        w.start_term().unwrap();
        for doc in 0..3 {
            w.start_doc(doc * 2, -1).unwrap();
            w.finish_doc().unwrap();
        }
        let mut state = w.new_term_state();
        state.doc_freq = 3;
        w.finish_term(&mut state).unwrap();
        assert_eq!(state.codec.skip_fp, -1);

        let mut out = Vec::new();
        w.encode_term(&mut [], &mut out, &fi, &state, true).unwrap();
        let mut expected_index = VIntIndex::default();
        expected_index.copy_from(&state.codec.doc_index, false);
        let mut expected = Vec::new();
        expected_index.write(&mut expected, true).unwrap();
        assert_eq!(out, expected);
    }
}
