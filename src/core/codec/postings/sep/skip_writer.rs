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

use std::cmp::min;

use core::codec::postings::intblock::IntIndex;
use core::index::IndexOptions;
use core::store::io::{DataOutput, IndexOutput, RAMOutputStream};
use core::util::math::log;
use core::util::{fill_slice, DocId};

use error::Result;

/// Writes the multi-level skip list of the separate streams format.
///
/// Level 0 has an entry every `skip_interval` docs, level `L` every
/// `skip_interval^(L+1)` docs. Every entry records the last doc before the
/// skip point together with the int stream bookmarks and the payload
/// pointer at that point, all delta coded against the previous entry of the
/// same level.
pub struct SepSkipListWriter<I: IntIndex> {
    last_skip_doc: Vec<DocId>,
    last_skip_payload_length: Vec<i32>,
    last_skip_payload_pointer: Vec<i64>,

    doc_index: Vec<I>,
    freq_index: Vec<I>,
    pos_index: Vec<I>,

    cur_doc: DocId,
    cur_store_payloads: bool,
    cur_payload_length: i32,
    cur_payload_pointer: i64,
    cur_doc_index: I,
    cur_freq_index: I,
    cur_pos_index: I,

    index_options: IndexOptions,

    /// number of levels in this skip list
    number_of_skip_levels: usize,
    /// the skip interval in the list with level = 0, also the fan out of
    /// every higher level
    skip_interval: u32,
    /// for every skip level a different buffer is used
    skip_buffer: Vec<RAMOutputStream>,

    // most terms never reach a skip point, so the per level state is only
    // re-based once the first skip point of a term is buffered.
    initialized: bool,
    top_doc_index: I,
    top_freq_index: I,
    top_pos_index: I,
    top_payload_pointer: i64,
}

impl<I: IntIndex> SepSkipListWriter<I> {
    /// `doc_count` is the number of docs in the segment, which bounds the
    /// height of every skip list written.
    pub fn new(skip_interval: u32, max_skip_levels: usize, doc_count: u32) -> Self {
        debug_assert!(skip_interval > 0);
        // an interval of 1 would promote every entry, so it gets a single level
        let number_of_skip_levels = if skip_interval == 1 || doc_count <= skip_interval {
            1
        } else {
            1 + log(
                i64::from(doc_count) / i64::from(skip_interval),
                skip_interval as i32,
            ) as usize
        };
        let number_of_skip_levels = min(max_skip_levels, number_of_skip_levels);

        SepSkipListWriter {
            last_skip_doc: vec![0; number_of_skip_levels],
            last_skip_payload_length: vec![-1; number_of_skip_levels],
            last_skip_payload_pointer: vec![0; number_of_skip_levels],
            doc_index: vec![I::default(); number_of_skip_levels],
            freq_index: vec![I::default(); number_of_skip_levels],
            pos_index: vec![I::default(); number_of_skip_levels],
            cur_doc: 0,
            cur_store_payloads: false,
            cur_payload_length: -1,
            cur_payload_pointer: 0,
            cur_doc_index: I::default(),
            cur_freq_index: I::default(),
            cur_pos_index: I::default(),
            index_options: IndexOptions::Docs,
            number_of_skip_levels,
            skip_interval,
            skip_buffer: Vec::new(),
            initialized: false,
            top_doc_index: I::default(),
            top_freq_index: I::default(),
            top_pos_index: I::default(),
            top_payload_pointer: 0,
        }
    }

    pub fn number_of_skip_levels(&self) -> usize {
        self.number_of_skip_levels
    }

    pub fn set_index_options(&mut self, index_options: IndexOptions) {
        self.index_options = index_options;
    }

    /// Re-bases the skip list on the stream positions where a new term starts.
    pub fn reset_skip(
        &mut self,
        top_doc_index: &I,
        top_freq_index: &I,
        top_pos_index: &I,
        top_payload_pointer: i64,
    ) {
        self.top_doc_index.copy_from(top_doc_index, true);
        self.top_freq_index.copy_from(top_freq_index, true);
        self.top_pos_index.copy_from(top_pos_index, true);
        self.top_payload_pointer = top_payload_pointer;
        self.initialized = false;
    }

    fn init_skip(&mut self) {
        if !self.initialized {
            self.reset_skip_base();
            fill_slice(&mut self.last_skip_doc, 0);
            // the first payload length of a level is always written
            fill_slice(&mut self.last_skip_payload_length, -1);
            fill_slice(&mut self.last_skip_payload_pointer, self.top_payload_pointer);
            for level in 0..self.number_of_skip_levels {
                self.doc_index[level].copy_from(&self.top_doc_index, true);
                self.freq_index[level].copy_from(&self.top_freq_index, true);
                self.pos_index[level].copy_from(&self.top_pos_index, true);
            }
            self.initialized = true;
        }
    }

    // Creates new buffers or empties the existing ones
    fn reset_skip_base(&mut self) {
        if self.skip_buffer.is_empty() {
            for _ in 0..self.number_of_skip_levels {
                self.skip_buffer.push(RAMOutputStream::new(false));
            }
        } else {
            for buf in &mut self.skip_buffer {
                buf.reset();
            }
        }
    }

    /// Sets the values for the current skip data. `doc` is the last doc
    /// written before the skip point, the bookmarks point at the first int
    /// of the doc following it.
    #[allow(clippy::too_many_arguments)]
    pub fn set_skip_data(
        &mut self,
        doc: DocId,
        store_payloads: bool,
        payload_length: i32,
        payload_pointer: i64,
        doc_index: &I,
        freq_index: &I,
        pos_index: &I,
    ) {
        self.cur_doc = doc;
        self.cur_store_payloads = store_payloads;
        self.cur_payload_length = payload_length;
        self.cur_payload_pointer = payload_pointer;
        self.cur_doc_index.copy_from(doc_index, false);
        self.cur_freq_index.copy_from(freq_index, false);
        self.cur_pos_index.copy_from(pos_index, false);
    }

    /// Writes the current skip data to the buffers. The current document frequency determines
    /// the max level is skip data is to be written to.
    pub fn buffer_skip(&mut self, df: u32) -> Result<()> {
        debug_assert_eq!(df % self.skip_interval, 0);
        self.init_skip();

        let mut num_levels = 1;
        let mut df = df / self.skip_interval;

        // determine max level
        loop {
            if df % self.skip_interval != 0 || num_levels >= self.number_of_skip_levels {
                break;
            }
            num_levels += 1;
            df /= self.skip_interval;
        }

        let mut child_pointer = 0;
        for level in 0..num_levels {
            self.write_skip_data(level)?;

            let new_child_pointer = self.skip_buffer[level].file_pointer();
            if level != 0 {
                // store child pointers for all levels except the lowest
                self.skip_buffer[level].write_vlong(child_pointer)?;
            }

            // remember the childPointer for the next level
            child_pointer = new_child_pointer;
        }

        Ok(())
    }

    /// Writes the buffered skip lists to the given output, highest level
    /// first, and returns the file pointer where they start.
    pub fn write_skip(&self, output: &mut impl IndexOutput) -> Result<i64> {
        let skip_pointer = output.file_pointer();

        if !self.initialized {
            return Ok(skip_pointer);
        }

        for level in (1..self.number_of_skip_levels).rev() {
            let length = self.skip_buffer[level].file_pointer();
            if length > 0 {
                output.write_vlong(length)?;
                self.skip_buffer[level].write_to(output)?;
            }
        }
        self.skip_buffer[0].write_to(output)?;
        Ok(skip_pointer)
    }

    fn write_skip_data(&mut self, level: usize) -> Result<()> {
        let buffer = &mut self.skip_buffer[level];
        let delta = self.cur_doc - self.last_skip_doc[level];
        if self.cur_store_payloads {
            // the payload length is only written when it changed, which is
            // flagged in the low bit of the doc delta
            if self.cur_payload_length == self.last_skip_payload_length[level] {
                buffer.write_vint(delta << 1)?;
            } else {
                buffer.write_vint(delta << 1 | 1)?;
                buffer.write_vint(self.cur_payload_length)?;
                self.last_skip_payload_length[level] = self.cur_payload_length;
            }
        } else {
            buffer.write_vint(delta)?;
        }

        if self.index_options.has_freqs() {
            self.freq_index[level].copy_from(&self.cur_freq_index, false);
            self.freq_index[level].write(buffer, false)?;
        }
        self.doc_index[level].copy_from(&self.cur_doc_index, false);
        self.doc_index[level].write(buffer, false)?;
        if self.index_options.has_positions() {
            self.pos_index[level].copy_from(&self.cur_pos_index, false);
            self.pos_index[level].write(buffer, false)?;
            if self.cur_store_payloads {
                buffer.write_vlong(self.cur_payload_pointer - self.last_skip_payload_pointer[level])?;
            }
        }

        self.last_skip_doc[level] = self.cur_doc;
        self.last_skip_payload_pointer[level] = self.cur_payload_pointer;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::postings::intblock::VIntIndex;

    fn vint_index(fp: i64) -> VIntIndex {
        let mut encoded = Vec::new();
        encoded.write_vlong(fp).unwrap();
        let mut index = VIntIndex::default();
        index.read(&mut &encoded[..], true).unwrap();
        index
    }

    #[test]
    fn test_number_of_levels() {
        let writer = SepSkipListWriter::<VIntIndex>::new(16, 10, 10);
        assert_eq!(writer.number_of_skip_levels(), 1);
        let writer = SepSkipListWriter::<VIntIndex>::new(16, 10, 16 * 16);
        assert_eq!(writer.number_of_skip_levels(), 2);
        let writer = SepSkipListWriter::<VIntIndex>::new(2, 10, 1 << 20);
        assert_eq!(writer.number_of_skip_levels(), 10);
        let writer = SepSkipListWriter::<VIntIndex>::new(2, 3, 1 << 20);
        assert_eq!(writer.number_of_skip_levels(), 3);
        let writer = SepSkipListWriter::<VIntIndex>::new(1, 10, 1 << 20);
        assert_eq!(writer.number_of_skip_levels(), 1);
    }

    #[test]
    fn test_term_without_skip_points_writes_nothing() {
        let mut writer = SepSkipListWriter::<VIntIndex>::new(4, 10, 100);
        let top = vint_index(10);
        writer.reset_skip(&top, &top, &top, 0);
        let mut out = RAMOutputStream::new(false);
        out.write_vint(42).unwrap();
        assert_eq!(writer.write_skip(&mut out).unwrap(), 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_levels_are_written_highest_first() {
        let mut writer = SepSkipListWriter::<VIntIndex>::new(2, 10, 100);
        writer.set_index_options(IndexOptions::Docs);
        let top = vint_index(0);
        writer.reset_skip(&top, &top, &top, 0);
        // skip points after 2 and 4 docs, the second one is promoted
        for (df, doc) in &[(2u32, 3), (4, 7)] {
            let index = vint_index(i64::from(*df));
            writer.set_skip_data(*doc, false, -1, 0, &index, &top, &top);
            writer.buffer_skip(*df).unwrap();
        }
        let mut out = RAMOutputStream::new(false);
        assert_eq!(writer.write_skip(&mut out).unwrap(), 0);
        // level 1: length 3, doc delta 7, doc fp delta 4, child pointer 4
        // level 0: [3, 2] [4, 2]
        assert_eq!(out.as_bytes(), &[3u8, 7, 4, 4, 3, 2, 4, 2][..]);
    }
}
