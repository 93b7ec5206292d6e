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

use std::io;
use std::io::Read;

use core::codec::postings::intblock::IntIndex;
use core::index::IndexOptions;
use core::store::io::{DataInput, IndexInput};
use core::util::math::log;
use core::util::{fill_slice, DocId};

use error::ErrorKind::{IllegalState, UnsupportedOperation};
use error::Result;

/// A skip level copied into memory.
struct SkipBuffer {
    data: Vec<u8>,
    pointer: i64,
    pos: usize,
}

impl SkipBuffer {
    fn new(input: &mut dyn IndexInput, length: usize) -> Result<SkipBuffer> {
        let mut data = vec![0; length];
        let pointer = input.file_pointer();
        input.read_exact(&mut data)?;
        Ok(SkipBuffer {
            data,
            pointer,
            pos: 0,
        })
    }
}

impl DataInput for SkipBuffer {}

impl IndexInput for SkipBuffer {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(SkipBuffer {
            data: self.data.clone(),
            pointer: self.pointer,
            pos: self.pos,
        }))
    }

    fn file_pointer(&self) -> i64 {
        self.pointer + self.pos as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        let offset = pos - self.pointer;
        if offset < 0 || offset as usize > self.data.len() {
            bail!(IllegalState(format!(
                "seek to {} outside of skip buffer [{}, {}]",
                pos,
                self.pointer,
                self.pointer + self.data.len() as i64
            )));
        }
        self.pos = offset as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        "SkipBuffer"
    }

    fn slice(&self, _description: &str, _offset: i64, _length: i64) -> Result<Box<dyn IndexInput>> {
        bail!(UnsupportedOperation("SkipBuffer cannot be sliced".into()))
    }
}

impl Read for SkipBuffer {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len() - self.pos;
        let len = buffer.len().min(available);
        buffer[0..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

/// Reads the skip lists written by `SepSkipListWriter`.
pub struct SepSkipListReader<I: IntIndex> {
    /// the maximum number of skip levels possible for this index
    max_number_of_skip_levels: i32,

    /// number of levels in this skip list
    number_of_skip_levels: i32,

    /// Defines the number of top skip levels to buffer in memory.
    number_of_levels_to_buffer: i32,

    doc_count: i32,

    /// skip_stream for each level.
    skip_stream: Vec<Option<Box<dyn IndexInput>>>,

    /// The start pointer of each skip level.
    skip_pointer: Vec<i64>,

    /// skipInterval of each level.
    skip_interval: Vec<i64>,

    /// Number of docs skipped per level.
    num_skipped: Vec<i64>,

    /// Doc id of current skip entry per level.
    skip_doc: Vec<DocId>,

    /// Doc id of last read skip entry with docId <= target.
    last_doc: DocId,

    /// Child pointer of current skip entry per level.
    child_pointer: Vec<i64>,

    /// childPointer of last read skip entry with docId <= target.
    last_child_pointer: i64,

    skip_multiplier: i32,

    index_options: IndexOptions,
    current_field_stores_payloads: bool,

    doc_index: Vec<I>,
    freq_index: Vec<I>,
    pos_index: Vec<I>,
    payload_pointer: Vec<i64>,
    payload_length: Vec<i32>,

    last_doc_index: I,
    last_freq_index: I,
    last_pos_index: I,
    last_payload_pointer: i64,
    last_payload_length: i32,
}

impl<I: IntIndex> SepSkipListReader<I> {
    pub fn new(skip_stream: Box<dyn IndexInput>, max_skip_levels: usize, skip_interval: u32) -> Self {
        let mut skip_streams = Vec::with_capacity(max_skip_levels);
        skip_streams.push(Some(skip_stream));
        let mut skip_intervals = Vec::with_capacity(max_skip_levels);
        skip_intervals.push(i64::from(skip_interval));
        for i in 1..max_skip_levels {
            // cache skip intervals
            let last_interval = skip_intervals[i - 1];
            skip_intervals.push(last_interval * i64::from(skip_interval));
            skip_streams.push(None);
        }

        SepSkipListReader {
            max_number_of_skip_levels: max_skip_levels as i32,
            number_of_skip_levels: 0,
            number_of_levels_to_buffer: 1,
            doc_count: 0,
            skip_stream: skip_streams,
            skip_pointer: vec![0; max_skip_levels],
            skip_interval: skip_intervals,
            num_skipped: vec![0; max_skip_levels],
            skip_doc: vec![0; max_skip_levels],
            last_doc: 0,
            child_pointer: vec![0; max_skip_levels],
            last_child_pointer: 0,
            skip_multiplier: skip_interval as i32,
            index_options: IndexOptions::Docs,
            current_field_stores_payloads: false,
            doc_index: vec![I::default(); max_skip_levels],
            freq_index: vec![I::default(); max_skip_levels],
            pos_index: vec![I::default(); max_skip_levels],
            payload_pointer: vec![0; max_skip_levels],
            payload_length: vec![0; max_skip_levels],
            last_doc_index: I::default(),
            last_freq_index: I::default(),
            last_pos_index: I::default(),
            last_payload_pointer: 0,
            last_payload_length: 0,
        }
    }

    /// Primes the reader at the start of a term, `df` is the doc freq of the term.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        skip_pointer: i64,
        doc_base_index: &I,
        freq_base_index: &I,
        pos_base_index: &I,
        payload_base_pointer: i64,
        df: i32,
        index_options: IndexOptions,
        stores_payloads: bool,
    ) -> Result<()> {
        self.skip_pointer[0] = skip_pointer;
        self.doc_count = df;
        self.index_options = index_options;
        self.current_field_stores_payloads = stores_payloads;
        fill_slice(&mut self.skip_doc, 0);
        fill_slice(&mut self.num_skipped, 0);
        fill_slice(&mut self.child_pointer, 0);
        self.last_doc = 0;
        self.last_child_pointer = 0;

        for i in 1..self.skip_stream.len() {
            self.skip_stream[i] = None;
        }
        self.load_skip_levels()?;

        self.last_payload_pointer = payload_base_pointer;
        self.last_payload_length = 0;
        fill_slice(&mut self.payload_pointer, payload_base_pointer);
        fill_slice(&mut self.payload_length, 0);
        for i in 0..self.doc_index.len() {
            self.doc_index[i].copy_from(doc_base_index, false);
            self.freq_index[i].copy_from(freq_base_index, false);
            self.pos_index[i].copy_from(pos_base_index, false);
        }
        self.last_doc_index.copy_from(doc_base_index, false);
        self.last_freq_index.copy_from(freq_base_index, false);
        self.last_pos_index.copy_from(pos_base_index, false);
        Ok(())
    }

    /// Returns the id of the doc to which the last call of `skip_to`
    /// has skipped.
    pub fn doc(&self) -> DocId {
        self.last_doc
    }

    pub fn doc_index(&self) -> &I {
        &self.last_doc_index
    }

    pub fn freq_index(&self) -> &I {
        &self.last_freq_index
    }

    pub fn pos_index(&self) -> &I {
        &self.last_pos_index
    }

    pub fn payload_pointer(&self) -> i64 {
        self.last_payload_pointer
    }

    pub fn payload_length(&self) -> i32 {
        self.last_payload_length
    }

    fn stream(&mut self, level: usize) -> Result<&mut Box<dyn IndexInput>> {
        match self.skip_stream[level] {
            Some(ref mut stream) => Ok(stream),
            None => bail!(IllegalState(format!("skip level {} is not loaded", level))),
        }
    }

    /// Loads the skip levels
    fn load_skip_levels(&mut self) -> Result<()> {
        if self.skip_multiplier == 1 || i64::from(self.doc_count) <= self.skip_interval[0] {
            self.number_of_skip_levels = 1;
        } else {
            self.number_of_skip_levels = 1 + log(
                i64::from(self.doc_count) / self.skip_interval[0],
                self.skip_multiplier,
            );
        }

        if self.number_of_skip_levels > self.max_number_of_skip_levels {
            self.number_of_skip_levels = self.max_number_of_skip_levels;
        }

        let skip_pointer = self.skip_pointer[0];
        self.stream(0)?.seek(skip_pointer)?;

        let mut to_buffer = self.number_of_levels_to_buffer;

        for i in (1..self.number_of_skip_levels as usize).rev() {
            // the length of the current level
            let length = self.stream(0)?.read_vlong()?;

            // the start pointer of the current level
            self.skip_pointer[i] = self.stream(0)?.file_pointer();
            if to_buffer > 0 {
                // buffer this level
                let stream = SkipBuffer::new(self.stream(0)?.as_mut(), length as usize)?;
                self.skip_stream[i] = Some(Box::new(stream));
                to_buffer -= 1;
            } else {
                // clone this stream, it is already at the start of the current level
                let stream = IndexInput::clone(self.stream(0)?.as_ref())?;
                self.skip_stream[i] = Some(stream);

                // move base stream beyond the current level
                let fp = self.stream(0)?.file_pointer();
                self.stream(0)?.seek(fp + length)?;
            }
        }

        // use base stream for the lowest level
        self.skip_pointer[0] = self.stream(0)?.file_pointer();
        Ok(())
    }

    /// Skips entries to the first beyond the current whose document number is
    /// greater than or equal to `target`. Returns the current doc count.
    pub fn skip_to(&mut self, target: DocId) -> Result<i32> {
        // walk up the levels until highest level is found that has a skip
        // for this target
        let mut level = 0i32;
        while level < self.number_of_skip_levels - 1 && target > self.skip_doc[(level + 1) as usize]
        {
            level += 1;
        }

        while level >= 0 {
            if target > self.skip_doc[level as usize] {
                if !self.load_next_skip(level as usize)? {
                    continue;
                }
            } else {
                // no more skips on this level, go down one level
                let last_child_pointer = self.last_child_pointer;
                if level > 0 && last_child_pointer > self.stream((level - 1) as usize)?.file_pointer()
                {
                    self.seek_child((level - 1) as usize)?;
                }
                level -= 1;
            }
        }

        Ok((self.num_skipped[0] - self.skip_interval[0] - 1) as i32)
    }

    fn load_next_skip(&mut self, level: usize) -> Result<bool> {
        // we have to skip, the target document is greater than the current
        // skip list entry
        self.set_last_skip_data(level);

        self.num_skipped[level] += self.skip_interval[level];

        if self.num_skipped[level] > i64::from(self.doc_count) {
            // this skip list is exhausted
            self.skip_doc[level] = i32::max_value();
            if self.number_of_skip_levels > level as i32 {
                self.number_of_skip_levels = level as i32;
            }
            return Ok(false);
        }

        // read next skip entry
        let delta = self.read_skip_data(level)?;
        self.skip_doc[level] += delta;

        if level != 0 {
            // read the child pointer if we are not on the leaf level
            self.child_pointer[level] = self.stream(level)?.read_vlong()? + self.skip_pointer[level - 1];
        }

        Ok(true)
    }

    /// Seeks the skip entry on the given level
    fn seek_child(&mut self, level: usize) -> Result<()> {
        let last_child_pointer = self.last_child_pointer;
        self.stream(level)?.seek(last_child_pointer)?;
        self.num_skipped[level] = self.num_skipped[level + 1] - self.skip_interval[level + 1];
        self.skip_doc[level] = self.last_doc;
        if level > 0 {
            self.child_pointer[level] = self.stream(level)?.read_vlong()? + self.skip_pointer[level - 1];
        }

        self.payload_pointer[level] = self.last_payload_pointer;
        self.payload_length[level] = self.last_payload_length;
        Ok(())
    }

    fn set_last_skip_data(&mut self, level: usize) {
        self.last_doc = self.skip_doc[level];
        self.last_child_pointer = self.child_pointer[level];

        self.last_payload_pointer = self.payload_pointer[level];
        self.last_payload_length = self.payload_length[level];
        self.last_freq_index.copy_from(&self.freq_index[level], false);
        self.last_doc_index.copy_from(&self.doc_index[level], false);
        self.last_pos_index.copy_from(&self.pos_index[level], false);

        if level > 0 {
            // entries of the child level are delta coded against this one
            let (lower, upper) = self.doc_index.split_at_mut(level);
            lower[level - 1].copy_from(&upper[0], false);
            let (lower, upper) = self.freq_index.split_at_mut(level);
            lower[level - 1].copy_from(&upper[0], false);
            let (lower, upper) = self.pos_index.split_at_mut(level);
            lower[level - 1].copy_from(&upper[0], false);
        }
    }

    fn read_skip_data(&mut self, level: usize) -> Result<i32> {
        let stream = match self.skip_stream[level] {
            Some(ref mut stream) => stream,
            None => bail!(IllegalState(format!("skip level {} is not loaded", level))),
        };
        let mut delta = stream.read_vint()?;
        if self.current_field_stores_payloads {
            if delta & 1 != 0 {
                self.payload_length[level] = stream.read_vint()?;
            }
            delta = (delta as u32 >> 1) as i32;
        }

        if self.index_options.has_freqs() {
            self.freq_index[level].read(stream, false)?;
        }
        self.doc_index[level].read(stream, false)?;
        if self.index_options.has_positions() {
            self.pos_index[level].read(stream, false)?;
            if self.current_field_stores_payloads {
                self.payload_pointer[level] += stream.read_vlong()?;
            }
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::postings::intblock::VIntIndex;
    use core::codec::postings::sep::SepSkipListWriter;
    use core::store::io::{DataOutput, RAMIndexInput, RAMOutputStream};
    use std::sync::Arc;

    fn vint_index(fp: i64) -> VIntIndex {
        let mut encoded = Vec::new();
        encoded.write_vlong(fp).unwrap();
        let mut index = VIntIndex::default();
        index.read(&mut &encoded[..], true).unwrap();
        index
    }

    // doc `i` of the term is `3 * i + 1`, and its doc stream bookmark is `10 * i`
    fn build(skip_interval: u32, df: u32) -> (Box<dyn IndexInput>, i64) {
        let mut writer = SepSkipListWriter::<VIntIndex>::new(skip_interval, 10, df * 3 + 1);
        writer.set_index_options(IndexOptions::Docs);
        let top = vint_index(0);
        writer.reset_skip(&top, &top, &top, 0);
        let mut last_doc = 0;
        for i in 0..df {
            let n = i + 1;
            if n % skip_interval == 0 {
                let index = vint_index(10 * i64::from(i));
                writer.set_skip_data(last_doc, false, -1, 0, &index, &top, &top);
                writer.buffer_skip(n).unwrap();
            }
            last_doc = 3 * i as i32 + 1;
        }
        let mut out = RAMOutputStream::new(false);
        out.write_vint(0).unwrap();
        let skip_fp = writer.write_skip(&mut out).unwrap();
        let input = RAMIndexInput::new("skip", Arc::new(out.into_bytes()));
        (Box::new(input), skip_fp)
    }

    #[test]
    fn test_skip_to() {
        let (skip_interval, df) = (4u32, 100u32);
        let (input, skip_fp) = build(skip_interval, df);
        let mut reader = SepSkipListReader::<VIntIndex>::new(input, 10, skip_interval);
        let top = vint_index(0);

        for &target in &[2, 13, 14, 50, 151, 200, 298, 1000] {
            reader
                .init(skip_fp, &top, &top, &top, 0, df as i32, IndexOptions::Docs, false)
                .unwrap();
            let count = reader.skip_to(target).unwrap();
            if count > 0 {
                // the skip point lands right after the doc it reports
                let skipped = count as i64;
                assert_eq!(reader.doc(), 3 * (skipped as i32 - 1) + 1);
                assert!(reader.doc() < target);
                assert_eq!(reader.doc_index().fp(), 10 * skipped);
                // the next skip point would have overshot
                let next_doc = 3 * (skipped as i32 + skip_interval as i32 - 1) + 1;
                assert!(next_doc >= target || skipped + 1 + i64::from(skip_interval) > i64::from(df));
            } else {
                assert_eq!(count, -1);
                assert!(3 * (skip_interval as i32 - 2) + 1 >= target);
            }
        }
    }

    #[test]
    fn test_skip_buffer_seek_bounds() {
        let mut input = RAMIndexInput::new("buf", Arc::new(vec![1u8, 2, 3, 4]));
        input.seek(1).unwrap();
        let mut buffer = SkipBuffer::new(&mut input, 2).unwrap();
        assert_eq!(buffer.file_pointer(), 1);
        assert_eq!(buffer.read_byte().unwrap(), 2);
        buffer.seek(2).unwrap();
        assert_eq!(buffer.read_byte().unwrap(), 3);
        assert!(buffer.seek(0).is_err());
        assert!(buffer.seek(4).is_err());
    }
}
