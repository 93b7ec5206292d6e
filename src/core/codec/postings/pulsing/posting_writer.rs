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
use core::codec::postings::pulsing::{
    PulsingTermState, PulsingVersion, PULSING_CODEC, SUMMARY_EXTENSION,
};
use core::codec::postings::{BlockTermState, PostingsWriterBase};
use core::codec::segment_infos::SegmentWriteState;
use core::index::IndexOptions;
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexOutput, RAMOutputStream};
use core::util::io::close_all;
use core::util::DocId;

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;

use std::io::Write;

/// One buffered occurrence. For docs and docs+freqs fields there is one
/// record per doc, otherwise one per position, each carrying its doc.
#[derive(Clone, Debug, Default)]
struct Position {
    doc_id: DocId,
    term_freq: i32,
    pos: i32,
    start_offset: i32,
    end_offset: i32,
    payload: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    /// `count` records of the current term are buffered.
    Buffering { count: usize },
    /// The term overflowed the buffer and goes to the wrapped writer.
    Forwarding,
}

/// Writer for the pulsing format.
///
/// Wraps another postings writer. While a term has at most `max_positions`
/// occurrences its postings are buffered, and written as a blob into the
/// terms dictionary on `finish_term`. Once a term exceeds the cutoff, the
/// buffer is replayed into the wrapped writer and the rest of the term
/// passes straight through.
pub struct PulsingPostingsWriter<W: PostingsWriterBase> {
    version: PulsingVersion,
    wrapped: W,

    pending: Vec<Position>,
    pending_state: Pending,
    // sum of buffered freqs, bounds docs+freqs fields
    pending_freq: i64,
    current_doc: DocId,
    current_freq: i32,
    last_doc_id: DocId,

    index_options: IndexOptions,
    store_payloads: bool,

    // field number and longs size of every field seen
    fields: Vec<(u32, usize)>,
    longs: Vec<i64>,
    buffer: RAMOutputStream,
    absolute: bool,

    summary_out: Option<Box<dyn IndexOutput>>,
    closed: bool,
}

impl<W: PostingsWriterBase> PulsingPostingsWriter<W> {
    /// `max_positions` is the largest number of occurrences a term may have
    /// to be inlined.
    pub fn new<D: Directory>(
        state: &SegmentWriteState<D>,
        wrapped: W,
        max_positions: u32,
        version: PulsingVersion,
    ) -> Result<PulsingPostingsWriter<W>> {
        if max_positions == 0 || max_positions > i32::max_value() as u32 {
            bail!(IllegalArgument(format!(
                "max_positions must be in [1, {}], got {}",
                i32::max_value(),
                max_positions
            )));
        }

        // only the innermost pulsing layer writes the summary
        let summary_out: Option<Box<dyn IndexOutput>> = if !W::IS_PULSING && version.has_summary()
        {
            let name = state.file_name(SUMMARY_EXTENSION);
            debug!("creating pulsing summary {}", name);
            Some(Box::new(
                state.directory.create_output(&name, &state.context)?,
            ))
        } else {
            None
        };

        Ok(PulsingPostingsWriter {
            version,
            wrapped,
            pending: vec![Position::default(); max_positions as usize],
            pending_state: Pending::Buffering { count: 0 },
            pending_freq: 0,
            current_doc: -1,
            current_freq: 0,
            last_doc_id: -1,
            index_options: IndexOptions::Docs,
            store_payloads: false,
            fields: Vec::new(),
            longs: Vec::new(),
            buffer: RAMOutputStream::new(false),
            absolute: false,
            summary_out,
            closed: false,
        })
    }

    pub fn max_positions(&self) -> usize {
        self.pending.len()
    }

    pub fn wrapped(&self) -> &W {
        &self.wrapped
    }

    // Replays the buffered records into the wrapped writer and switches the
    // term to forwarding. The last doc is left open.
    fn push(&mut self) -> Result<()> {
        let count = match self.pending_state {
            Pending::Buffering { count } => count,
            Pending::Forwarding => return Ok(()),
        };

        self.wrapped.start_term()?;
        if self.index_options.has_positions() {
            let mut doc_id = -1;
            for pos in &self.pending[..count] {
                if pos.doc_id != doc_id {
                    if doc_id != -1 {
                        self.wrapped.finish_doc()?;
                    }
                    self.wrapped.start_doc(pos.doc_id, pos.term_freq)?;
                    doc_id = pos.doc_id;
                }
                let payload = if pos.payload.is_empty() {
                    None
                } else {
                    Some(pos.payload.as_slice())
                };
                self.wrapped
                    .add_position(pos.pos, payload, pos.start_offset, pos.end_offset)?;
            }
        } else {
            for (i, doc) in self.pending[..count].iter().enumerate() {
                if i > 0 {
                    self.wrapped.finish_doc()?;
                }
                self.wrapped.start_doc(doc.doc_id, doc.term_freq)?;
            }
        }
        self.pending_state = Pending::Forwarding;
        Ok(())
    }

    // Serializes the buffered records into `buffer`.
    fn write_inlined(&mut self, count: usize) -> Result<()> {
        let options = self.index_options;
        let buffer = &mut self.buffer;
        let pending = &self.pending[..count];
        buffer.reset();

        if !options.has_freqs() {
            let mut last_doc_id = 0;
            for doc in pending {
                buffer.write_vint(doc.doc_id - last_doc_id)?;
                last_doc_id = doc.doc_id;
            }
        } else if !options.has_positions() {
            let mut last_doc_id = 0;
            for doc in pending {
                write_doc_code(buffer, doc.doc_id - last_doc_id, doc.term_freq)?;
                last_doc_id = doc.doc_id;
            }
        } else {
            let store_payloads = self.store_payloads;
            let store_offsets = options.has_offsets();
            let mut last_doc_id = 0;
            let mut last_payload_length = -1;
            let mut last_offset_length = -1;
            let mut upto = 0;
            while upto < count {
                let doc = &pending[upto];
                let end = upto + doc.term_freq.max(0) as usize;
                if doc.term_freq <= 0 || end > count {
                    bail!(IllegalState(format!(
                        "doc {} declared freq {} but buffered {} positions",
                        doc.doc_id,
                        doc.term_freq,
                        count - upto
                    )));
                }
                write_doc_code(buffer, doc.doc_id - last_doc_id, doc.term_freq)?;
                last_doc_id = doc.doc_id;

                let mut last_pos = 0;
                let mut last_offset = 0;
                for pos in &pending[upto..end] {
                    let pos_delta = pos.pos - last_pos;
                    last_pos = pos.pos;
                    let payload_length = pos.payload.len() as i32;
                    if store_payloads {
                        if payload_length != last_payload_length {
                            buffer.write_vint((pos_delta << 1) | 1)?;
                            buffer.write_vint(payload_length)?;
                            last_payload_length = payload_length;
                        } else {
                            buffer.write_vint(pos_delta << 1)?;
                        }
                    } else {
                        buffer.write_vint(pos_delta)?;
                    }

                    if store_offsets {
                        let offset_delta = pos.start_offset - last_offset;
                        let offset_length = pos.end_offset - pos.start_offset;
                        if offset_length != last_offset_length {
                            buffer.write_vint((offset_delta << 1) | 1)?;
                            buffer.write_vint(offset_length)?;
                        } else {
                            buffer.write_vint(offset_delta << 1)?;
                        }
                        last_offset = pos.start_offset;
                        last_offset_length = offset_length;
                    }

                    if store_payloads && payload_length > 0 {
                        buffer.write_bytes(&pos.payload, 0, pos.payload.len())?;
                    }
                }
                upto = end;
            }
        }
        Ok(())
    }

    fn reset_term(&mut self) {
        self.pending_state = Pending::Buffering { count: 0 };
        self.pending_freq = 0;
        self.current_doc = -1;
        self.current_freq = 0;
        self.last_doc_id = -1;
    }
}

fn write_doc_code(out: &mut impl DataOutput, delta: i32, freq: i32) -> Result<()> {
    if freq == 1 {
        out.write_vint((delta << 1) | 1)
    } else {
        out.write_vint(delta << 1)?;
        out.write_vint(freq)
    }
}

fn write_summary(
    out: &mut Box<dyn IndexOutput>,
    version: PulsingVersion,
    fields: &[(u32, usize)],
) -> Result<()> {
    codec_util::write_header(out.as_mut(), PULSING_CODEC, version.value())?;
    out.write_vint(fields.len() as i32)?;
    for &(number, longs_size) in fields {
        out.write_vint(number as i32)?;
        out.write_vint(longs_size as i32)?;
    }
    codec_util::write_footer(out)?;
    out.flush()?;
    Ok(())
}

impl<W: PostingsWriterBase> PostingsWriterBase for PulsingPostingsWriter<W> {
    type TermState = PulsingTermState<W::TermState>;

    const IS_PULSING: bool = true;

    fn init(&mut self, terms_out: &mut impl DataOutput) -> Result<()> {
        codec_util::write_header(terms_out, PULSING_CODEC, self.version.value())?;
        terms_out.write_vint(self.pending.len() as i32)?;
        self.wrapped.init(terms_out)
    }

    fn new_term_state(&self) -> BlockTermState<PulsingTermState<W::TermState>> {
        BlockTermState::new(PulsingTermState::new(self.wrapped.new_term_state()))
    }

    fn set_field(&mut self, field_info: &FieldInfo) -> Result<usize> {
        let longs_size = self.wrapped.set_field(field_info)?;
        self.index_options = field_info.index_options;
        self.store_payloads = field_info.has_store_payloads;
        self.longs = vec![0; longs_size];
        self.fields.push((field_info.number, longs_size));
        Ok(0)
    }

    fn start_term(&mut self) -> Result<()> {
        self.reset_term();
        Ok(())
    }

    fn start_doc(&mut self, doc_id: DocId, freq: i32) -> Result<()> {
        if let Pending::Buffering { count } = self.pending_state {
            let overflow = if self.index_options.has_positions() || !self.index_options.has_freqs() {
                count == self.pending.len()
            } else {
                self.pending_freq + i64::from(freq) > self.pending.len() as i64
            };
            if overflow {
                self.push()?;
                if count > 0 {
                    self.wrapped.finish_doc()?;
                }
            }
        }

        match self.pending_state {
            Pending::Buffering { count } => {
                if doc_id < 0 || doc_id <= self.last_doc_id {
                    bail!(CorruptIndex(format!(
                        "docs out of order ({} <= {})",
                        doc_id, self.last_doc_id
                    )));
                }
                self.last_doc_id = doc_id;
                self.current_doc = doc_id;
                self.current_freq = freq;
                if !self.index_options.has_positions() {
                    let slot = &mut self.pending[count];
                    slot.doc_id = doc_id;
                    slot.term_freq = freq;
                    if self.index_options.has_freqs() {
                        self.pending_freq += i64::from(freq);
                    }
                    self.pending_state = Pending::Buffering { count: count + 1 };
                }
                Ok(())
            }
            Pending::Forwarding => self.wrapped.start_doc(doc_id, freq),
        }
    }

    fn add_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        if let Pending::Buffering { count } = self.pending_state {
            if count == self.pending.len() {
                self.push()?;
            }
        }

        match self.pending_state {
            Pending::Buffering { count } => {
                let slot = &mut self.pending[count];
                slot.doc_id = self.current_doc;
                slot.term_freq = self.current_freq;
                slot.pos = position;
                slot.start_offset = start_offset;
                slot.end_offset = end_offset;
                slot.payload.clear();
                if let Some(payload) = payload {
                    slot.payload.extend_from_slice(payload);
                }
                self.pending_state = Pending::Buffering { count: count + 1 };
                Ok(())
            }
            Pending::Forwarding => {
                self.wrapped
                    .add_position(position, payload, start_offset, end_offset)
            }
        }
    }

    fn finish_doc(&mut self) -> Result<()> {
        match self.pending_state {
            Pending::Forwarding => self.wrapped.finish_doc(),
            Pending::Buffering { .. } => Ok(()),
        }
    }

    fn finish_term(
        &mut self,
        state: &mut BlockTermState<PulsingTermState<W::TermState>>,
    ) -> Result<()> {
        match self.pending_state {
            Pending::Forwarding => {
                let term = &mut state.codec;
                term.wrapped.doc_freq = state.doc_freq;
                term.wrapped.total_term_freq = state.total_term_freq;
                term.postings = None;
                self.wrapped.finish_term(&mut term.wrapped)?;
            }
            Pending::Buffering { count } => {
                if count == 0 {
                    bail!(IllegalState("finishing a term without docs".into()));
                }
                self.write_inlined(count)?;
                state.codec.postings = Some(self.buffer.as_bytes().to_vec());
            }
        }
        self.reset_term();
        Ok(())
    }

    fn encode_term(
        &mut self,
        _longs: &mut [i64],
        out: &mut impl DataOutput,
        field_info: &FieldInfo,
        state: &BlockTermState<PulsingTermState<W::TermState>>,
        absolute: bool,
    ) -> Result<()> {
        // an inlined term at a block boundary leaves the wrapped writer to
        // start its next term absolute
        self.absolute = self.absolute || absolute;
        match state.codec.postings {
            Some(ref bytes) => {
                out.write_vint(bytes.len() as i32)?;
                out.write_bytes(bytes, 0, bytes.len())?;
            }
            None => {
                for long in self.longs.iter_mut() {
                    *long = 0;
                }
                self.buffer.reset();
                self.wrapped.encode_term(
                    &mut self.longs,
                    &mut self.buffer,
                    field_info,
                    &state.codec.wrapped,
                    self.absolute,
                )?;
                for long in &self.longs {
                    out.write_vlong(*long)?;
                }
                self.buffer.write_to(out)?;
                self.buffer.reset();
                self.absolute = false;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let version = self.version;
        let fields = &self.fields;
        let wrapped = &mut self.wrapped;
        let mut actions: Vec<Box<dyn FnOnce() -> Result<()> + '_>> = Vec::with_capacity(2);
        actions.push(Box::new(move || wrapped.close()));
        if let Some(ref mut out) = self.summary_out {
            actions.push(Box::new(move || write_summary(out, version, fields)));
        }
        close_all(actions)
    }
}
