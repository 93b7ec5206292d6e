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

//! In-memory terms dictionary used to drive postings writers and readers in
//! tests.

use core::codec::field_infos::{FieldInfo, FieldInfos};
use core::codec::postings::{
    positions_requested, BlockTermState, PostingsFormat, PostingsReaderBase, PostingsWriterBase,
};
use core::codec::segment_infos::{SegmentReadState, SegmentWriteState};
use core::index::IndexOptions;
use core::search::{DocIterator, Payload, PostingIterator, PostingIteratorFlags, NO_MORE_DOCS};
use core::store::directory::RAMDirectory;
use core::store::IOContext;
use core::util::{Bits, DocId, FixedBitSet};

use error::Result;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct TestPosition {
    pub pos: i32,
    pub start_offset: i32,
    pub end_offset: i32,
    pub payload: Vec<u8>,
}

impl TestPosition {
    pub fn new(pos: i32) -> TestPosition {
        TestPosition {
            pos,
            start_offset: -1,
            end_offset: -1,
            payload: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestDoc {
    pub doc: DocId,
    pub freq: i32,
    pub positions: Vec<TestPosition>,
}

impl TestDoc {
    pub fn new(doc: DocId, positions: &[i32]) -> TestDoc {
        TestDoc {
            doc,
            freq: positions.len() as i32,
            positions: positions.iter().map(|p| TestPosition::new(*p)).collect(),
        }
    }
}

pub fn field_info(name: &str, number: u32, index_options: IndexOptions, payloads: bool) -> FieldInfo {
    FieldInfo {
        name: name.to_string(),
        number,
        index_options,
        has_store_payloads: payloads,
    }
}

pub fn segment_write_state(
    dir: &Arc<RAMDirectory>,
    fields: &[FieldInfo],
    max_doc: i32,
) -> SegmentWriteState<RAMDirectory> {
    SegmentWriteState::new(
        Arc::clone(dir),
        "_0".to_string(),
        Arc::new(FieldInfos::new(fields.to_vec()).unwrap()),
        max_doc,
        String::new(),
        IOContext::Default,
    )
}

pub fn segment_read_state<'a>(
    dir: &Arc<RAMDirectory>,
    fields: &[FieldInfo],
    max_doc: i32,
    context: &'a IOContext,
) -> SegmentReadState<'a, RAMDirectory> {
    SegmentReadState::new(
        Arc::clone(dir),
        "_0".to_string(),
        Arc::new(FieldInfos::new(fields.to_vec()).unwrap()),
        max_doc,
        context,
        String::new(),
    )
}

/// Serves one term's postings from memory, the way an indexing chain feeds
/// `PostingsWriterBase::write_term`.
pub struct MemoryPostings {
    docs: Vec<TestDoc>,
    upto: usize,
    pos_upto: usize,
    doc: DocId,
}

impl MemoryPostings {
    pub fn new(docs: Vec<TestDoc>) -> MemoryPostings {
        MemoryPostings {
            docs,
            upto: 0,
            pos_upto: 0,
            doc: -1,
        }
    }

    fn current(&self) -> &TestDoc {
        &self.docs[self.upto - 1]
    }

    fn current_position(&self) -> &TestPosition {
        &self.current().positions[self.pos_upto - 1]
    }
}

impl DocIterator for MemoryPostings {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        if self.upto == self.docs.len() {
            self.doc = NO_MORE_DOCS;
        } else {
            self.upto += 1;
            self.pos_upto = 0;
            self.doc = self.current().doc;
        }
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.slow_advance(target)
    }

    fn cost(&self) -> usize {
        self.docs.len()
    }
}

impl PostingIterator for MemoryPostings {
    fn freq(&self) -> Result<i32> {
        Ok(self.current().freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        self.pos_upto += 1;
        Ok(self.current_position().pos)
    }

    fn start_offset(&self) -> Result<i32> {
        Ok(self.current_position().start_offset)
    }

    fn end_offset(&self) -> Result<i32> {
        Ok(self.current_position().end_offset)
    }

    fn payload(&mut self) -> Result<Payload> {
        Ok(self.current_position().payload.clone())
    }
}

/// The metadata a terms dictionary stores for one term.
#[derive(Clone, Debug)]
pub struct EncodedTerm {
    pub doc_freq: i32,
    pub total_term_freq: i64,
    pub longs: Vec<i64>,
    pub bytes: Vec<u8>,
    pub absolute: bool,
}

/// Terms of one field, in the order they were written.
pub struct TestField {
    pub field_info: FieldInfo,
    pub terms: Vec<Vec<TestDoc>>,
}

pub struct TermsDict {
    pub header: Vec<u8>,
    pub fields: Vec<Vec<EncodedTerm>>,
}

/// Writes every term of every field, encoding term metadata absolute at the
/// first term of each block of `block_size` terms.
pub fn write_terms<W: PostingsWriterBase>(
    writer: &mut W,
    fields: &[TestField],
    block_size: usize,
    max_doc: i32,
) -> Result<TermsDict> {
    let mut header = Vec::new();
    writer.init(&mut header)?;

    let mut encoded_fields = Vec::with_capacity(fields.len());
    for field in fields {
        let longs_size = writer.set_field(&field.field_info)?;
        let mut docs_seen = FixedBitSet::new(max_doc as usize);
        let mut encoded = Vec::with_capacity(field.terms.len());
        for (i, docs) in field.terms.iter().enumerate() {
            let mut postings = MemoryPostings::new(docs.clone());
            let state = writer
                .write_term(&field.field_info, &mut postings, &mut docs_seen)?
                .expect("every test term has docs");
            let absolute = i % block_size == 0;
            let mut longs = vec![0i64; longs_size];
            let mut bytes = Vec::new();
            writer.encode_term(&mut longs, &mut bytes, &field.field_info, &state, absolute)?;
            encoded.push(EncodedTerm {
                doc_freq: state.doc_freq,
                total_term_freq: state.total_term_freq,
                longs,
                bytes,
                absolute,
            });
        }
        encoded_fields.push(encoded);
    }
    writer.close()?;
    Ok(TermsDict {
        header,
        fields: encoded_fields,
    })
}

/// Decodes every term of `dict`, carrying one term state per field the way
/// a terms dictionary walks its blocks.
pub fn read_terms<R: PostingsReaderBase>(
    reader: &mut R,
    fields: &[TestField],
    dict: &TermsDict,
) -> Result<Vec<Vec<BlockTermState<R::TermState>>>> {
    let mut header = dict.header.as_slice();
    reader.init(&mut header)?;
    assert!(header.is_empty(), "init left {} bytes", header.len());

    let mut states = Vec::with_capacity(fields.len());
    for (field, encoded) in fields.iter().zip(dict.fields.iter()) {
        let mut state = reader.new_term_state();
        let mut field_states = Vec::with_capacity(encoded.len());
        for term in encoded {
            state.doc_freq = term.doc_freq;
            state.total_term_freq = term.total_term_freq;
            let mut input = term.bytes.as_slice();
            reader.decode_term(
                &term.longs,
                &mut input,
                &field.field_info,
                &mut state,
                term.absolute,
            )?;
            assert!(input.is_empty(), "decode_term left {} bytes", input.len());
            field_states.push(state.clone());
        }
        states.push(field_states);
    }
    Ok(states)
}

/// Writes `fields` with `format` into `dir`, then opens a reader and decodes
/// every term.
pub fn write_and_read<F: PostingsFormat>(
    format: &F,
    dir: &Arc<RAMDirectory>,
    fields: &[TestField],
    block_size: usize,
    max_doc: i32,
) -> Result<(
    F::Reader,
    Vec<Vec<BlockTermState<<F::Reader as PostingsReaderBase>::TermState>>>,
)> {
    let infos: Vec<FieldInfo> = fields.iter().map(|f| f.field_info.clone()).collect();
    let write_state = segment_write_state(dir, &infos, max_doc);
    let mut writer = format.postings_writer(&write_state)?;
    let dict = write_terms(&mut writer, fields, block_size, max_doc)?;

    let context = IOContext::Default;
    let read_state = segment_read_state(dir, &infos, max_doc, &context);
    let mut reader = format.postings_reader(&read_state)?;
    let states = read_terms(&mut reader, fields, &dict)?;
    Ok((reader, states))
}

/// Pulls everything `flags` asks for out of `iter`.
pub fn collect<P: PostingIterator>(
    iter: &mut P,
    field_info: &FieldInfo,
    flags: u16,
) -> Result<Vec<TestDoc>> {
    let with_positions = positions_requested(field_info, flags);
    let mut docs = Vec::new();
    loop {
        let doc = iter.next()?;
        if doc == NO_MORE_DOCS {
            break;
        }
        docs.push(read_doc(iter, doc, with_positions)?);
    }
    Ok(docs)
}

/// Reads the freq and, if requested, the positions of the current doc.
pub fn read_doc<P: PostingIterator>(
    iter: &mut P,
    doc: DocId,
    with_positions: bool,
) -> Result<TestDoc> {
    let freq = iter.freq()?;
    let mut positions = Vec::new();
    if with_positions {
        for _ in 0..freq {
            let pos = iter.next_position()?;
            positions.push(TestPosition {
                pos,
                start_offset: iter.start_offset()?,
                end_offset: iter.end_offset()?,
                payload: iter.payload()?,
            });
        }
    }
    Ok(TestDoc {
        doc,
        freq,
        positions,
    })
}

/// Randomly interleaves `next` and `advance` on terms of `doc_freqs` docs,
/// for every field layout and every request flags, checking each landing doc
/// against a linear scan of the written postings.
pub fn check_advance<F: PostingsFormat>(format: &F, seed: u64, doc_freqs: &[usize]) {
    let max_doc = 5000;
    let mut rng = StdRng::seed_from_u64(seed);
    let layouts = [
        (IndexOptions::Docs, false),
        (IndexOptions::DocsAndFreqs, false),
        (IndexOptions::DocsAndFreqsAndPositions, false),
        (IndexOptions::DocsAndFreqsAndPositions, true),
        (IndexOptions::DocsAndFreqsAndPositionsAndOffsets, false),
        (IndexOptions::DocsAndFreqsAndPositionsAndOffsets, true),
    ];
    let mut fields = Vec::with_capacity(layouts.len());
    for (number, &(options, payloads)) in layouts.iter().enumerate() {
        let info = field_info(&format!("f{}", number), number as u32, options, payloads);
        let mut terms = Vec::with_capacity(doc_freqs.len());
        for &doc_freq in doc_freqs {
            terms.push(random_postings(&mut rng, &info, doc_freq, max_doc, 4));
        }
        fields.push(TestField {
            field_info: info,
            terms,
        });
    }
    let dir = Arc::new(RAMDirectory::new());
    let (reader, states) = write_and_read(format, &dir, &fields, 3, max_doc).unwrap();

    let all_flags = [
        PostingIteratorFlags::NONE,
        PostingIteratorFlags::FREQS,
        PostingIteratorFlags::POSITIONS,
        PostingIteratorFlags::ALL,
    ];
    for (field, field_states) in fields.iter().zip(states.iter()) {
        let info = &field.field_info;
        for (docs, state) in field.terms.iter().zip(field_states.iter()) {
            for &flags in &all_flags {
                let with_positions = positions_requested(info, flags);
                let want = expected(docs, info, flags);
                let mut iter = reader.postings(info, state, None, None, flags).unwrap();
                let mut doc = -1;
                loop {
                    let (target, got) = if rng.gen_bool(0.2) {
                        (doc + 1, iter.next().unwrap())
                    } else {
                        let target = doc + rng.gen_range(1, 200);
                        (target, iter.advance(target).unwrap())
                    };
                    match want.iter().find(|d| d.doc >= target) {
                        Some(d) => {
                            assert_eq!(got, d.doc, "field {} flags {}", info.name, flags);
                            if rng.gen_bool(0.5) {
                                assert_eq!(read_doc(&mut iter, got, with_positions).unwrap(), *d);
                            } else {
                                assert_eq!(iter.freq().unwrap(), d.freq);
                            }
                            doc = got;
                        }
                        None => {
                            assert_eq!(got, NO_MORE_DOCS, "field {} flags {}", info.name, flags);
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// What a reader is expected to return for `docs` under `flags`.
pub fn expected(docs: &[TestDoc], field_info: &FieldInfo, flags: u16) -> Vec<TestDoc> {
    let options = field_info.index_options;
    let with_positions = positions_requested(field_info, flags);
    docs.iter()
        .map(|d| TestDoc {
            doc: d.doc,
            freq: if options.has_freqs() { d.freq } else { 1 },
            positions: if with_positions {
                d.positions
                    .iter()
                    .map(|p| TestPosition {
                        pos: p.pos,
                        start_offset: if options.has_offsets() {
                            p.start_offset
                        } else {
                            -1
                        },
                        end_offset: if options.has_offsets() { p.end_offset } else { -1 },
                        payload: if field_info.has_store_payloads {
                            p.payload.clone()
                        } else {
                            Vec::new()
                        },
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect()
}

/// Random postings of `doc_freq` docs below `max_doc`, shaped by the index
/// options and payload flag of `field_info`.
pub fn random_postings<R: Rng>(
    rng: &mut R,
    field_info: &FieldInfo,
    doc_freq: usize,
    max_doc: i32,
    max_freq: i32,
) -> Vec<TestDoc> {
    let options = field_info.index_options;
    let mut doc_ids: Vec<DocId> = Vec::with_capacity(doc_freq);
    let mut seen = FixedBitSet::new(max_doc as usize);
    while doc_ids.len() < doc_freq {
        let doc = rng.gen_range(0, max_doc);
        if !seen.get(doc as usize).unwrap() {
            seen.set(doc as usize);
            doc_ids.push(doc);
        }
    }
    doc_ids.sort();

    doc_ids
        .into_iter()
        .map(|doc| {
            if !options.has_freqs() {
                return TestDoc {
                    doc,
                    freq: -1,
                    positions: Vec::new(),
                };
            }
            let freq = rng.gen_range(1, max_freq + 1);
            let mut positions = Vec::new();
            if options.has_positions() {
                let mut pos = 0;
                let mut offset = 0;
                for _ in 0..freq {
                    pos += rng.gen_range(0, 5);
                    offset += rng.gen_range(0, 8);
                    let length = rng.gen_range(0, 6);
                    let payload = if field_info.has_store_payloads {
                        let len = rng.gen_range(0, 4);
                        (0..len).map(|_| rng.gen::<u8>()).collect()
                    } else {
                        Vec::new()
                    };
                    positions.push(TestPosition {
                        pos,
                        start_offset: offset,
                        end_offset: offset + length,
                        payload,
                    });
                }
            }
            TestDoc {
                doc,
                freq,
                positions,
            }
        })
        .collect()
}
