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

use std::sync::Arc;

use core::codec::field_infos::FieldInfos;
use core::store::directory::Directory;
use core::store::IOContext;

/// Returns a file name that includes the given segment name, suffix and extension.
///
/// The format is `{name}_{suffix}.{ext}`, the `_` is omitted for an empty
/// suffix and the `.` for an empty extension.
pub fn segment_file_name(name: &str, suffix: &str, ext: &str) -> String {
    if !ext.is_empty() || !suffix.is_empty() {
        debug_assert!(!ext.starts_with('.'));
        let mut filename = String::with_capacity(name.len() + 2 + suffix.len() + ext.len());
        filename.push_str(name);
        if !suffix.is_empty() {
            filename.push('_');
            filename.push_str(suffix);
        }
        if !ext.is_empty() {
            filename.push('.');
            filename.push_str(ext);
        }
        filename
    } else {
        String::from(name)
    }
}

/// Holder class for common parameters used during write.
pub struct SegmentWriteState<D: Directory> {
    /// `Directory` where this segment will be written to.
    pub directory: Arc<D>,

    pub segment_name: String,

    /// `FieldInfos` describing all fields in this segment.
    pub field_infos: Arc<FieldInfos>,

    /// Number of documents in the segment, bounds the skip list height.
    pub max_doc: i32,

    /// Unique suffix for any postings files written for this segment.
    pub segment_suffix: String,

    pub context: IOContext,
}

impl<D: Directory> SegmentWriteState<D> {
    pub fn new(
        directory: Arc<D>,
        segment_name: String,
        field_infos: Arc<FieldInfos>,
        max_doc: i32,
        segment_suffix: String,
        context: IOContext,
    ) -> Self {
        SegmentWriteState {
            directory,
            segment_name,
            field_infos,
            max_doc,
            segment_suffix,
            context,
        }
    }

    pub fn file_name(&self, ext: &str) -> String {
        segment_file_name(&self.segment_name, &self.segment_suffix, ext)
    }
}

/// Holder class for common parameters used during read.
pub struct SegmentReadState<'a, D: Directory> {
    /// `Directory` where this segment is read from.
    pub directory: Arc<D>,

    pub segment_name: String,

    /// `FieldInfos` describing all fields in this segment.
    pub field_infos: Arc<FieldInfos>,

    pub max_doc: i32,

    /// `IOContext` to pass to `Directory::open_input`.
    pub context: &'a IOContext,

    /// Unique suffix for any postings files read for this segment.
    pub segment_suffix: String,
}

impl<'a, D: Directory> SegmentReadState<'a, D> {
    pub fn new(
        directory: Arc<D>,
        segment_name: String,
        field_infos: Arc<FieldInfos>,
        max_doc: i32,
        context: &'a IOContext,
        segment_suffix: String,
    ) -> Self {
        SegmentReadState {
            directory,
            segment_name,
            field_infos,
            max_doc,
            context,
            segment_suffix,
        }
    }

    pub fn file_name(&self, ext: &str) -> String {
        segment_file_name(&self.segment_name, &self.segment_suffix, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_name() {
        assert_eq!(segment_file_name("_0", "", "doc"), "_0.doc");
        assert_eq!(segment_file_name("_0", "Sep_0", "skp"), "_0_Sep_0.skp");
        assert_eq!(segment_file_name("_0", "1", ""), "_0_1");
        assert_eq!(segment_file_name("_0", "", ""), "_0");
    }
}
