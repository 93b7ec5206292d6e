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

use core::index::IndexOptions;
use error::ErrorKind::IllegalState;
use error::Result;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Access to the Field Info file that describes document fields and whether or
/// not they are indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub index_options: IndexOptions,
    pub has_store_payloads: bool,
}

impl FieldInfo {
    pub fn new(
        name: String,
        number: u32,
        index_options: IndexOptions,
        store_payloads: bool,
    ) -> Result<FieldInfo> {
        let info = FieldInfo {
            name,
            number,
            index_options,
            has_store_payloads: store_payloads,
        };

        info.check_consistency()?;
        Ok(info)
    }

    pub fn check_consistency(&self) -> Result<()> {
        if self.index_options == IndexOptions::Null {
            if self.has_store_payloads {
                bail!(IllegalState(format!(
                    "Illegal State: non-indexed field '{}' cannot store payloads",
                    &self.name
                )));
            }
        } else if !self.index_options.has_positions() && self.has_store_payloads {
            bail!(IllegalState(format!(
                "Illegal State: indexed field '{}' cannot have payloads without positions",
                &self.name
            )));
        }
        Ok(())
    }

    pub fn set_store_payloads(&mut self) {
        if self.index_options.has_positions() {
            self.has_store_payloads = true;
        }
    }
}

/// Collection of `FieldInfo`s (accessible by number or by name).
#[derive(Debug)]
pub struct FieldInfos {
    pub has_freq: bool,
    pub has_prox: bool,
    pub has_payloads: bool,
    pub has_offsets: bool,

    pub by_number: BTreeMap<u32, Arc<FieldInfo>>,
    pub by_name: HashMap<String, Arc<FieldInfo>>,
}

impl Serialize for FieldInfos {
    fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("FieldInfos", 5)?;
        s.serialize_field("has_freq", &self.has_freq)?;
        s.serialize_field("has_prox", &self.has_prox)?;
        s.serialize_field("has_payloads", &self.has_payloads)?;
        s.serialize_field("has_offsets", &self.has_offsets)?;

        let fields: BTreeMap<u32, &FieldInfo> = self
            .by_number
            .iter()
            .map(|pair| (*pair.0, pair.1.as_ref()))
            .collect();
        s.serialize_field("fields", &fields)?;
        s.end()
    }
}

impl fmt::Display for FieldInfos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

impl FieldInfos {
    pub fn new(infos: Vec<FieldInfo>) -> Result<FieldInfos> {
        let mut has_prox = false;
        let mut has_payloads = false;
        let mut has_offsets = false;
        let mut has_freq = false;

        let mut by_number: BTreeMap<u32, Arc<FieldInfo>> = BTreeMap::new();
        let mut by_name: HashMap<String, Arc<FieldInfo>> = HashMap::new();

        for info in infos {
            info.check_consistency()?;
            let info = Arc::new(info);
            let number = info.number;

            has_prox |= info.index_options.has_positions();
            has_freq |= info.index_options.has_freqs();
            has_offsets |= info.index_options.has_offsets();
            has_payloads |= info.has_store_payloads;

            if let Some(previous) = by_number.insert(number, Arc::clone(&info)) {
                bail!(IllegalState(format!(
                    "Illegal State: duplicate field numbers: {} and {} have: {}",
                    previous.name, info.name, number
                )));
            }

            if let Some(previous) = by_name.insert(info.name.clone(), Arc::clone(&info)) {
                bail!(IllegalState(format!(
                    "Illegal State: duplicate field names: {} and {} have: {}",
                    previous.number, info.number, info.name
                )));
            }
        }

        Ok(FieldInfos {
            has_freq,
            has_prox,
            has_payloads,
            has_offsets,
            by_number,
            by_name,
        })
    }

    pub fn field_info_by_name(&self, field_name: &str) -> Option<&FieldInfo> {
        self.by_name.get(field_name).map(|info| &**info)
    }

    pub fn field_info_by_number(&self, field_number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&field_number).map(|info| &**info)
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_require_positions() {
        assert!(FieldInfo::new("f".into(), 0, IndexOptions::DocsAndFreqs, true).is_err());
        assert!(FieldInfo::new("f".into(), 0, IndexOptions::Null, true).is_err());
        assert!(FieldInfo::new("f".into(), 0, IndexOptions::DocsAndFreqsAndPositions, true).is_ok());

        let mut info = FieldInfo::new("f".into(), 0, IndexOptions::Docs, false).unwrap();
        info.set_store_payloads();
        assert!(!info.has_store_payloads);
    }

    #[test]
    fn test_field_infos_aggregates() {
        let infos = FieldInfos::new(vec![
            FieldInfo::new("id".into(), 0, IndexOptions::Docs, false).unwrap(),
            FieldInfo::new(
                "body".into(),
                1,
                IndexOptions::DocsAndFreqsAndPositionsAndOffsets,
                true,
            )
            .unwrap(),
        ])
        .unwrap();
        assert!(infos.has_freq && infos.has_prox && infos.has_offsets && infos.has_payloads);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos.field_info_by_name("body").unwrap().number, 1);
        assert_eq!(infos.field_info_by_number(0).unwrap().name, "id");
        assert!(format!("{}", infos).contains("has_offsets"));
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let res = FieldInfos::new(vec![
            FieldInfo::new("a".into(), 3, IndexOptions::Docs, false).unwrap(),
            FieldInfo::new("b".into(), 3, IndexOptions::Docs, false).unwrap(),
        ]);
        assert!(res.is_err());
    }
}
