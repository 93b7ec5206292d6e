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

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, RwLock};

use flate2::Crc;

use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexInput, IndexOutput, RAMIndexInput};
use core::store::IOContext;
use error::ErrorKind::IllegalArgument;
use error::Result;

type RAMFile = Arc<Mutex<Vec<u8>>>;

/// Heap backed directory. Outputs write straight into the shared file buffer,
/// inputs read a snapshot taken at open time.
#[derive(Default)]
pub struct RAMDirectory {
    files: RwLock<HashMap<String, RAMFile>>,
}

impl RAMDirectory {
    pub fn new() -> RAMDirectory {
        Self::default()
    }

    fn file(&self, name: &str) -> Result<RAMFile> {
        match self.files.read()?.get(name) {
            Some(file) => Ok(Arc::clone(file)),
            None => bail!(IllegalArgument(format!("file '{}' does not exist", name))),
        }
    }
}

impl Directory for RAMDirectory {
    type IndexOutput = RAMFileOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        let file = self.file(name)?;
        let len = file.lock()?.len();
        Ok(len as i64)
    }

    fn create_output(&self, name: &str, _context: &IOContext) -> Result<Self::IndexOutput> {
        let file: RAMFile = Arc::new(Mutex::new(Vec::new()));
        self.files
            .write()?
            .insert(name.to_string(), Arc::clone(&file));
        Ok(RAMFileOutput {
            name: name.to_string(),
            file,
            crc: Crc::new(),
            written: 0,
        })
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let file = self.file(name)?;
        let snapshot = file.lock()?.clone();
        Ok(Box::new(RAMIndexInput::new(name, Arc::new(snapshot))))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        if self.files.write()?.remove(name).is_none() {
            bail!(IllegalArgument(format!("file '{}' does not exist", name)));
        }
        Ok(())
    }
}

impl fmt::Display for RAMDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RAMDirectory")
    }
}

pub struct RAMFileOutput {
    name: String,
    file: RAMFile,
    crc: Crc,
    written: usize,
}

impl Write for RAMFileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock() {
            Ok(mut file) => file.extend_from_slice(buf),
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "ram file lock poisoned",
                ));
            }
        }
        self.crc.update(buf);
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMFileOutput {}

impl IndexOutput for RAMFileOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.written as i64
    }

    fn checksum(&self) -> Result<i64> {
        Ok(i64::from(self.crc.sum()) & 0xffff_ffffi64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::{ChecksumIndexInput, DataInput};

    #[test]
    fn test_ram_directory_files() {
        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("b.pos", &IOContext::Default).unwrap();
            out.write_vlong(1 << 20).unwrap();
        }
        {
            let mut out = dir.create_output("a.doc", &IOContext::Default).unwrap();
            out.write_int(7).unwrap();
        }
        assert_eq!(
            dir.list_all().unwrap(),
            vec!["a.doc".to_string(), "b.pos".to_string()]
        );
        assert_eq!(dir.file_length("a.doc").unwrap(), 4);
        assert!(dir.file_exists("b.pos").unwrap());

        let mut input = dir.open_input("b.pos", &IOContext::READ).unwrap();
        assert_eq!(input.read_vlong().unwrap(), 1 << 20);

        dir.delete_file("b.pos").unwrap();
        assert!(dir.open_input("b.pos", &IOContext::READ).is_err());
        assert!(dir.delete_file("b.pos").is_err());
    }

    #[test]
    fn test_output_checksum_matches_input_checksum() {
        let dir = RAMDirectory::new();
        let expected = {
            let mut out = dir.create_output("c", &IOContext::Default).unwrap();
            out.write_string("skip data").unwrap();
            out.write_vint(12345).unwrap();
            out.checksum().unwrap()
        };
        let mut input = dir.open_checksum_input("c", &IOContext::READ).unwrap();
        let len = input.len() as usize;
        input.skip_bytes(len).unwrap();
        assert_eq!(input.checksum(), expected);
    }
}
