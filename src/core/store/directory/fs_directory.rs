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

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use core::store::directory::Directory;
use core::store::io::{FSIndexOutput, IndexInput, MmapIndexInput};
use core::store::IOContext;
use error::ErrorKind::IllegalState;
use error::Result;

/// File system backed directory. Reads go through memory mapped inputs.
pub struct FSDirectory {
    pub directory: PathBuf,
}

impl FSDirectory {
    pub fn new<T: AsRef<Path> + ?Sized>(directory: &T) -> Result<FSDirectory> {
        let directory = directory.as_ref();
        if !Path::exists(directory) {
            fs::create_dir_all(directory)?;
        } else if !Path::is_dir(directory) {
            bail!(IllegalState(format!(
                "Path {:?} exists but is not directory",
                directory
            )))
        }

        Ok(FSDirectory {
            directory: From::from(directory),
        })
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

impl Directory for FSDirectory {
    type IndexOutput = FSIndexOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(filename) = entry.file_name().into_string() {
                result.push(filename);
            }
        }
        result.sort();
        Ok(result)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        let path = self.resolve(name);
        let meta = fs::metadata(&path)?;
        if meta.is_dir() {
            bail!(IllegalState(format!(
                "file_length should not be called for directory: {}",
                path.display()
            )))
        }
        Ok(meta.len() as i64)
    }

    fn create_output(&self, name: &str, _context: &IOContext) -> Result<Self::IndexOutput> {
        let path = self.resolve(name);
        debug!("create output {}", path.display());
        FSIndexOutput::new(name.to_string(), &path)
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let path = self.resolve(name);
        Ok(Box::new(MmapIndexInput::new(path)?))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name))?;
        Ok(())
    }
}

impl fmt::Display for FSDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FSDirectory({})", self.directory.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::{DataInput, DataOutput};
    use std::io::Write;
    use tempfile;

    #[test]
    fn test_create_list_open_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = FSDirectory::new(temp_dir.path()).unwrap();
        {
            let mut out = dir.create_output("_0.doc", &IOContext::Default).unwrap();
            out.write_vint(42).unwrap();
            out.flush().unwrap();
        }
        assert_eq!(dir.list_all().unwrap(), vec!["_0.doc".to_string()]);
        assert_eq!(dir.file_length("_0.doc").unwrap(), 1);

        let mut input = dir.open_input("_0.doc", &IOContext::READ).unwrap();
        assert_eq!(input.read_vint().unwrap(), 42);

        dir.delete_file("_0.doc").unwrap();
        assert!(dir.list_all().unwrap().is_empty());
        assert!(dir.open_input("_0.doc", &IOContext::READ).is_err());
    }
}
