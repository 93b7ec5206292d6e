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

//! Postings codecs that keep document, frequency and position data in
//! separate integer streams ("Sep"), walk them through multi-level skip
//! lists, and optionally inline rare terms into the term dictionary
//! ("Pulsing").

#![recursion_limit = "1024"]
#![allow(clippy::cast_lossless)]
#![allow(clippy::new_without_default)]

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;

extern crate byteorder;
extern crate crc;
extern crate flate2;
extern crate memmap;

#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate tempfile;

pub mod core;
pub mod error;
