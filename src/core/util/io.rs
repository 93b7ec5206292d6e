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

use error::Result;

/// Runs every close action in order. The first failure is returned once all
/// actions ran, later failures are only logged.
pub fn close_all<I>(actions: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: FnOnce() -> Result<()>,
{
    let mut first_err = None;
    for action in actions {
        if let Err(e) = action() {
            if first_err.is_none() {
                first_err = Some(e);
            } else {
                warn!("suppressed error while closing: {:?}", e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error::ErrorKind::{IllegalArgument, IllegalState};
    use error::{Error, ErrorKind};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_close_all_keeps_first_error() {
        let ran = Rc::new(Cell::new(0));
        let (r1, r2, r3) = (Rc::clone(&ran), Rc::clone(&ran), Rc::clone(&ran));
        let mut actions: Vec<Box<dyn FnOnce() -> Result<()>>> = Vec::new();
        actions.push(Box::new(move || {
            r1.set(r1.get() + 1);
            Ok(())
        }));
        actions.push(Box::new(move || {
            r2.set(r2.get() + 1);
            Err(Error::from(IllegalState("first".into())))
        }));
        actions.push(Box::new(move || {
            r3.set(r3.get() + 1);
            Err(Error::from(IllegalArgument("second".into())))
        }));
        let res = close_all(actions);
        assert_eq!(ran.get(), 3);
        match res {
            Err(ref e) => match *e.kind() {
                ErrorKind::IllegalState(ref msg) => assert_eq!(msg, "first"),
                _ => panic!("expected the first error"),
            },
            Ok(()) => panic!("expected the first error"),
        }
    }

    #[test]
    fn test_close_all_ok() {
        let ok: fn() -> Result<()> = || Ok(());
        let actions = vec![ok, ok];
        assert!(close_all(actions).is_ok());
    }
}
