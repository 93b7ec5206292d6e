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

/// Returns `x <= 0 ? 0 : floor(log(x) / log(base))`
pub fn log(mut x: i64, base: i32) -> i32 {
    debug_assert!(base > 1);

    let base = i64::from(base);
    let mut ret = 0;
    while x >= base {
        x /= base;
        ret += 1;
    }

    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log() {
        assert_eq!(log(0, 16), 0);
        assert_eq!(log(15, 16), 0);
        assert_eq!(log(16, 16), 1);
        assert_eq!(log(255, 16), 1);
        assert_eq!(log(256, 16), 2);
        assert_eq!(log(1 << 20, 2), 20);
    }
}
