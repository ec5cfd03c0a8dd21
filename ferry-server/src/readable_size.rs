// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;
use std::str::FromStr;

pub const UNIT: u64 = 1;
const BINARY_DATA_MAGNITUDE: u64 = 1024;
pub const B: u64 = UNIT;
pub const KIB: u64 = B * BINARY_DATA_MAGNITUDE;
pub const MIB: u64 = KIB * BINARY_DATA_MAGNITUDE;
pub const GIB: u64 = MIB * BINARY_DATA_MAGNITUDE;
pub const TIB: u64 = GIB * BINARY_DATA_MAGNITUDE;

/// A byte size configured as "512", "1M", "20G" and friends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    pub fn kb(count: u64) -> ReadableSize {
        ReadableSize(count * KIB)
    }

    pub fn mb(count: u64) -> ReadableSize {
        ReadableSize(count * MIB)
    }

    pub fn gb(count: u64) -> ReadableSize {
        ReadableSize(count * GIB)
    }

    pub fn as_bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for ReadableSize {
    type Err = String;

    fn from_str(s: &str) -> Result<ReadableSize, String> {
        let size_str = s.trim();
        if size_str.is_empty() {
            return Err(format!("{:?} is not a valid size.", s));
        }

        if !size_str.is_ascii() {
            return Err(format!("ASCII string is expected, but got {:?}", s));
        }

        // locate the unit boundary
        let (size, unit) = match size_str.rfind(|c: char| c.is_ascii_digit()) {
            Some(number_idx) => {
                let (size, unit) = size_str.split_at(number_idx + 1);
                (size.trim(), unit.trim().to_uppercase())
            }
            _ => return Err(format!("{:?} is not a valid size.", s)),
        };

        let unit = match unit.as_str() {
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => MIB,
            "G" | "GB" | "GIB" => GIB,
            "T" | "TB" | "TIB" => TIB,
            "B" | "" => B,
            _ => {
                return Err(format!(
                    "only B, KB, KiB, MB, MiB, GB, GiB, TB and TiB are supported: {:?}",
                    s
                ));
            }
        };

        match size.parse::<f64>() {
            Ok(size) => Ok(ReadableSize((size * unit as f64) as u64)),
            Err(_) => Err(format!("invalid size string: {:?}", s)),
        }
    }
}

impl fmt::Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.0;
        if size == 0 {
            write!(f, "{}KiB", size)
        } else if size % TIB == 0 {
            write!(f, "{}TiB", size / TIB)
        } else if size % GIB == 0 {
            write!(f, "{}GiB", size / GIB)
        } else if size % MIB == 0 {
            write!(f, "{}MiB", size / MIB)
        } else if size % KIB == 0 {
            write!(f, "{}KiB", size / KIB)
        } else {
            write!(f, "{}B", size)
        }
    }
}

#[cfg(test)]
mod test {
    use crate::readable_size::{ReadableSize, GIB, KIB, MIB};
    use std::str::FromStr;

    #[test]
    fn parse_test() {
        assert_eq!(2000, ReadableSize::from_str("2000").unwrap().as_bytes());
        assert_eq!(KIB, ReadableSize::from_str("1K").unwrap().as_bytes());
        assert_eq!(MIB, ReadableSize::from_str("1M").unwrap().as_bytes());
        assert_eq!(GIB, ReadableSize::from_str("1g").unwrap().as_bytes());
        assert_eq!(
            (1.5 * MIB as f64) as u64,
            ReadableSize::from_str("1.5MB").unwrap().as_bytes()
        );
        assert!(ReadableSize::from_str("").is_err());
        assert!(ReadableSize::from_str("1P").is_err());
    }
}
