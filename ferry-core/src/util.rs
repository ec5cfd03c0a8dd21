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

use bytes::Bytes;
use crc32fast::Hasher;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

const FERRY_IP: &str = "FERRY_IP";

pub fn get_local_ip() -> Result<IpAddr, std::io::Error> {
    match std::env::var(FERRY_IP) {
        Ok(ip) => Ok(ip.parse().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "illegal FERRY_IP")
        })?),
        _ => {
            let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
            socket.connect("8.8.8.8:80")?;
            let local_addr = socket.local_addr()?;
            Ok(local_addr.ip())
        }
    }
}

const LENGTH_PER_CRC: usize = 4 * 1024;

/// Strided crc over 4K chunks, compatible with the engine-side checksum.
pub fn get_crc(bytes: &Bytes) -> i64 {
    let mut crc32 = Hasher::new();
    let length = bytes.len();

    for i in (0..length).step_by(LENGTH_PER_CRC) {
        let len = std::cmp::min(LENGTH_PER_CRC, length - i);
        crc32.update(&bytes[i..(i + len)]);
    }

    crc32.finalize() as i64
}

pub fn now_timestamp_as_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

pub fn now_timestamp_as_sec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[cfg(test)]
mod test {
    use crate::util::get_crc;
    use bytes::Bytes;

    #[test]
    fn crc_test() {
        let data = Bytes::from("hello world! hello china!");
        let crc_value = get_crc(&data);
        // This value is the same with the engine side implementation
        assert_eq!(3871485936, crc_value);
    }
}
