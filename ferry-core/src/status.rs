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

/// Response envelope codes. Servers never raise across the wire, they
/// always answer with one of these plus a message.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum StatusCode {
    SUCCESS = 0,
    ACCESS_DENIED = 1,
    INTERNAL_ERROR = 2,
    TIMEOUT = 3,
    NO_REGISTER = 4,
    INVALID_REQUEST = 5,
    NO_BUFFER = 6,
    STATE_UNEXPECTED = 7,
}

impl StatusCode {
    pub fn from_i32(value: i32) -> StatusCode {
        match value {
            0 => StatusCode::SUCCESS,
            1 => StatusCode::ACCESS_DENIED,
            2 => StatusCode::INTERNAL_ERROR,
            3 => StatusCode::TIMEOUT,
            4 => StatusCode::NO_REGISTER,
            5 => StatusCode::INVALID_REQUEST,
            6 => StatusCode::NO_BUFFER,
            _ => StatusCode::STATE_UNEXPECTED,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == StatusCode::SUCCESS
    }
}

impl Into<i32> for StatusCode {
    fn into(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod test {
    use crate::status::StatusCode;

    #[test]
    fn roundtrip() {
        for code in [
            StatusCode::SUCCESS,
            StatusCode::ACCESS_DENIED,
            StatusCode::INTERNAL_ERROR,
            StatusCode::TIMEOUT,
            StatusCode::NO_REGISTER,
            StatusCode::INVALID_REQUEST,
            StatusCode::NO_BUFFER,
            StatusCode::STATE_UNEXPECTED,
        ] {
            let raw: i32 = code.into();
            assert_eq!(code, StatusCode::from_i32(raw));
        }
    }
}
