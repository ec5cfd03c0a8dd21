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

use super::{AccessCheckResult, AccessInfo};
use anyhow::Result;
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Admits an app iff its access id is listed in the allow-list file.
/// Lines are whitespace-trimmed, empty lines ignored. The file is
/// re-read periodically so that the list can be edited in place.
pub struct AccessCandidatesChecker {
    path: String,
    candidates: Arc<RwLock<HashSet<String>>>,
}

impl AccessCandidatesChecker {
    pub fn new(path: &str, update_interval_sec: u64) -> Result<Self> {
        let candidates = Arc::new(RwLock::new(Self::load(path)?));

        if update_interval_sec > 0 {
            let path_cloned = path.to_string();
            let candidates_cloned = candidates.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(update_interval_sec)).await;
                    match AccessCandidatesChecker::load(&path_cloned) {
                        Ok(loaded) => {
                            *candidates_cloned.write() = loaded;
                        }
                        Err(e) => {
                            // keep the previous list on a broken read
                            warn!(
                                "Errors on reloading access candidates from {}. err: {}",
                                &path_cloned, e
                            );
                        }
                    }
                }
            });
        }

        Ok(Self {
            path: path.to_string(),
            candidates,
        })
    }

    fn load(path: &str) -> Result<HashSet<String>> {
        let content = std::fs::read_to_string(path)?;
        let candidates: HashSet<String> = content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        info!(
            "Loaded {} access candidates from {}",
            candidates.len(),
            path
        );
        Ok(candidates)
    }

    /// Re-read the allow-list immediately.
    pub fn reload(&self) -> Result<()> {
        *self.candidates.write() = Self::load(&self.path)?;
        Ok(())
    }

    pub fn check(&self, access_info: &AccessInfo) -> AccessCheckResult {
        if self.candidates.read().contains(&access_info.access_id) {
            AccessCheckResult::Allowed
        } else {
            AccessCheckResult::Denied(format!(
                "accessId[{}] is not in the candidates list",
                &access_info.access_id
            ))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn lines_are_trimmed_and_blank_lines_skipped() {
        let temp_dir = tempdir::TempDir::new("candidates_checker_test").unwrap();
        let file_path = temp_dir.path().join("candidates");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"9527\n 135 \n\n2\n").unwrap();

        let checker = AccessCandidatesChecker::new(file_path.to_str().unwrap(), 0).unwrap();

        for allowed in ["9527", "135", "2"] {
            assert_eq!(
                AccessCheckResult::Allowed,
                checker.check(&AccessInfo {
                    access_id: allowed.to_string(),
                    tags: vec![],
                })
            );
        }
        match checker.check(&AccessInfo {
            access_id: "111111".to_string(),
            tags: vec![],
        }) {
            AccessCheckResult::Denied(_) => {}
            _ => panic!(),
        }
    }

    #[tokio::test]
    async fn reload_picks_up_new_entries() {
        let temp_dir = tempdir::TempDir::new("candidates_reload_test").unwrap();
        let file_path = temp_dir.path().join("candidates");
        std::fs::write(&file_path, "1\n").unwrap();

        let checker = AccessCandidatesChecker::new(file_path.to_str().unwrap(), 0).unwrap();
        match checker.check(&AccessInfo {
            access_id: "42".to_string(),
            tags: vec![],
        }) {
            AccessCheckResult::Denied(_) => {}
            _ => panic!(),
        }

        std::fs::write(&file_path, "1\n42\n").unwrap();
        checker.reload().unwrap();
        assert_eq!(
            AccessCheckResult::Allowed,
            checker.check(&AccessInfo {
                access_id: "42".to_string(),
                tags: vec![],
            })
        );
    }
}
