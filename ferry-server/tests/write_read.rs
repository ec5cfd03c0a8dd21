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
use ferry_client::config::ClientConfigBuilder;
use ferry_client::write_client::{ShuffleBlockInfo, ShuffleWriteClient};
use ferry_core::common::{PartitionRange, RemoteStorageInfo, ShuffleBlock, ShuffleServerInfo};
use ferry_core::id_layout::DEFAULT_BLOCK_ID_LAYOUT;
use ferry_core::util::get_crc;
use ferry_server::config::Config;
use ferry_server::start_ferry_server;
use std::collections::HashMap;
use std::time::Duration;

fn block_payload(partition_id: i32, seq: i64) -> Bytes {
    Bytes::from(format!("partition-{}-block-{}-payload", partition_id, seq))
}

fn build_block(partition_id: i32, seq: i64, servers: &[ShuffleServerInfo]) -> ShuffleBlockInfo {
    let data = block_payload(partition_id, seq);
    let block_id = DEFAULT_BLOCK_ID_LAYOUT.get_block_id(seq, partition_id as i64, 0);
    ShuffleBlockInfo {
        shuffle_id: 0,
        partition_id,
        block: ShuffleBlock {
            block_id,
            length: data.len() as i32,
            uncompress_length: data.len() as i32,
            crc: get_crc(&data),
            task_attempt_id: 0,
            data,
        },
        shuffle_servers: servers.to_vec(),
    }
}

#[tokio::test]
async fn write_read_for_one_time() -> anyhow::Result<()> {
    let rpc_port = 21101;
    let temp_dir = tempdir::TempDir::new("write_read_test").unwrap();
    let temp_path = temp_dir.path().to_str().unwrap().to_string();

    let config = Config::create_mem_localfile_config(rpc_port, "32M".to_string(), temp_path);
    let _app_manager_ref = start_ferry_server(config).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let app_id = "write_read_test-app-id".to_string();
    let server = ShuffleServerInfo::new("server-1", "127.0.0.1", rpc_port as u16);
    let servers = vec![server.clone()];

    let client_config = ClientConfigBuilder::default()
        .replica(1)
        .replica_write(1)
        .replica_read(1)
        .build();
    let client = ShuffleWriteClient::new(client_config);

    // 1. register the shuffle on the assigned server
    client
        .register_shuffle(
            &server,
            &app_id,
            0,
            vec![PartitionRange::new(0, 2)],
            RemoteStorageInfo::default(),
        )
        .await?;

    // 2. map side: send blocks of two partitions
    let partition_num = 2;
    let blocks_per_partition = 3;
    let mut blocks = vec![];
    let mut partition_to_block_ids: HashMap<i32, Vec<i64>> = HashMap::new();
    for partition_id in 0..partition_num {
        for seq in 0..blocks_per_partition {
            let block = build_block(partition_id, seq, &servers);
            partition_to_block_ids
                .entry(partition_id)
                .or_default()
                .push(block.block.block_id);
            blocks.push(block);
        }
    }

    let send_result = client.send_shuffle_data(&app_id, blocks).await;
    assert_eq!(
        (partition_num * blocks_per_partition as i32) as usize,
        send_result.success_block_ids.len()
    );
    assert!(send_result.failed_block_ids.is_empty());

    // 3. report the finished block ids, with the write quorum check
    let partition_to_servers: HashMap<i32, Vec<ShuffleServerInfo>> = (0..partition_num)
        .map(|partition_id| (partition_id, servers.clone()))
        .collect();
    client
        .report_shuffle_result(&partition_to_servers, &app_id, 0, 0, &partition_to_block_ids, 1)
        .await?;

    // 4. the single map task commits, which also finishes the shuffle
    assert!(client.send_commit(&servers, &app_id, 0, 1).await);

    // 5. writes after finishShuffle are rejected
    let late_block = build_block(0, 100, &servers);
    let late_result = client.send_shuffle_data(&app_id, vec![late_block]).await;
    assert_eq!(1, late_result.failed_block_ids.len());

    // 6. reduce side: reconstruct both partitions
    for partition_id in 0..partition_num {
        let bitmap = client
            .get_shuffle_result(&servers, &app_id, 0, partition_id)
            .await?;
        assert_eq!(blocks_per_partition as u64, bitmap.cardinality());

        let collected = client
            .read_partition_blocks(&servers, &app_id, 0, partition_id, &bitmap)
            .await?;
        assert_eq!(blocks_per_partition as usize, collected.len());

        for seq in 0..blocks_per_partition {
            let block_id = DEFAULT_BLOCK_ID_LAYOUT.get_block_id(seq, partition_id as i64, 0);
            let expected = block_payload(partition_id, seq);
            assert_eq!(Some(&expected), collected.get(&block_id));
        }
    }

    // 7. the app heartbeat fan-out completes within its deadline
    client.send_app_heartbeat(&app_id, 2000).await;

    Ok(())
}

#[tokio::test]
async fn unregister_shuffle_purges_state() -> anyhow::Result<()> {
    let rpc_port = 21103;
    let temp_dir = tempdir::TempDir::new("unregister_test").unwrap();
    let temp_path = temp_dir.path().to_str().unwrap().to_string();

    let config = Config::create_mem_localfile_config(rpc_port, "32M".to_string(), temp_path);
    let app_manager_ref = start_ferry_server(config).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let app_id = "unregister_test-app-id".to_string();
    let server = ShuffleServerInfo::new("server-1", "127.0.0.1", rpc_port as u16);
    let servers = vec![server.clone()];

    let client = ShuffleWriteClient::new(ClientConfigBuilder::default().build());
    client
        .register_shuffle(
            &server,
            &app_id,
            0,
            vec![PartitionRange::new(0, 1)],
            RemoteStorageInfo::default(),
        )
        .await?;

    let send_result = client
        .send_shuffle_data(&app_id, vec![build_block(0, 0, &servers)])
        .await;
    assert_eq!(1, send_result.success_block_ids.len());

    client.unregister_shuffle(&server, &app_id, None).await?;

    // the purge is asynchronous, the app state disappears eventually
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if !app_manager_ref.app_is_exist(&app_id) {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("the app state was not purged in time");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}
