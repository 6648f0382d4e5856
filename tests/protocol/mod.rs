//! Request/response behavior over a live WebSocket connection

use std::io::Cursor;

use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use crate::common::{spawn_server, TestDir, WsClient};
use dirshare::socket_server::OriginPolicy;

/// Depth-first search for a directory node by name
fn find_dir<'a>(node: &'a Value, name: &str) -> Option<&'a Value> {
    if node["name"] == name {
        return Some(node);
    }
    node["tree"]
        .as_array()?
        .iter()
        .find_map(|child| find_dir(child, name))
}

fn blob<'a>(dir: &'a Value, name: &str) -> &'a Value {
    dir["blobs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["name"] == name)
        .unwrap_or_else(|| panic!("no blob named {}", name))
}

fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_list_files_returns_annotated_tree() {
    let dir = TestDir::contracts_project();
    dir.add_file("notes.md", "# notes");
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_json(&json!({"action": "listFiles"})).await;
    let msg = client.recv_json().await;

    assert_eq!(msg["type"], "folderStructure");
    let wrapper = &msg["tree"];
    assert_eq!(wrapper["path"], "");
    assert_eq!(wrapper["tree"].as_array().unwrap().len(), 1);

    let root = &wrapper["tree"][0];
    assert_eq!(root["name"], "project");
    assert_eq!(root["path"], "project/");
    // hello.sol checked, notes.md not: partial
    assert_eq!(root["checked"], false);
    assert_eq!(root["isChildCheck"], true);

    let hello = blob(root, "hello.sol");
    assert_eq!(hello["path"], "project/hello.sol");
    assert_eq!(hello["checked"], true);
    assert_eq!(hello["size"], "contract Hello {}".len());
    assert!(hello["mtimeMs"].as_f64().unwrap() > 0.0);
    assert_eq!(blob(root, "notes.md")["checked"], false);

    let contracts = find_dir(root, "contracts").unwrap();
    assert_eq!(contracts["path"], "project/contracts/");
    assert_eq!(contracts["checked"], true);
    assert_eq!(contracts["isChildCheck"], true);
    assert_eq!(
        blob(contracts, "MyToken.sol")["path"],
        "project/contracts/MyToken.sol"
    );

    let libs = find_dir(root, "libs").unwrap();
    assert_eq!(libs["path"], "project/contracts/libs/");
    assert_eq!(blob(libs, "Utils.sol")["checked"], true);

    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn test_list_files_skips_node_modules() {
    let dir = TestDir::contracts_project();
    dir.add_file("node_modules/dep/index.sol", "contract Dep {}");
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_json(&json!({"action": "listFiles"})).await;
    let msg = client.recv_json().await;

    assert!(find_dir(&msg["tree"], "node_modules").is_none());
    assert!(!msg.to_string().contains("index.sol"));

    server.close().await;
}

#[tokio::test]
async fn test_listing_reflects_filesystem_changes() {
    let dir = TestDir::new("live");
    dir.add_file("a.sol", "a");
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_json(&json!({"action": "listFiles"})).await;
    let first = client.recv_json().await;
    assert_eq!(first["tree"][0]["blobs"].as_array().unwrap().len(), 1);

    dir.add_file("b.sol", "b");
    client.send_json(&json!({"action": "listFiles"})).await;
    let second = client.recv_json().await;
    assert_eq!(second["tree"][0]["blobs"].as_array().unwrap().len(), 2);

    server.close().await;
}

#[tokio::test]
async fn test_empty_directory_listing() {
    let dir = TestDir::new("empty");
    dir.add_dir("nested");
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_json(&json!({"action": "listFiles"})).await;
    let msg = client.recv_json().await;

    let root = &msg["tree"][0];
    assert_eq!(root["checked"], false);
    assert_eq!(root["isChildCheck"], false);
    let nested = find_dir(root, "nested").unwrap();
    assert_eq!(nested["blobs"], json!([]));
    assert_eq!(nested["tree"], json!([]));

    server.close().await;
}

#[tokio::test]
async fn test_nested_selection_leaves_parent_unchecked() {
    let dir = TestDir::new("project");
    dir.add_file("a/b/X.sol", "contract X {}");
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_json(&json!({"action": "listFiles"})).await;
    let msg = client.recv_json().await;

    let a = find_dir(&msg["tree"], "a").unwrap();
    assert_eq!(a["path"], "project/a/");
    assert_eq!(a["checked"], false);
    assert_eq!(a["isChildCheck"], false);

    let b = find_dir(a, "b").unwrap();
    assert_eq!(b["path"], "project/a/b/");
    assert_eq!(b["checked"], true);
    assert_eq!(b["isChildCheck"], true);
    assert_eq!(blob(b, "X.sol")["checked"], true);

    server.close().await;
}

#[tokio::test]
async fn test_zip_excludes_skipped_paths() {
    let dir = TestDir::contracts_project();
    let (server, sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    let messages = client
        .zip(json!({
            "presigned_url": "memory://bucket/upload.zip?X-Amz-Signature=abc",
            "skip_file_paths": ["contracts/ignore.sol"]
        }))
        .await;

    assert_eq!(messages, vec![json!({"type": "uploadStatus", "success": true})]);

    let uploads = sink.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, "memory://bucket/upload.zip?X-Amz-Signature=abc");
    assert_eq!(
        zip_entry_names(&uploads[0].0),
        vec!["contracts/MyToken.sol", "contracts/libs/Utils.sol", "hello.sol"]
    );

    server.close().await;
}

#[tokio::test]
async fn test_zip_preserves_file_contents() {
    let dir = TestDir::new("data");
    dir.add_file("src/lib.sol", "pragma solidity ^0.8.0;\ncontract Lib {}\n");
    let (server, sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    let messages = client.zip(json!({"presigned_url": "memory://x"})).await;
    assert_eq!(messages.last().unwrap()["success"], true);

    let uploads = sink.uploads();
    let mut archive = zip::ZipArchive::new(Cursor::new(uploads[0].0.clone())).unwrap();
    let mut entry = archive.by_name("src/lib.sol").unwrap();
    let mut content = String::new();
    std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
    assert_eq!(content, "pragma solidity ^0.8.0;\ncontract Lib {}\n");

    server.close().await;
}

#[tokio::test]
async fn test_zip_unmatched_skip_paths_are_ignored() {
    let dir = TestDir::contracts_project();
    let (server, sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    let messages = client
        .zip(json!({
            "presigned_url": "memory://x",
            "skip_file_paths": ["does/not/exist.sol", "project/hello.sol"]
        }))
        .await;
    assert_eq!(messages.last().unwrap()["success"], true);

    // Root-name-prefixed paths do not match archive entries
    let names = zip_entry_names(&sink.uploads()[0].0);
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"hello.sol".to_string()));

    server.close().await;
}

#[tokio::test]
async fn test_zip_rejected_upload_reports_failure() {
    let dir = TestDir::contracts_project();
    let (server, sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    let messages = client
        .zip(json!({"presigned_url": "https://bucket.example/reject"}))
        .await;

    assert_eq!(messages, vec![json!({"type": "uploadStatus", "success": false})]);
    assert!(sink.uploads().is_empty());

    server.close().await;
}

#[tokio::test]
async fn test_zip_without_presigned_url() {
    let dir = TestDir::contracts_project();
    let (server, sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client
        .send_json(&json!({"action": "zipAndSendFiles", "payload": {"skip_file_paths": []}}))
        .await;
    assert_eq!(
        client.recv_json().await,
        json!({"type": "error", "error": "presigned_url missing"})
    );

    client
        .send_json(&json!({"action": "zipAndSendFiles", "payload": {"presigned_url": ""}}))
        .await;
    assert_eq!(client.recv_json().await["error"], "presigned_url missing");

    client.send_json(&json!({"action": "zipAndSendFiles"})).await;
    assert_eq!(client.recv_json().await["error"], "presigned_url missing");

    // Malformed optional fields do not mask the missing URL
    client
        .send_json(&json!({"action": "zipAndSendFiles", "payload": {"skip_file_paths": "a.sol"}}))
        .await;
    assert_eq!(client.recv_json().await["error"], "presigned_url missing");

    client
        .send_json(&json!({"action": "zipAndSendFiles", "payload": "x"}))
        .await;
    assert_eq!(client.recv_json().await["error"], "presigned_url missing");

    assert!(sink.uploads().is_empty());
    server.close().await;
}

#[tokio::test]
async fn test_bad_messages_keep_connection_open() {
    let dir = TestDir::contracts_project();
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;

    client.send_text("this is not json").await;
    assert_eq!(
        client.recv_json().await,
        json!({"type": "error", "error": "Invalid JSON message"})
    );

    client.send_json(&json!({"action": "deleteEverything"})).await;
    assert_eq!(
        client.recv_json().await,
        json!({"type": "error", "error": "Unknown action"})
    );

    client.send_json(&json!({"payload": {}})).await;
    assert_eq!(client.recv_json().await["error"], "Unknown action");

    client.send_json(&json!({"action": "listFiles"})).await;
    assert_eq!(client.recv_json().await["type"], "folderStructure");

    server.close().await;
}

#[tokio::test]
async fn test_requests_answered_in_order() {
    let dir = TestDir::contracts_project();
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_json(&json!({"action": "listFiles"})).await;
    client.send_text("{").await;
    client
        .send_json(&json!({"action": "zipAndSendFiles", "payload": {"presigned_url": "memory://a"}}))
        .await;
    client.send_json(&json!({"action": "nope"})).await;

    assert_eq!(client.recv_json().await["type"], "folderStructure");
    assert_eq!(client.recv_json().await["error"], "Invalid JSON message");
    assert_eq!(client.recv_json().await["type"], "uploadStatus");
    assert_eq!(client.recv_json().await["error"], "Unknown action");

    server.close().await;
}

#[tokio::test]
async fn test_clients_are_independent() {
    let dir = TestDir::contracts_project();
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut first = WsClient::connect(server.local_addr()).await;
    let mut second = WsClient::connect(server.local_addr()).await;

    first.send_text("garbage").await;
    second.send_json(&json!({"action": "listFiles"})).await;

    assert_eq!(second.recv_json().await["type"], "folderStructure");
    assert_eq!(first.recv_json().await["type"], "error");

    first.close().await;
    second.send_json(&json!({"action": "listFiles"})).await;
    assert_eq!(second.recv_json().await["type"], "folderStructure");

    server.close().await;
}

#[tokio::test]
async fn test_ping_gets_exactly_one_pong() {
    let dir = TestDir::contracts_project();
    let (server, _sink) = spawn_server(dir.path(), OriginPolicy::AllowAll).await;

    let mut client = WsClient::connect(server.local_addr()).await;
    client.send_ping(b"heartbeat").await;
    client.send_json(&json!({"action": "listFiles"})).await;

    let mut pongs = Vec::new();
    loop {
        match client.recv_frame().await {
            Message::Pong(data) => pongs.push(data),
            Message::Text(text) => {
                let msg: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(msg["type"], "folderStructure");
                break;
            }
            _ => {}
        }
    }
    assert_eq!(pongs, vec![b"heartbeat".to_vec()]);

    // A second request confirms no stray Pong was queued behind the first
    client.send_json(&json!({"action": "unknown"})).await;
    match client.recv_frame().await {
        Message::Text(text) => assert!(text.contains("Unknown action")),
        other => panic!("Expected the error response, got {:?}", other),
    }

    server.close().await;
}
