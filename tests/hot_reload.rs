//! Hot reload behaviour observed through the HTTP surface.

mod common;

use std::sync::Arc;

use common::{TestServer, TestWorkspace};
use serde_json::{json, Value};
use workspace_server::workspace::{HandlerName, ProjectName};

async fn get_json(server: &TestServer, path: &str) -> (u16, Value) {
    let res = reqwest::get(server.url(path)).await.unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_edit_is_picked_up_on_next_request() {
    let ws = TestWorkspace::new();
    let path = ws.write_handler("demo", "version", "fn get() { #{ version: 1 } }");
    let server = TestServer::start(ws.config()).await;

    let (status, body) = get_json(&server, "/demo/api/version").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "version": 1 }));

    ws.rewrite(&path, "fn get() { #{ version: 2 } }");

    let (_, body) = get_json(&server, "/demo/api/version").await;
    assert_eq!(body, json!({ "version": 2 }));
}

#[tokio::test]
async fn test_unchanged_handler_is_not_reloaded() {
    let ws = TestWorkspace::new();
    ws.write_handler("demo", "version", "fn get() { #{ version: 1 } }");
    let server = TestServer::start(ws.config()).await;
    let key = (
        ProjectName::parse("demo").unwrap(),
        HandlerName::parse("version").unwrap(),
    );

    get_json(&server, "/demo/api/version").await;
    let first = server.dispatcher.cache().peek(&key.0, &key.1).unwrap();
    get_json(&server, "/demo/api/version").await;
    let second = server.dispatcher.cache().peek(&key.0, &key.1).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.invocations(), 2);
}

#[tokio::test]
async fn test_syntax_error_recovers_after_fix() {
    let ws = TestWorkspace::new();
    let path = ws.write_handler("demo", "flaky", "fn get() { #{ ok: true } }");
    let server = TestServer::start(ws.config()).await;

    let (status, _) = get_json(&server, "/demo/api/flaky").await;
    assert_eq!(status, 200);

    ws.rewrite(&path, "fn get( { oops");
    let (status, body) = get_json(&server, "/demo/api/flaky").await;
    assert_eq!(status, 500);
    assert!(body["error"].is_string());

    ws.rewrite(&path, "fn get() { #{ ok: \"again\" } }");
    let (status, body) = get_json(&server, "/demo/api/flaky").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "ok": "again" }));
}

#[tokio::test]
async fn test_new_handler_becomes_live_without_restart() {
    let ws = TestWorkspace::new();
    ws.write_handler("demo", "first", "fn get() { 1 }");
    let server = TestServer::start(ws.config()).await;

    let (status, _) = get_json(&server, "/demo/api/second").await;
    assert_eq!(status, 404);

    ws.write_handler("demo", "second", "fn get() { #{ n: 2 } }");
    let (status, body) = get_json(&server, "/demo/api/second").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "n": 2 }));
}

#[tokio::test]
async fn test_config_update_switches_workspace() {
    let a = TestWorkspace::new();
    a.write_handler("demo", "which", "fn get() { \"a\" }");
    let b = TestWorkspace::new();
    b.write_handler("demo", "which", "fn get() { \"b\" }");

    let server = TestServer::start(a.config()).await;
    let text = reqwest::get(server.url("/demo/api/which")).await.unwrap().text().await.unwrap();
    assert_eq!(text, "a");

    server.config_tx.send(b.config()).unwrap();

    let mut observed = String::new();
    for _ in 0..50 {
        observed = reqwest::get(server.url("/demo/api/which")).await.unwrap().text().await.unwrap();
        if observed == "b" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(observed, "b");
}
