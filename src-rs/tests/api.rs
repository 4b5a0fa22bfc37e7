use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use job_agent_rs::agent::Agent;
use job_agent_rs::api::{router, AppState};
use job_agent_rs::config::AgentConfig;
use job_agent_rs::llm::MockProvider;
use job_agent_rs::store::{MemoryProfileStore, MemoryStore, StaticResume};
use job_agent_rs::tools::{build_registry, Dispatcher};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn spawn_app(provider: Arc<MockProvider>) -> String {
    let agent = Agent::new(
        provider,
        Dispatcher::new(Arc::new(build_registry().unwrap())),
        AgentConfig {
            provider: "mock".to_string(),
            ..AgentConfig::default()
        },
    );
    let state = AppState::new(
        Arc::new(agent),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryProfileStore::default()),
        Arc::new(StaticResume(None)),
    );
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = axum::Server::bind(&addr).serve(router(state).into_make_service());
    let url = format!("http://{}", server.local_addr());
    tokio::spawn(server);
    url
}

#[tokio::test]
async fn health_and_tool_catalog() {
    let base = spawn_app(Arc::new(MockProvider::new())).await;
    let client = reqwest::Client::new();

    let health: Value = client.get(format!("{}/health", base)).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");

    let tools: Value = client.get(format!("{}/api/tools", base)).send().await.unwrap().json().await.unwrap();
    let names: Vec<&str> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 17);
    assert!(names.contains(&"job_search"));
}

#[tokio::test]
async fn chat_streams_events_and_records_history() {
    let provider = Arc::new(MockProvider::new());
    provider.push_text("Here are a few ideas.");
    let base = spawn_app(provider).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "Find remote Rust roles"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("event:conversation"));
    assert!(body.contains(r#"{"conversation_id":1}"#));
    assert!(body.contains(r#""type":"text""#));
    assert!(body.contains(r#"{"type":"done","content":"Here are a few ideas."}"#));

    let mut saved = 0;
    for _ in 0..20 {
        let convo: Value = client
            .get(format!("{}/api/conversations/1", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        saved = convo["conversation"]["messages"].as_array().map_or(0, Vec::len);
        if saved == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(saved, 2);
}

#[tokio::test]
async fn chat_rejects_blank_and_unknown_conversations() {
    let base = spawn_app(Arc::new(MockProvider::new())).await;
    let client = reqwest::Client::new();

    let blank = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let missing = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "hi", "conversation_id": 42}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn jobs_crud_over_http() {
    let base = spawn_app(Arc::new(MockProvider::new())).await;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/api/jobs", base))
        .json(&json!({"company": "Acme", "title": "Rust Engineer", "job_fit": 4}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Value = created.json().await.unwrap();
    let id = created["job"]["id"].as_i64().unwrap();
    assert_eq!(created["job"]["status"], "saved");

    let listed: Value = client
        .get(format!("{}/api/jobs?status=saved", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);

    let bad_status = client.get(format!("{}/api/jobs?status=ghosted", base)).send().await.unwrap();
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

    let empty_patch = client
        .patch(format!("{}/api/jobs/{}", base, id))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_patch.status(), StatusCode::BAD_REQUEST);

    let patched: Value = client
        .patch(format!("{}/api/jobs/{}", base, id))
        .json(&json!({"status": "applied"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(patched["job"]["status"], "applied");

    let deleted: Value = client
        .delete(format!("{}/api/jobs/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], id);

    let gone = client.get(format!("{}/api/jobs/{}", base, id)).send().await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let results: Value = client
        .get(format!("{}/api/conversations/1/search-results", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results["count"], 0);
}
