use async_trait::async_trait;
use axum::body::{ to_bytes, Body };
use axum::http::{ header, Request, StatusCode };
use fin_advisor::advisor::Advisor;
use fin_advisor::config::prompt::PromptConfig;
use fin_advisor::llm::chat::ChatClient;
use fin_advisor::llm::LlmError;
use fin_advisor::models::chat::{ ConversationMessage, Role };
use fin_advisor::server::api::router;
use serde_json::{ json, Value };
use std::sync::{ Arc, Mutex };
use tower::ServiceExt;

enum Reply {
    Text(&'static str),
    Unreachable,
}

struct ScriptedClient {
    reply: Reply,
    calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedClient {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self { reply, calls: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Unreachable =>
                Err(LlmError::Status { status: 502, body: "connection refused".into() }),
        }
    }

    fn get_model(&self) -> String {
        "scripted".into()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

fn app(client: Arc<ScriptedClient>) -> axum::Router {
    router(Arc::new(Advisor::new(client, Arc::new(PromptConfig::default()))))
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

const REASONING_REPLY: &str =
    "<think>\nIncome 5000, rent 1500, that's 30%.\n\nLet me think about savings.\n</think>\n\n\n\n\
1. Set up an automatic $500 monthly transfer to savings.\n\
2. Cap dining out at $200 per month.\n\
<reasoning>double-check the count</reasoning>";

#[tokio::test]
async fn get_advice_returns_sanitized_advice() {
    let client = ScriptedClient::new(Reply::Text(REASONING_REPLY));
    let (status, body) = post_json(
        app(client.clone()),
        "/get-advice",
        json!({ "spending_data": "Income: $5000, Rent: $1500" })
    ).await;

    assert_eq!(status, StatusCode::OK);
    let advice = body["advice"].as_str().expect("advice string");
    assert!(!advice.contains("<think>"));
    assert!(!advice.contains("<reasoning>"));
    assert_eq!(
        advice,
        "1. Set up an automatic $500 monthly transfer to savings.\n2. Cap dining out at $200 per month."
    );

    let calls = client.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0].role, Role::System);
    assert_eq!(calls[0][1].role, Role::User);
    assert!(calls[0][1].content.contains("Income: $5000, Rent: $1500"));
}

#[tokio::test]
async fn get_advice_model_failure_is_a_server_error() {
    let (status, body) = post_json(
        app(ScriptedClient::new(Reply::Unreachable)),
        "/get-advice",
        json!({ "spending_data": "Income: $5000" })
    ).await;

    assert!(status.is_server_error());
    assert_eq!(body["error"], "Internal Server Error");
    assert!(body.get("advice").is_none());
}

#[tokio::test]
async fn analyze_returns_unsanitized_reply() {
    let client = ScriptedClient::new(Reply::Text("<think>hmm</think>Dining is 12% of spend."));
    let (status, body) = post_json(
        app(client.clone()),
        "/analyze",
        json!({ "query": "How much goes to dining?", "data_context": "{\"dining\": 600}" })
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "<think>hmm</think>Dining is 12% of spend.");

    let calls = client.calls.lock().unwrap();
    assert!(calls[0][0].content.contains("financial analyst"));
    assert!(calls[0][1].content.contains("{\"dining\": 600}"));
    assert!(calls[0][1].content.contains("How much goes to dining?"));
}

#[tokio::test]
async fn analyze_model_failure_is_reported_inside_a_200() {
    let (status, body) = post_json(
        app(ScriptedClient::new(Reply::Unreachable)),
        "/analyze",
        json!({ "query": "q", "data_context": "{}" })
    ).await;

    assert_eq!(status, StatusCode::OK);
    let response = body["response"].as_str().expect("response string");
    assert!(response.starts_with("Error:"));
    assert!(response.contains("connection refused"));
}

#[tokio::test]
async fn missing_fields_are_rejected_before_the_model_is_called() {
    let client = ScriptedClient::new(Reply::Text("unused"));

    let cases = [
        ("/get-advice", json!({})),
        ("/get-advice", json!({ "spending": "typo" })),
        ("/analyze", json!({ "query": "only a query" })),
        ("/analyze", json!({ "data_context": "{}" })),
    ];
    for (uri, body) in cases {
        let (status, _) = post_json(app(client.clone()), uri, body.clone()).await;
        assert!(status.is_client_error(), "{} {} gave {}", uri, body, status);
    }

    assert!(client.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_json_body_is_a_client_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/get-advice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("spending_data=lots"))
        .unwrap();
    let response = app(ScriptedClient::new(Reply::Text("unused"))).oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn health_reports_model_name() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(ScriptedClient::new(Reply::Text(""))).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok", "model": "scripted" }));
}
