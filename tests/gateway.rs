//! End-to-end protocol tests: the full warp route tree driven through
//! `warp::test`, with stub upstream clients standing in for the hub and
//! the sequencer.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use warp::filters::BoxedFilter;
use warp::Reply;

use snapshot_gateway::client::{
    GovernanceActions, GovernanceData, Page, ProposalDraft, ProposalFilter,
    SpaceFilter,
};
use snapshot_gateway::config::GatewayConfig;
use snapshot_gateway::context::GatewayContext;
use snapshot_gateway::handler;

/// Records every data call it receives and replays canned payloads.
#[derive(Default)]
struct StubData {
    calls: Mutex<Vec<(String, Value)>>,
}

impl StubData {
    async fn record(&self, method: &str, details: Value) {
        self.calls.lock().await.push((method.to_string(), details));
    }

    async fn recorded(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl GovernanceData for StubData {
    async fn space(&self, id: &str) -> snapshot_gateway::Result<Value> {
        self.record("space", json!({ "id": id })).await;
        Ok(json!({ "space": { "id": "example.eth", "name": "Example" } }))
    }

    async fn spaces(
        &self,
        filter: SpaceFilter,
    ) -> snapshot_gateway::Result<Value> {
        self.record(
            "spaces",
            json!({ "first": filter.page.first, "skip": filter.page.skip }),
        )
        .await;
        Ok(json!({ "spaces": [] }))
    }

    async fn proposal(&self, id: &str) -> snapshot_gateway::Result<Value> {
        self.record("proposal", json!({ "id": id })).await;
        Ok(json!({ "proposal": { "id": id } }))
    }

    async fn proposals(
        &self,
        filter: ProposalFilter,
    ) -> snapshot_gateway::Result<Value> {
        self.record(
            "proposals",
            json!({
                "first": filter.page.first,
                "author": filter.author,
                "state": filter.state,
            }),
        )
        .await;
        Ok(json!({ "proposals": [] }))
    }

    async fn votes(
        &self,
        proposal: &str,
        page: Page,
    ) -> snapshot_gateway::Result<Value> {
        self.record(
            "votes",
            json!({ "proposal": proposal, "first": page.first }),
        )
        .await;
        Ok(json!({ "votes": [] }))
    }

    async fn user(&self, address: &str) -> snapshot_gateway::Result<Value> {
        self.record("user", json!({ "address": address })).await;
        Ok(json!({ "user": { "id": address } }))
    }

    async fn follows(
        &self,
        address: &str,
        page: Page,
    ) -> snapshot_gateway::Result<Value> {
        self.record(
            "follows",
            json!({ "address": address, "first": page.first }),
        )
        .await;
        Ok(json!({ "follows": [] }))
    }
}

/// Records governance actions without ever touching a network.
#[derive(Default)]
struct StubActions {
    votes: Mutex<Vec<Value>>,
}

#[async_trait]
impl GovernanceActions for StubActions {
    async fn create_identity(&self) -> snapshot_gateway::Result<String> {
        Ok("0xStub".into())
    }

    async fn import_identity(
        &self,
        _key: &str,
    ) -> snapshot_gateway::Result<String> {
        Ok("0xStub".into())
    }

    async fn address(&self) -> snapshot_gateway::Result<String> {
        Ok("0xStub".into())
    }

    async fn create_proposal(
        &self,
        _space: &str,
        _draft: ProposalDraft,
    ) -> snapshot_gateway::Result<Value> {
        Ok(json!({ "receipt": { "id": "0xproposal" } }))
    }

    async fn cast_vote(
        &self,
        space: &str,
        proposal: &str,
        choice: Value,
        reason: Option<String>,
    ) -> snapshot_gateway::Result<Value> {
        self.votes.lock().await.push(json!({
            "space": space,
            "proposal": proposal,
            "choice": choice,
            "reason": reason,
        }));
        Ok(json!({ "receipt": { "id": "0xvote" } }))
    }

    async fn follow_space(
        &self,
        _space: &str,
    ) -> snapshot_gateway::Result<Value> {
        Ok(json!({ "receipt": { "id": "0xfollow" } }))
    }

    async fn unfollow_space(
        &self,
        _space: &str,
    ) -> snapshot_gateway::Result<Value> {
        Ok(json!({ "receipt": { "id": "0xunfollow" } }))
    }
}

fn gateway(
    data: Arc<StubData>,
    actions: Arc<StubActions>,
) -> BoxedFilter<(impl Reply + Send,)> {
    let ctx = GatewayContext::with_collaborators(
        GatewayConfig::default(),
        data,
        actions,
    );
    handler::routes(Arc::new(ctx))
}

fn default_gateway() -> BoxedFilter<(impl Reply + Send,)> {
    gateway(Arc::new(StubData::default()), Arc::new(StubActions::default()))
}

async fn post_rpc(
    routes: &BoxedFilter<(impl Reply + Send + 'static,)>,
    body: Value,
) -> (warp::http::StatusCode, Vec<u8>) {
    let response = warp::test::request()
        .method("POST")
        .path("/mcp")
        .json(&body)
        .reply(routes)
        .await;
    (response.status(), response.body().to_vec())
}

fn rpc_body(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params })
}

/// Calls one tool and returns the decoded Result Wrapper.
async fn call_tool(
    routes: &BoxedFilter<(impl Reply + Send + 'static,)>,
    name: &str,
    arguments: Value,
) -> Value {
    let (status, body) = post_rpc(
        routes,
        rpc_body(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        ),
    )
    .await;
    assert_eq!(status, 200);
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    let text = envelope["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn health_reports_the_gateway_identity() {
    let routes = default_gateway();
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["server"], "snapshot-gateway");
    assert!(body["version"].is_string());
    assert!(body["upstream_endpoint"].is_string());
    assert!(body["timestamp"].is_u64());
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let routes = default_gateway();
    let response = warp::test::request()
        .method("GET")
        .path("/nope")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn initialize_echoes_protocol_and_identity() {
    let routes = default_gateway();
    let (status, body) = post_rpc(&routes, rpc_body("initialize", json!({}))).await;
    assert_eq!(status, 200);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);
    assert!(body["result"]["protocolVersion"].is_string());
    assert_eq!(body["result"]["serverInfo"]["name"], "snapshot-gateway");
}

#[tokio::test]
async fn tools_list_is_idempotent_over_the_wire() {
    let routes = default_gateway();
    let first = post_rpc(&routes, rpc_body("tools/list", json!({}))).await;
    let second = post_rpc(&routes, rpc_body("tools/list", json!({}))).await;
    let first: Value = serde_json::from_slice(&first.1).unwrap();
    let second: Value = serde_json::from_slice(&second.1).unwrap();
    assert_eq!(first["result"], second["result"]);
    assert_eq!(first["result"]["tools"].as_array().unwrap().len(), 14);
}

#[tokio::test]
async fn unknown_method_yields_a_transport_error() {
    let routes = default_gateway();
    let (status, body) = post_rpc(&routes, rpc_body("not_a_method", json!({}))).await;
    assert_eq!(status, 200);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], -32603);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("not_a_method"));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn the_notification_produces_an_entirely_empty_body() {
    let routes = default_gateway();
    let (status, body) = post_rpc(
        &routes,
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(status, 200);
    assert!(body.is_empty());
}

#[tokio::test]
async fn the_trailing_slash_variant_is_accepted() {
    let routes = default_gateway();
    let response = warp::test::request()
        .method("POST")
        .path("/mcp/")
        .json(&rpc_body("initialize", json!({})))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn get_space_round_trips_through_the_stubbed_hub() {
    let routes = default_gateway();
    let wrapper = call_tool(
        &routes,
        "get_space",
        json!({ "space_id": "example.eth" }),
    )
    .await;
    assert_eq!(
        wrapper,
        json!({
            "status": "success",
            "data": { "space": { "id": "example.eth", "name": "Example" } },
            "space_id": "example.eth",
        })
    );
}

#[tokio::test]
async fn unknown_tool_is_wrapped_not_faulted() {
    let routes = default_gateway();
    let (_, body) = post_rpc(
        &routes,
        rpc_body("tools/call", json!({ "name": "not_a_tool" })),
    )
    .await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body.get("error").is_none());
    assert_eq!(body["result"]["isError"], true);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Unknown tool: not_a_tool"));
}

#[tokio::test]
async fn pagination_is_clamped_before_reaching_the_hub() {
    let data = Arc::new(StubData::default());
    let routes = gateway(data.clone(), Arc::new(StubActions::default()));

    let wrapper =
        call_tool(&routes, "list_spaces", json!({ "first": 500 })).await;
    assert_eq!(wrapper["status"], "success");
    let wrapper = call_tool(
        &routes,
        "get_votes",
        json!({ "proposal_id": "0xprop", "first": 5000 }),
    )
    .await;
    assert_eq!(wrapper["status"], "success");

    let calls = data.recorded().await;
    assert_eq!(calls[0].0, "spaces");
    assert_eq!(calls[0].1["first"], 100);
    assert_eq!(calls[1].0, "votes");
    assert_eq!(calls[1].1["first"], 1000);
}

#[tokio::test]
async fn author_filter_is_lowercased() {
    let data = Arc::new(StubData::default());
    let routes = gateway(data.clone(), Arc::new(StubActions::default()));
    call_tool(
        &routes,
        "list_proposals",
        json!({ "author": "0xABCDEF", "state": "all" }),
    )
    .await;
    let calls = data.recorded().await;
    assert_eq!(calls[0].1["author"], "0xabcdef");
    // `all` means no state filter at all.
    assert_eq!(calls[0].1["state"], Value::Null);
}

#[tokio::test]
async fn a_zero_choice_passes_through_to_the_action_client() {
    let actions = Arc::new(StubActions::default());
    let routes = gateway(Arc::new(StubData::default()), actions.clone());
    let wrapper = call_tool(
        &routes,
        "cast_vote",
        json!({ "space_id": "example.eth", "proposal_id": "0xprop", "choice": 0 }),
    )
    .await;
    assert_eq!(wrapper["status"], "success");
    assert_eq!(wrapper["choice"], 0);
    let votes = actions.votes.lock().await;
    assert_eq!(votes[0]["choice"], 0);
    assert_eq!(votes[0]["reason"], Value::Null);
}

#[tokio::test]
async fn missing_required_parameters_surface_as_wrapper_errors() {
    let routes = default_gateway();
    let wrapper = call_tool(&routes, "get_space", json!({})).await;
    assert_eq!(wrapper["status"], "error");
    assert!(wrapper["error"].as_str().unwrap().contains("space_id"));
}

#[tokio::test]
async fn malformed_envelopes_get_a_transport_error_over_http_200() {
    let routes = default_gateway();
    // `method` is missing entirely.
    let (status, body) = post_rpc(&routes, json!({ "jsonrpc": "2.0", "id": 7 })).await;
    assert_eq!(status, 200);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["id"], 7);
    assert_eq!(body["error"]["code"], -32603);
}
