//! The fixed catalog of governance operations the gateway exposes.
//!
//! Each entry declares a name, a description and an MCP-style input
//! schema; dispatch locates the entry by name, validates the raw
//! arguments against the declared schema, and runs the matching handler.
//! Handlers never raise: every outcome, including client failures, is
//! folded into the uniform Result Wrapper
//! `{status: "success" | "error", data | error, ...echoed identifiers}`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::client::{Page, ProposalDraft, ProposalFilter, SpaceFilter};
use crate::context::GatewayContext;
use crate::error::Error;

/// Hard cap on the page size for space and proposal listings.
const MAX_PAGE: i64 = 100;
/// Hard cap on the page size for vote listings.
const MAX_VOTES_PAGE: i64 = 1000;
/// Default page size for listings.
const DEFAULT_PAGE: i64 = 20;
/// Default page size for vote listings.
const DEFAULT_VOTES_PAGE: i64 = 1000;

/// A single operation of the catalog: its wire name, a human description
/// and the declared input schema. Handlers are dispatched by name in
/// [`call`] and never leave this module.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// The wire name of the operation.
    pub name: &'static str,
    /// A one-line description shown to the driving agent.
    pub description: &'static str,
    /// Declared input schema (JSON-Schema style object).
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The full catalog, in its fixed, stable order.
pub fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "get_space",
            description: "Get a governance space by its id",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "space_id": { "type": "string", "description": "The space id, e.g. ens.eth" },
                },
                "required": ["space_id"],
            }),
        },
        ToolDescriptor {
            name: "list_spaces",
            description: "List governance spaces, optionally filtered by id substring or category",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "first": { "type": "integer", "description": "Number of spaces to return (default 20, max 100)" },
                    "skip": { "type": "integer", "description": "Number of spaces to skip (default 0)" },
                    "search": { "type": "string", "description": "Substring to match against space ids" },
                    "category": { "type": "string", "description": "Only spaces carrying this category" },
                },
                "required": [],
            }),
        },
        ToolDescriptor {
            name: "get_proposal",
            description: "Get a proposal by its id",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "proposal_id": { "type": "string", "description": "The proposal id" },
                },
                "required": ["proposal_id"],
            }),
        },
        ToolDescriptor {
            name: "list_proposals",
            description: "List proposals, optionally filtered by space, state or author",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "space_id": { "type": "string", "description": "Only proposals of this space" },
                    "state": {
                        "type": "string",
                        "description": "Proposal state filter (default all)",
                        "enum": ["all", "active", "pending", "closed"],
                    },
                    "author": { "type": "string", "description": "Only proposals by this address" },
                    "first": { "type": "integer", "description": "Number of proposals to return (default 20, max 100)" },
                    "skip": { "type": "integer", "description": "Number of proposals to skip (default 0)" },
                },
                "required": [],
            }),
        },
        ToolDescriptor {
            name: "get_votes",
            description: "List the votes cast on a proposal",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "proposal_id": { "type": "string", "description": "The proposal id" },
                    "first": { "type": "integer", "description": "Number of votes to return (default 1000, max 1000)" },
                    "skip": { "type": "integer", "description": "Number of votes to skip (default 0)" },
                },
                "required": ["proposal_id"],
            }),
        },
        ToolDescriptor {
            name: "get_user",
            description: "Get a user profile by address",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "The user's address" },
                },
                "required": ["address"],
            }),
        },
        ToolDescriptor {
            name: "get_user_follows",
            description: "List the spaces an address follows",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "The follower's address" },
                    "first": { "type": "integer", "description": "Number of follows to return (default 20, max 100)" },
                    "skip": { "type": "integer", "description": "Number of follows to skip (default 0)" },
                },
                "required": ["address"],
            }),
        },
        ToolDescriptor {
            name: "create_identity",
            description: "Generate a fresh signing identity, replacing any existing one",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        },
        ToolDescriptor {
            name: "import_identity",
            description: "Import a signing identity from a hex-encoded private key",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "private_key": { "type": "string", "description": "Hex-encoded private key, with or without 0x" },
                },
                "required": ["private_key"],
            }),
        },
        ToolDescriptor {
            name: "get_address",
            description: "Get the address of the current signing identity",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        },
        ToolDescriptor {
            name: "create_proposal",
            description: "Create a proposal in a space (signed, irreversible)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "space_id": { "type": "string", "description": "The space to propose in" },
                    "title": { "type": "string", "description": "Proposal title" },
                    "body": { "type": "string", "description": "Proposal body text" },
                    "choices": { "type": "array", "description": "The choices voters pick from" },
                    "start": { "type": "integer", "description": "Voting start, unix seconds (default now)" },
                    "end": { "type": "integer", "description": "Voting end, unix seconds (default now + 7 days)" },
                    "snapshot_block": { "type": "string", "description": "Snapshot block number, or 'latest' (default latest)" },
                    "voting_type": {
                        "type": "string",
                        "description": "Voting system (default single-choice)",
                        "enum": ["single-choice", "approval", "quadratic", "ranked-choice", "weighted", "basic"],
                    },
                    "discussion": { "type": "string", "description": "Link to the discussion thread" },
                },
                "required": ["space_id", "title", "body", "choices"],
            }),
        },
        ToolDescriptor {
            name: "cast_vote",
            description: "Cast a vote on a proposal (signed, irreversible)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "space_id": { "type": "string", "description": "The space the proposal belongs to" },
                    "proposal_id": { "type": "string", "description": "The proposal to vote on" },
                    "choice": { "type": "integer", "description": "1-based index into the proposal's choices" },
                    "reason": { "type": "string", "description": "Optional voting reason" },
                },
                "required": ["space_id", "proposal_id", "choice"],
            }),
        },
        ToolDescriptor {
            name: "follow_space",
            description: "Follow a space with the current identity (signed)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "space_id": { "type": "string", "description": "The space to follow" },
                },
                "required": ["space_id"],
            }),
        },
        ToolDescriptor {
            name: "unfollow_space",
            description: "Unfollow a space with the current identity (signed)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "space_id": { "type": "string", "description": "The space to unfollow" },
                },
                "required": ["space_id"],
            }),
        },
    ]
}

/// Validates raw arguments against a declared input schema: required
/// presence, declared type, enum membership. No range or semantic checks.
pub fn validate(schema: &Value, args: &Value) -> crate::Result<()> {
    let args = args
        .as_object()
        .ok_or_else(|| Error::Validation("arguments must be an object".into()))?;
    let empty = Vec::new();
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    for field in required.iter().filter_map(Value::as_str) {
        if !args.contains_key(field) {
            return Err(Error::Validation(format!(
                "missing required parameter: {field}"
            )));
        }
    }
    let Some(properties) = schema.get("properties").and_then(Value::as_object)
    else {
        return Ok(());
    };
    for (name, value) in args {
        let Some(declared) = properties.get(name) else {
            // undeclared extras pass through untouched.
            continue;
        };
        if let Some(expected) = declared.get("type").and_then(Value::as_str) {
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(Error::Validation(format!(
                    "parameter {name} must be of type {expected}"
                )));
            }
        }
        if let Some(allowed) = declared.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(Error::Validation(format!(
                    "parameter {name} must be one of {allowed:?}"
                )));
            }
        }
    }
    Ok(())
}

/// Dispatches one tool call.
///
/// Returns `Err` only for a name that is not in the catalog; every other
/// outcome, including validation and client failures, comes back as an
/// `Ok` Result Wrapper.
pub async fn call(
    ctx: &GatewayContext,
    name: &str,
    args: &Value,
) -> crate::Result<Value> {
    let Some(tool) = tools().into_iter().find(|t| t.name == name) else {
        return Err(Error::UnknownTool(name.to_string()));
    };
    if let Err(e) = validate(&tool.input_schema, args) {
        return Ok(failure(&e, &[]));
    }
    let wrapper = match name {
        "get_space" => get_space(ctx, args).await,
        "list_spaces" => list_spaces(ctx, args).await,
        "get_proposal" => get_proposal(ctx, args).await,
        "list_proposals" => list_proposals(ctx, args).await,
        "get_votes" => get_votes(ctx, args).await,
        "get_user" => get_user(ctx, args).await,
        "get_user_follows" => get_user_follows(ctx, args).await,
        "create_identity" => create_identity(ctx).await,
        "import_identity" => import_identity(ctx, args).await,
        "get_address" => get_address(ctx).await,
        "create_proposal" => create_proposal(ctx, args).await,
        "cast_vote" => cast_vote(ctx, args).await,
        "follow_space" => follow_space(ctx, args).await,
        "unfollow_space" => unfollow_space(ctx, args).await,
        _ => return Err(Error::UnknownTool(name.to_string())),
    };
    Ok(wrapper)
}

/// Builds the success arm of the Result Wrapper.
fn success(data: Value, echo: &[(&str, Value)]) -> Value {
    let mut wrapper = serde_json::Map::new();
    wrapper.insert("status".into(), json!("success"));
    wrapper.insert("data".into(), data);
    for (key, value) in echo {
        wrapper.insert((*key).into(), value.clone());
    }
    Value::Object(wrapper)
}

/// Builds the error arm of the Result Wrapper, rendering the full cause
/// chain here and nowhere deeper.
fn failure(err: &Error, echo: &[(&str, Value)]) -> Value {
    let mut wrapper = serde_json::Map::new();
    wrapper.insert("status".into(), json!("error"));
    wrapper.insert("error".into(), json!(err.chain()));
    for (key, value) in echo {
        wrapper.insert((*key).into(), value.clone());
    }
    Value::Object(wrapper)
}

fn wrap(result: crate::Result<Value>, echo: &[(&str, Value)]) -> Value {
    match result {
        Ok(data) => success(data, echo),
        Err(e) => failure(&e, echo),
    }
}

/// `min(requested-or-default, max)`; negative and zero values pass
/// through unclamped.
fn clamp_page(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).min(max)
}

fn str_arg(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn int_arg(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

fn page_arg(args: &Value, default: i64, max: i64) -> Page {
    Page {
        first: clamp_page(int_arg(args, "first"), default, max),
        skip: int_arg(args, "skip").unwrap_or(0),
    }
}

async fn get_space(ctx: &GatewayContext, args: &Value) -> Value {
    let space_id = str_arg(args, "space_id");
    let echo = [("space_id", json!(space_id))];
    wrap(ctx.data().space(&space_id).await, &echo)
}

async fn list_spaces(ctx: &GatewayContext, args: &Value) -> Value {
    let filter = SpaceFilter {
        page: page_arg(args, DEFAULT_PAGE, MAX_PAGE),
        search: opt_str_arg(args, "search"),
        category: opt_str_arg(args, "category"),
    };
    wrap(ctx.data().spaces(filter).await, &[])
}

async fn get_proposal(ctx: &GatewayContext, args: &Value) -> Value {
    let proposal_id = str_arg(args, "proposal_id");
    let echo = [("proposal_id", json!(proposal_id))];
    wrap(ctx.data().proposal(&proposal_id).await, &echo)
}

async fn list_proposals(ctx: &GatewayContext, args: &Value) -> Value {
    let state = opt_str_arg(args, "state").filter(|s| s != "all");
    let filter = ProposalFilter {
        page: page_arg(args, DEFAULT_PAGE, MAX_PAGE),
        space: opt_str_arg(args, "space_id"),
        state,
        author: opt_str_arg(args, "author").map(|a| a.to_lowercase()),
    };
    let echo = match &filter.space {
        Some(space) => vec![("space_id", json!(space))],
        None => Vec::new(),
    };
    wrap(ctx.data().proposals(filter).await, &echo)
}

async fn get_votes(ctx: &GatewayContext, args: &Value) -> Value {
    let proposal_id = str_arg(args, "proposal_id");
    let page = page_arg(args, DEFAULT_VOTES_PAGE, MAX_VOTES_PAGE);
    let echo = [("proposal_id", json!(proposal_id))];
    wrap(ctx.data().votes(&proposal_id, page).await, &echo)
}

async fn get_user(ctx: &GatewayContext, args: &Value) -> Value {
    let address = str_arg(args, "address");
    let echo = [("address", json!(address))];
    wrap(ctx.data().user(&address).await, &echo)
}

async fn get_user_follows(ctx: &GatewayContext, args: &Value) -> Value {
    let address = str_arg(args, "address").to_lowercase();
    let page = page_arg(args, DEFAULT_PAGE, MAX_PAGE);
    let echo = [("address", json!(address))];
    wrap(ctx.data().follows(&address, page).await, &echo)
}

async fn create_identity(ctx: &GatewayContext) -> Value {
    wrap(
        ctx.actions()
            .create_identity()
            .await
            .map(|address| json!({ "address": address })),
        &[],
    )
}

async fn import_identity(ctx: &GatewayContext, args: &Value) -> Value {
    let key = str_arg(args, "private_key");
    wrap(
        ctx.actions()
            .import_identity(&key)
            .await
            .map(|address| json!({ "address": address })),
        &[],
    )
}

async fn get_address(ctx: &GatewayContext) -> Value {
    wrap(
        ctx.actions()
            .address()
            .await
            .map(|address| json!({ "address": address })),
        &[],
    )
}

async fn create_proposal(ctx: &GatewayContext, args: &Value) -> Value {
    let space_id = str_arg(args, "space_id");
    let draft = ProposalDraft {
        title: str_arg(args, "title"),
        body: str_arg(args, "body"),
        discussion: opt_str_arg(args, "discussion"),
        choices: args
            .get("choices")
            .and_then(Value::as_array)
            .map(|choices| {
                choices
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        start: args.get("start").and_then(Value::as_u64),
        end: args.get("end").and_then(Value::as_u64),
        snapshot_block: opt_str_arg(args, "snapshot_block"),
        voting_type: opt_str_arg(args, "voting_type"),
    };
    let echo = [("space_id", json!(space_id))];
    wrap(ctx.actions().create_proposal(&space_id, draft).await, &echo)
}

async fn cast_vote(ctx: &GatewayContext, args: &Value) -> Value {
    let space_id = str_arg(args, "space_id");
    let proposal_id = str_arg(args, "proposal_id");
    // forwarded verbatim: the catalog does not second-guess the choice
    // value beyond its declared integer type.
    let choice = args.get("choice").cloned().unwrap_or(Value::Null);
    let reason = opt_str_arg(args, "reason");
    let echo = [
        ("space_id", json!(space_id)),
        ("proposal_id", json!(proposal_id)),
        ("choice", choice.clone()),
    ];
    wrap(
        ctx.actions()
            .cast_vote(&space_id, &proposal_id, choice, reason)
            .await,
        &echo,
    )
}

async fn follow_space(ctx: &GatewayContext, args: &Value) -> Value {
    let space_id = str_arg(args, "space_id");
    let echo = [("space_id", json!(space_id))];
    wrap(ctx.actions().follow_space(&space_id).await, &echo)
}

async fn unfollow_space(ctx: &GatewayContext, args: &Value) -> Value {
    let space_id = str_arg(args, "space_id");
    let echo = [("space_id", json!(space_id))];
    wrap(ctx.actions().unfollow_space(&space_id).await, &echo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_the_fourteen_operations_in_stable_order() {
        let first = tools();
        let second = tools();
        assert_eq!(first.len(), 14);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
        assert_eq!(first[0].name, "get_space");
        assert_eq!(first[13].name, "unfollow_space");
    }

    #[test]
    fn page_clamping_caps_but_passes_negatives_through() {
        assert_eq!(clamp_page(Some(500), 20, 100), 100);
        assert_eq!(clamp_page(Some(5000), 1000, 1000), 1000);
        assert_eq!(clamp_page(None, 20, 100), 20);
        assert_eq!(clamp_page(Some(7), 20, 100), 7);
        // negative and zero pass through unclamped, the documented gap.
        assert_eq!(clamp_page(Some(-5), 20, 100), -5);
        assert_eq!(clamp_page(Some(0), 20, 100), 0);
    }

    fn schema_of(name: &str) -> Value {
        tools()
            .into_iter()
            .find(|t| t.name == name)
            .unwrap()
            .input_schema
    }

    #[test]
    fn validate_rejects_missing_required_fields() {
        let err =
            validate(&schema_of("get_space"), &json!({})).unwrap_err();
        assert!(err.to_string().contains("space_id"));
    }

    #[test]
    fn validate_rejects_wrong_types() {
        let err = validate(
            &schema_of("cast_vote"),
            &json!({ "space_id": "s", "proposal_id": "p", "choice": "one" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("choice"));
    }

    #[test]
    fn validate_accepts_a_zero_choice() {
        // no range is declared, so 0 passes even though upstream counts
        // choices from 1.
        validate(
            &schema_of("cast_vote"),
            &json!({ "space_id": "s", "proposal_id": "p", "choice": 0 }),
        )
        .unwrap();
    }

    #[test]
    fn validate_enforces_enum_membership() {
        let err = validate(
            &schema_of("list_proposals"),
            &json!({ "state": "finished" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("state"));
        validate(&schema_of("list_proposals"), &json!({ "state": "closed" }))
            .unwrap();
    }

    #[test]
    fn wrappers_carry_status_and_echoes() {
        let ok = success(json!({ "x": 1 }), &[("space_id", json!("s"))]);
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["space_id"], "s");
        let err = failure(
            &Error::Validation("missing required parameter: space_id".into()),
            &[],
        );
        assert_eq!(err["status"], "error");
        assert!(err["error"].as_str().unwrap().contains("space_id"));
        assert!(err.get("data").is_none());
    }
}
