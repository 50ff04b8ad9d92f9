use std::time::{SystemTime, UNIX_EPOCH};

use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::to_checksum;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use super::{GovernanceActions, ProposalDraft};

/// Voting window length applied when a proposal does not state an end.
const DEFAULT_VOTING_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;
/// Voting system applied when a proposal does not state one.
const DEFAULT_VOTING_TYPE: &str = "single-choice";
/// A recent mainnet block used when the chain head cannot be resolved.
///
/// Substituting a stale block silently changes the meaning of `latest`
/// for voting-power snapshots, so every use is logged and the receipt is
/// marked with `snapshot_fallback: true`.
const FALLBACK_SNAPSHOT_BLOCK: u64 = 18_000_000;
/// The sentinel accepted in place of an explicit snapshot block number.
const LATEST_BLOCK: &str = "latest";
/// The application identifier embedded in every submitted message.
const APP_ID: &str = "snapshot-gateway";

/// A client that signs governance messages and submits them to the
/// upstream sequencer.
///
/// Holds the signing identity: absent at startup, created or imported
/// exactly once per call, overwritten (not merged) on re-import, held in
/// memory only. At most one identity is active at a time.
pub struct SequencerClient {
    http: reqwest::Client,
    endpoint: Url,
    rpc_endpoint: Url,
    wallet: Mutex<Option<LocalWallet>>,
}

impl SequencerClient {
    /// Creates a new client with no signing identity.
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        rpc_endpoint: Url,
    ) -> Self {
        Self {
            http,
            endpoint,
            rpc_endpoint,
            wallet: Mutex::new(None),
        }
    }

    /// The current identity, or `NoIdentity`. Every action starts here, so
    /// the guard fires before any network traffic.
    async fn wallet(&self) -> crate::Result<LocalWallet> {
        self.wallet
            .lock()
            .await
            .clone()
            .ok_or(crate::Error::NoIdentity)
    }

    async fn chain_head(&self) -> crate::Result<u64> {
        let provider = Provider::<Http>::try_from(self.rpc_endpoint.as_str())?;
        Ok(provider.get_block_number().await?.as_u64())
    }

    /// Resolves the snapshot block for a new proposal.
    ///
    /// An explicit numeric string wins; `latest` (or anything unparseable)
    /// resolves the current chain head; a failed chain read falls back to
    /// [`FALLBACK_SNAPSHOT_BLOCK`]. Returns the block and whether the
    /// fallback was used.
    async fn resolve_snapshot_block(
        &self,
        requested: Option<&str>,
    ) -> (u64, bool) {
        if let Some(raw) = requested {
            if raw != LATEST_BLOCK {
                match raw.parse::<u64>() {
                    Ok(block) => return (block, false),
                    Err(_) => tracing::warn!(
                        requested = %raw,
                        "unparseable snapshot block, resolving chain head instead"
                    ),
                }
            }
        }
        match self.chain_head().await {
            Ok(block) => (block, false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = FALLBACK_SNAPSHOT_BLOCK,
                    "failed to resolve chain head, substituting fallback snapshot block"
                );
                (FALLBACK_SNAPSHOT_BLOCK, true)
            }
        }
    }

    /// Signs `message` with the given wallet and submits the envelope to
    /// the sequencer. Returns the sequencer's receipt.
    async fn submit(
        &self,
        wallet: &LocalWallet,
        kind: &str,
        message: Value,
    ) -> crate::Result<Value> {
        let payload = serde_json::to_string(&message)?;
        let signature = wallet.sign_message(payload.as_bytes()).await?;
        let address = to_checksum(&wallet.address(), None);
        tracing::event!(
            target: crate::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %crate::probe::Kind::Action,
            action = %kind,
            address = %address,
        );
        let envelope = json!({
            "address": address,
            "sig": format!("0x{}", hex::encode(signature.to_vec())),
            "data": {
                "type": kind,
                "message": message,
            },
        });
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(crate::Error::Upstream {
                status: status.as_u16(),
                message: text,
            });
        }
        let receipt: Value = serde_json::from_str(&text)?;
        Ok(receipt)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl GovernanceActions for SequencerClient {
    async fn create_identity(&self) -> crate::Result<String> {
        let wallet = LocalWallet::new(&mut ethers::core::rand::thread_rng());
        let address = to_checksum(&wallet.address(), None);
        *self.wallet.lock().await = Some(wallet);
        tracing::info!(%address, "created a new signing identity");
        Ok(address)
    }

    async fn import_identity(&self, key: &str) -> crate::Result<String> {
        let wallet: LocalWallet =
            key.trim().trim_start_matches("0x").parse()?;
        let address = to_checksum(&wallet.address(), None);
        *self.wallet.lock().await = Some(wallet);
        tracing::info!(%address, "imported a signing identity");
        Ok(address)
    }

    async fn address(&self) -> crate::Result<String> {
        let wallet = self.wallet().await?;
        Ok(to_checksum(&wallet.address(), None))
    }

    async fn create_proposal(
        &self,
        space: &str,
        draft: ProposalDraft,
    ) -> crate::Result<Value> {
        let wallet = self.wallet().await?;
        let (snapshot, used_fallback) = self
            .resolve_snapshot_block(draft.snapshot_block.as_deref())
            .await;
        let now = unix_now();
        let start = draft.start.unwrap_or(now);
        let end = draft.end.unwrap_or(now + DEFAULT_VOTING_PERIOD_SECS);
        let voting_type = draft
            .voting_type
            .unwrap_or_else(|| DEFAULT_VOTING_TYPE.to_string());
        let message = json!({
            "space": space,
            "type": voting_type,
            "title": draft.title,
            "body": draft.body,
            "discussion": draft.discussion.unwrap_or_default(),
            "choices": draft.choices,
            "start": start,
            "end": end,
            "snapshot": snapshot,
            "plugins": "{}",
            "app": APP_ID,
            "timestamp": now,
        });
        let receipt = self
            .submit(&wallet, "proposal", message)
            .await
            .map_err(|e| crate::Error::Action {
                operation: "create proposal",
                source: Box::new(e),
            })?;
        Ok(json!({
            "receipt": receipt,
            "snapshot": snapshot,
            "snapshot_fallback": used_fallback,
        }))
    }

    async fn cast_vote(
        &self,
        space: &str,
        proposal: &str,
        choice: Value,
        reason: Option<String>,
    ) -> crate::Result<Value> {
        let wallet = self.wallet().await?;
        let mut message = json!({
            "space": space,
            "proposal": proposal,
            "choice": choice,
            "app": APP_ID,
            "metadata": "{}",
            "timestamp": unix_now(),
        });
        // a blank reason is omitted entirely, never sent as an empty string.
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            message["reason"] = json!(reason);
        }
        self.submit(&wallet, "vote", message).await.map_err(|e| {
            crate::Error::Action {
                operation: "cast vote",
                source: Box::new(e),
            }
        })
    }

    async fn follow_space(&self, space: &str) -> crate::Result<Value> {
        let wallet = self.wallet().await?;
        let message = json!({
            "network": "s",
            "follow": space,
            "timestamp": unix_now(),
        });
        self.submit(&wallet, "follow", message).await.map_err(|e| {
            crate::Error::Action {
                operation: "follow space",
                source: Box::new(e),
            }
        })
    }

    async fn unfollow_space(&self, space: &str) -> crate::Result<Value> {
        let wallet = self.wallet().await?;
        let message = json!({
            "network": "s",
            "unfollow": space,
            "timestamp": unix_now(),
        });
        self.submit(&wallet, "unfollow", message)
            .await
            .map_err(|e| crate::Error::Action {
                operation: "unfollow space",
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the canonical test key: private key 0x...01.
    const TEST_KEY: &str =
        "0x0000000000000000000000000000000000000000000000000000000000000001";
    const TEST_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    fn test_client() -> SequencerClient {
        SequencerClient::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9").unwrap(),
            Url::parse("http://127.0.0.1:9").unwrap(),
        )
    }

    #[tokio::test]
    async fn actions_fail_fast_without_an_identity() {
        let client = test_client();
        let draft = ProposalDraft {
            title: "t".into(),
            body: "b".into(),
            choices: vec!["yes".into(), "no".into()],
            ..Default::default()
        };
        assert!(matches!(
            client.create_proposal("example.eth", draft).await,
            Err(crate::Error::NoIdentity)
        ));
        assert!(matches!(
            client
                .cast_vote("example.eth", "0xprop", serde_json::json!(1), None)
                .await,
            Err(crate::Error::NoIdentity)
        ));
        assert!(matches!(
            client.follow_space("example.eth").await,
            Err(crate::Error::NoIdentity)
        ));
        assert!(matches!(
            client.unfollow_space("example.eth").await,
            Err(crate::Error::NoIdentity)
        ));
        assert!(matches!(
            client.address().await,
            Err(crate::Error::NoIdentity)
        ));
    }

    #[tokio::test]
    async fn import_derives_the_expected_address() {
        let client = test_client();
        let address = client.import_identity(TEST_KEY).await.unwrap();
        assert_eq!(address, TEST_ADDRESS);
        assert_eq!(client.address().await.unwrap(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn import_accepts_keys_without_the_hex_prefix() {
        let client = test_client();
        let address = client
            .import_identity(TEST_KEY.trim_start_matches("0x"))
            .await
            .unwrap();
        assert_eq!(address, TEST_ADDRESS);
    }

    #[tokio::test]
    async fn reimport_overwrites_the_previous_identity() {
        let client = test_client();
        let first = client.create_identity().await.unwrap();
        let second = client.import_identity(TEST_KEY).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(client.address().await.unwrap(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn explicit_snapshot_block_skips_the_chain_read() {
        let client = test_client();
        let (block, fallback) =
            client.resolve_snapshot_block(Some("17000000")).await;
        assert_eq!(block, 17_000_000);
        assert!(!fallback);
    }

    #[tokio::test]
    async fn unreachable_chain_falls_back_to_the_pinned_block() {
        // the rpc endpoint points at a closed port, so the head lookup
        // fails and the flagged fallback kicks in.
        let client = test_client();
        let (block, fallback) =
            client.resolve_snapshot_block(Some(LATEST_BLOCK)).await;
        assert_eq!(block, FALLBACK_SNAPSHOT_BLOCK);
        assert!(fallback);
    }
}
