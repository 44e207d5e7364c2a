use crate::{
    config::ReceiptPolicy,
    rpc,
};
use alloy::{
    network::ReceiptResponse,
    providers::{
        DynProvider,
        Provider,
    },
    rpc::types::{
        BlockId,
        TransactionInput,
        TransactionRequest,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use flip_abi::{
    Address,
    Bytes,
    ContractWrite,
    FlipResult,
    GameStats,
    Log,
    RoundRecord,
    SessionRecord,
    TxHash,
    Wei,
    decode_flip_result,
    decode_round,
    decode_session,
    decode_stats,
    decode_wei,
    reads,
};
use std::future::Future;
use tokio::time;
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    pub success: bool,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// `FlipResult` events emitted by `contract` in this transaction.
    pub fn flip_results(&self, contract: Address) -> Vec<FlipResult> {
        self.logs
            .iter()
            .filter(|log| log.address == contract)
            .filter_map(|log| match decode_flip_result(&log.data) {
                Ok(result) => result,
                Err(err) => {
                    warn!(%err, hash = %self.hash, "undecodable FlipResult log");
                    None
                }
            })
            .collect()
    }
}

/// Everything the client needs from the wallet and the game contract.
///
/// `submit` resolves once the wallet has accepted and broadcast the write;
/// `wait_for_receipt` resolves once it is included.
pub trait GameContract: Send + Sync + 'static {
    fn contract_address(&self) -> Address;

    fn connected_account(&self) -> impl Future<Output = Result<Option<Address>>> + Send;

    fn session(&self, player: Address) -> impl Future<Output = Result<SessionRecord>> + Send;

    fn current_round(&self) -> impl Future<Output = Result<RoundRecord>> + Send;

    fn unclaimed_prize(&self, player: Address) -> impl Future<Output = Result<Wei>> + Send;

    fn buyback_accumulator(&self) -> impl Future<Output = Result<Wei>> + Send;

    fn min_entry(&self) -> impl Future<Output = Result<Wei>> + Send;

    fn stats(&self) -> impl Future<Output = Result<GameStats>> + Send;

    fn balance(&self, account: Address) -> impl Future<Output = Result<Wei>> + Send;

    fn submit(
        &self,
        from: Address,
        write: ContractWrite,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    fn wait_for_receipt(&self, hash: TxHash) -> impl Future<Output = Result<Receipt>> + Send;

    /// Replays `write` against the state at `block` and returns the
    /// endpoint's rejection message, if the replay fails.
    fn revert_reason(
        &self,
        from: Address,
        write: ContractWrite,
        block: u64,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// [`GameContract`] over EVM JSON-RPC. The endpoint must expose a signing
/// account (`eth_accounts` / `eth_sendTransaction`); this client never
/// touches keys.
#[derive(Clone)]
pub struct RpcGameContract {
    provider: DynProvider,
    contract: Address,
    receipt: ReceiptPolicy,
}

impl RpcGameContract {
    pub fn new(rpc_url: &str, contract: Address, receipt: ReceiptPolicy) -> Result<Self> {
        Ok(Self {
            provider: rpc::connect(rpc_url)?,
            contract,
            receipt,
        })
    }

    fn request(&self, calldata: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default()
            .to(self.contract)
            .input(TransactionInput::both(Bytes::from(calldata)))
    }

    async fn call(&self, what: &'static str, calldata: Vec<u8>) -> Result<Bytes> {
        self.provider
            .call(self.request(calldata))
            .await
            .map_err(|err| rpc::describe("eth_call", err))
            .wrap_err_with(|| format!("reading {what} failed"))
    }

    async fn fetch_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let Some(receipt) = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|err| rpc::describe("eth_getTransactionReceipt", err))?
        else {
            return Ok(None);
        };
        Ok(Some(Receipt {
            hash: receipt.transaction_hash(),
            success: receipt.status(),
            block_number: receipt.block_number().unwrap_or_default(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }))
    }
}

impl GameContract for RpcGameContract {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn connected_account(&self) -> Result<Option<Address>> {
        let accounts = self
            .provider
            .get_accounts()
            .await
            .map_err(|err| rpc::describe("eth_accounts", err))?;
        Ok(accounts.first().copied())
    }

    async fn session(&self, player: Address) -> Result<SessionRecord> {
        let data = self.call("getSession", reads::session(player)).await?;
        decode_session(&data).wrap_err("invalid getSession payload")
    }

    async fn current_round(&self) -> Result<RoundRecord> {
        let data = self.call("getCurrentRound", reads::current_round()).await?;
        decode_round(&data).wrap_err("invalid getCurrentRound payload")
    }

    async fn unclaimed_prize(&self, player: Address) -> Result<Wei> {
        let data = self
            .call("getUnclaimedPrize", reads::unclaimed_prize(player))
            .await?;
        decode_wei(&data).wrap_err("invalid getUnclaimedPrize payload")
    }

    async fn buyback_accumulator(&self) -> Result<Wei> {
        let data = self
            .call("buybackAccumulator", reads::buyback_accumulator())
            .await?;
        decode_wei(&data).wrap_err("invalid buybackAccumulator payload")
    }

    async fn min_entry(&self) -> Result<Wei> {
        let data = self.call("minEntry", reads::min_entry()).await?;
        decode_wei(&data).wrap_err("invalid minEntry payload")
    }

    async fn stats(&self) -> Result<GameStats> {
        let data = self.call("getStats", reads::stats()).await?;
        decode_stats(&data).wrap_err("invalid getStats payload")
    }

    async fn balance(&self, account: Address) -> Result<Wei> {
        self.provider
            .get_balance(account)
            .await
            .map_err(|err| rpc::describe("eth_getBalance", err))
    }

    async fn submit(&self, from: Address, write: ContractWrite) -> Result<TxHash> {
        debug!(call = write.name(), %from, "sending transaction to wallet");
        let tx = self
            .request(write.calldata())
            .from(from)
            .value(write.value());
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|err| rpc::describe("eth_sendTransaction", err))?;
        Ok(*pending.tx_hash())
    }

    /// Polls until the receipt appears or the policy's timeout elapses. A
    /// failed poll is logged and retried.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt> {
        let mut last_error = None;
        let poll = async {
            loop {
                match self.fetch_receipt(hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(%hash, error = %format!("{err:#}"), "receipt poll failed, retrying");
                        last_error = Some(err);
                    }
                }
                time::sleep(self.receipt.poll_interval).await;
            }
        };
        let outcome = time::timeout(self.receipt.timeout, poll).await;
        match outcome {
            Ok(receipt) => Ok(receipt),
            Err(_) => match last_error {
                Some(err) => Err(err.wrap_err(format!("timed out waiting for receipt of {hash}"))),
                None => Err(eyre!("timed out waiting for receipt of {hash}")),
            },
        }
    }

    async fn revert_reason(
        &self,
        from: Address,
        write: ContractWrite,
        block: u64,
    ) -> Result<Option<String>> {
        let tx = self
            .request(write.calldata())
            .from(from)
            .value(write.value());
        match self.provider.call(tx).block(BlockId::number(block)).await {
            Ok(_) => Ok(None),
            Err(err) => match err.as_error_resp() {
                Some(payload) => Ok(Some(rpc::describe_payload(payload))),
                None => Err(rpc::describe("eth_call", err)),
            },
        }
    }
}
