//! The Chain RPC collaborator (§5, §6): everything the ladder and the
//! instruction builder need to observe or mutate Chain state. Gas
//! estimation/emulation and the indexer's historical database are separate
//! collaborators (see [`crate::emulator`] and [`crate::indexer_db`]).
use async_trait::async_trait;
use solana_client::{client_error::Result as ClientResult, nonblocking::rpc_client::RpcClient};
use solana_sdk::{
    account::Account, clock::Slot, commitment_config::CommitmentConfig, hash::Hash,
    pubkey::Pubkey, signature::Signature, transaction::{Transaction, VersionedTransaction},
};

/// Every method here is a suspension point per §5: the strategy ladder and
/// mempool server await these without holding any `ExecCtx`-wide lock.
#[async_trait]
pub trait Rpc: Send + Sync {
    fn commitment(&self) -> CommitmentConfig;
    async fn get_account(&self, key: &Pubkey) -> ClientResult<Option<Account>>;
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> ClientResult<Vec<Option<Account>>>;
    async fn get_balance(&self, key: &Pubkey) -> ClientResult<u64>;
    async fn get_slot(&self) -> ClientResult<Slot>;
    async fn get_latest_blockhash(&self) -> ClientResult<Hash>;
    async fn get_signature_status(&self, signature: &Signature) -> ClientResult<Option<bool>>;
    async fn get_cluster_nodes_count(&self) -> ClientResult<usize>;
    async fn send_transaction(&self, transaction: &Transaction) -> ClientResult<Signature>;
    /// §4.4 — the Alt* rungs route through a lookup table, so their
    /// transactions must travel as `V0` messages rather than the legacy
    /// encoding every other rung sends via [`Self::send_transaction`].
    async fn send_versioned_transaction(&self, transaction: &VersionedTransaction) -> ClientResult<Signature>;
}

#[async_trait]
impl Rpc for RpcClient {
    fn commitment(&self) -> CommitmentConfig {
        RpcClient::commitment(self)
    }

    async fn get_account(&self, key: &Pubkey) -> ClientResult<Option<Account>> {
        match self.get_account(key).await {
            Ok(account) => Ok(Some(account)),
            Err(e) if is_account_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> ClientResult<Vec<Option<Account>>> {
        self.get_multiple_accounts(keys).await
    }

    async fn get_balance(&self, key: &Pubkey) -> ClientResult<u64> {
        self.get_balance(key).await
    }

    async fn get_slot(&self) -> ClientResult<Slot> {
        self.get_slot().await
    }

    async fn get_latest_blockhash(&self) -> ClientResult<Hash> {
        self.get_latest_blockhash().await
    }

    async fn get_signature_status(&self, signature: &Signature) -> ClientResult<Option<bool>> {
        let status = self.get_signature_status(signature).await?;
        Ok(status.map(|r| r.is_ok()))
    }

    async fn get_cluster_nodes_count(&self) -> ClientResult<usize> {
        Ok(self.get_cluster_nodes().await?.len())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> ClientResult<Signature> {
        self.send_transaction(transaction).await
    }

    async fn send_versioned_transaction(&self, transaction: &VersionedTransaction) -> ClientResult<Signature> {
        self.send_transaction(transaction).await
    }
}

fn is_account_not_found(e: &solana_client::client_error::ClientError) -> bool {
    e.to_string().contains("AccountNotFound")
}
