//! Chain-Instruction Builder (§4.1, C1): turns an `EthTx` plus ladder state
//! into a Chain `Instruction` carrying the opcode table a transformed
//! `EvmInstruction` program accepts. Grounded on the opcode layout and
//! `NeonIxBuilder` in the Python reference's `common_neon/neon_instruction.py`.
pub mod alt;

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    keccak,
    pubkey::Pubkey,
};

use crate::types::eth_tx::EthTx;

/// Opcodes the Proxy emits against the Chain program. Values follow §4.1's
/// table bit-exact; note the gap at `0x29` (unused by this Proxy) between
/// `CreateAccountV03` and `TxExecFromAccount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    CollectTreasure = 0x1E,
    TxExecFromData = 0x1F,
    TxStepFromData = 0x20,
    TxStepFromAccount = 0x21,
    TxStepFromAccountNoChainId = 0x22,
    CancelWithHash = 0x23,
    HolderCreate = 0x24,
    HolderDelete = 0x25,
    HolderWrite = 0x26,
    DepositV03 = 0x27,
    CreateAccountV03 = 0x28,
    TxExecFromAccount = 0x2A,
}

/// Default iterative-step unit count per `TxStepFrom*` instruction; the
/// ladder may lower this when an emulated step count doesn't divide evenly.
pub const DEFAULT_EVM_STEPS_PER_IX: u32 = 500;

/// Stateful builder bound to one operator resource for the lifetime of one
/// `ExecCtx`. Mirrors the reference `NeonIxBuilder`: construction fixes the
/// accounts that don't change across an tx's instructions (program id,
/// operator, treasury, holder); each `make_*_ix` method appends the
/// per-instruction accounts and payload.
#[derive(Debug, Clone)]
pub struct IxBuilder {
    pub program_id: Pubkey,
    pub operator: Pubkey,
    pub treasury_pool_address: Pubkey,
    pub treasury_pool_index: u32,
    pub holder_address: Pubkey,
    /// The operator's own gas-tank account — every `make_*_ix` that moves
    /// Chain state debits/credits it for the priority fee, so it rides
    /// along in `base_accounts` rather than each call site naming it.
    pub operator_neon_address: Pubkey,
}

impl IxBuilder {
    #[must_use]
    pub fn new(
        program_id: Pubkey,
        operator: Pubkey,
        treasury_pool_address: Pubkey,
        treasury_pool_index: u32,
        holder_address: Pubkey,
        operator_neon_address: Pubkey,
    ) -> Self {
        Self { program_id, operator, treasury_pool_address, treasury_pool_index, holder_address, operator_neon_address }
    }

    /// §4.1 — the account list common to every Chain instruction that
    /// touches EVM state: `[operator(signer), treasury, operator's gas
    /// tank, system program, Chain program] ++ chain_accounts`.
    fn base_accounts(&self, chain_accounts: &[Pubkey]) -> Vec<AccountMeta> {
        let mut accounts = vec![
            AccountMeta::new(self.operator, true),
            AccountMeta::new(self.treasury_pool_address, false),
            AccountMeta::new(self.operator_neon_address, false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
            AccountMeta::new_readonly(self.program_id, false),
        ];
        accounts.extend(chain_accounts.iter().map(|key| AccountMeta::new(*key, false)));
        accounts
    }

    /// §4.4 Simple strategy — executes the whole tx in one instruction.
    /// Data: `0x1F ‖ treasury_pool_index(4) ‖ rlp_encoded_signed_tx`.
    #[must_use]
    pub fn make_tx_exec_from_data_ix(&self, eth_tx: &EthTx, chain_accounts: &[Pubkey]) -> Instruction {
        let accounts = self.base_accounts(chain_accounts);
        let mut data = Vec::with_capacity(1 + 4 + eth_tx.raw_rlp().len());
        data.push(Opcode::TxExecFromData as u8);
        data.extend_from_slice(&self.treasury_pool_index.to_le_bytes());
        data.extend_from_slice(eth_tx.raw_rlp());
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// §4.4 Iterative strategy — one step of `evm_step_cnt` EVM steps,
    /// executed from the raw tx payload rather than a holder account.
    /// Data: `opcode ‖ treasury_pool_index(4) ‖ step_cnt(4) ‖ index(4) ‖ rlp_encoded_signed_tx`.
    #[must_use]
    pub fn make_tx_step_from_data_ix(
        &self,
        eth_tx: &EthTx,
        chain_accounts: &[Pubkey],
        evm_step_cnt: u32,
        index: u32,
    ) -> Instruction {
        let accounts = self.base_accounts(chain_accounts);
        let mut data = Vec::with_capacity(1 + 4 + 4 + 4 + eth_tx.raw_rlp().len());
        data.push(Opcode::TxStepFromData as u8);
        data.extend_from_slice(&self.treasury_pool_index.to_le_bytes());
        data.extend_from_slice(&evm_step_cnt.to_le_bytes());
        data.extend_from_slice(&index.to_le_bytes());
        data.extend_from_slice(eth_tx.raw_rlp());
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// §4.4 Holder-family iterative strategy — calldata already staged in
    /// the holder account; only the step count and index travel inline.
    /// Data: `opcode ‖ treasury_pool_index(4) ‖ step_cnt(4) ‖ index(4)`.
    #[must_use]
    pub fn make_tx_step_from_account_ix(
        &self,
        chain_accounts: &[Pubkey],
        evm_step_cnt: u32,
        index: u32,
    ) -> Instruction {
        let mut accounts = vec![AccountMeta::new(self.holder_address, false)];
        accounts.extend(self.base_accounts(chain_accounts));
        let data = step_from_account_data(Opcode::TxStepFromAccount, self.treasury_pool_index, evm_step_cnt, index);
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// §4.4 NoChainId strategy — pre-EIP-155 tx; identical account layout
    /// to [`Self::make_tx_step_from_account_ix`] with a distinct opcode
    /// since the program must skip the chain-id check on this path.
    #[must_use]
    pub fn make_tx_step_from_account_no_chainid_ix(
        &self,
        chain_accounts: &[Pubkey],
        evm_step_cnt: u32,
        index: u32,
    ) -> Instruction {
        let mut accounts = vec![AccountMeta::new(self.holder_address, false)];
        accounts.extend(self.base_accounts(chain_accounts));
        let data = step_from_account_data(
            Opcode::TxStepFromAccountNoChainId,
            self.treasury_pool_index,
            evm_step_cnt,
            index,
        );
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// §4.1 — cancels a tx identified only by its hash; used when the
    /// ladder abandons a strategy partway through and the holder/state
    /// account must be unwound without a full `EthTx`. Data: `0x23 ‖ tx_sig(32)`.
    #[must_use]
    pub fn make_cancel_ix(&self, tx_sig: [u8; 32], chain_accounts: &[Pubkey]) -> Instruction {
        let accounts = self.base_accounts(chain_accounts);
        let mut data = Vec::with_capacity(1 + 32);
        data.push(Opcode::CancelWithHash as u8);
        data.extend_from_slice(&tx_sig);
        Instruction { program_id: self.program_id, accounts, data }
    }

    #[must_use]
    pub fn make_holder_create_ix(&self, seed: &[u8]) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.holder_address, false),
            AccountMeta::new(self.operator, true),
        ];
        let mut data = Vec::with_capacity(1 + seed.len());
        data.push(Opcode::HolderCreate as u8);
        data.extend_from_slice(seed);
        Instruction { program_id: self.program_id, accounts, data }
    }

    #[must_use]
    pub fn make_holder_delete_ix(&self) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.holder_address, false),
            AccountMeta::new(self.operator, true),
        ];
        Instruction {
            program_id: self.program_id,
            accounts,
            data: vec![Opcode::HolderDelete as u8],
        }
    }

    /// §4.4 — stages `chunk` at `offset` bytes into the holder account; the
    /// ladder repeats this until the whole calldata is written.
    /// Data: `0x26 ‖ tx_sig(32) ‖ offset_u64_le ‖ chunk_bytes`.
    #[must_use]
    pub fn make_holder_write_ix(&self, tx_sig: [u8; 32], offset: u64, chunk: &[u8]) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.holder_address, false),
            AccountMeta::new(self.operator, true),
        ];
        let mut data = Vec::with_capacity(1 + 32 + 8 + chunk.len());
        data.push(Opcode::HolderWrite as u8);
        data.extend_from_slice(&tx_sig);
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(chunk);
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// §4.1 — moves the treasury pool's accumulated priority fees back to
    /// the main treasury; not tied to any particular tx.
    #[must_use]
    pub fn make_collect_treasure_ix(&self, main_treasury: &Pubkey) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.treasury_pool_address, false),
            AccountMeta::new(*main_treasury, false),
            AccountMeta::new(self.operator, true),
        ];
        Instruction {
            program_id: self.program_id,
            accounts,
            data: vec![Opcode::CollectTreasure as u8],
        }
    }

    #[must_use]
    pub fn make_deposit_ix(&self, ether_account: &Pubkey, amount: u64) -> Instruction {
        let accounts = vec![
            AccountMeta::new(*ether_account, false),
            AccountMeta::new(self.operator, true),
        ];
        let mut data = Vec::with_capacity(1 + 8);
        data.push(Opcode::DepositV03 as u8);
        data.extend_from_slice(&amount.to_le_bytes());
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// Data: `0x28 ‖ ether_address(20)`.
    #[must_use]
    pub fn make_create_account_ix(&self, ether_address: [u8; 20]) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.operator, true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];
        let mut data = Vec::with_capacity(1 + 20);
        data.push(Opcode::CreateAccountV03 as u8);
        data.extend_from_slice(&ether_address);
        Instruction { program_id: self.program_id, accounts, data }
    }

    /// §4.4 Simple-Holder strategy — executes a tx whose calldata was
    /// already fully staged in the holder account, in one instruction.
    /// Data: `0x2A ‖ treasury_pool_index(4)`.
    #[must_use]
    pub fn make_tx_exec_from_account_ix(&self, chain_accounts: &[Pubkey]) -> Instruction {
        let mut accounts = vec![AccountMeta::new(self.holder_address, false)];
        accounts.extend(self.base_accounts(chain_accounts));
        let mut data = Vec::with_capacity(1 + 4);
        data.push(Opcode::TxExecFromAccount as u8);
        data.extend_from_slice(&self.treasury_pool_index.to_le_bytes());
        Instruction { program_id: self.program_id, accounts, data }
    }
}

fn step_from_account_data(opcode: Opcode, treasury_pool_index: u32, evm_step_cnt: u32, index: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + 4 + 4 + 4);
    data.push(opcode as u8);
    data.extend_from_slice(&treasury_pool_index.to_le_bytes());
    data.extend_from_slice(&evm_step_cnt.to_le_bytes());
    data.extend_from_slice(&index.to_le_bytes());
    data
}

/// §3 — `treasury_pool_address = PDA(["treasury_pool", index_le_bytes], program_id)`.
#[must_use]
pub fn treasury_pool_address(program_id: &Pubkey, index: u32) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"treasury_pool", &index.to_le_bytes()], program_id)
}

/// Seed version byte prefixed to every ether-derived PDA, bumped whenever
/// the Chain program's account layout changes in a way that would collide
/// with an older-layout account at the same address.
const ACCOUNT_SEED_VERSION: u8 = 3;

/// §3/§4.2 — the PDA an `EthTx` sender's on-Chain balance lives at, used by
/// the Validator to answer `InsufficientFunds`. `PDA([seed_version,
/// ether_address], program_id)`.
#[must_use]
pub fn ether_account_address(program_id: &Pubkey, ether_address: [u8; 20]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[&[ACCOUNT_SEED_VERSION], &ether_address], program_id)
}

/// An operator authenticates to the Chain program with a Solana keypair,
/// not a secp256k1 one, so it has no Ethereum address of its own to hold
/// its gas tank under. Derives one deterministically from the operator's
/// Solana pubkey the same way [`EthTx::recover_sender`] derives a sender
/// address from a public key: `keccak256(pubkey)[12..32]`.
#[must_use]
pub fn operator_ether_address(operator: &Pubkey) -> [u8; 20] {
    let hash = keccak::hash(operator.as_ref()).to_bytes();
    hash[12..32].try_into().expect("20 bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treasury_pool_address_is_deterministic_pda() {
        let program_id = Pubkey::new_unique();
        let (addr1, bump1) = treasury_pool_address(&program_id, 7);
        let (addr2, bump2) = treasury_pool_address(&program_id, 7);
        assert_eq!(addr1, addr2);
        assert_eq!(bump1, bump2);

        let (addr3, _) = treasury_pool_address(&program_id, 8);
        assert_ne!(addr1, addr3);
    }

    #[test]
    fn ether_account_address_is_deterministic_pda() {
        let program_id = Pubkey::new_unique();
        let address = [7u8; 20];
        let (addr1, bump1) = ether_account_address(&program_id, address);
        let (addr2, bump2) = ether_account_address(&program_id, address);
        assert_eq!(addr1, addr2);
        assert_eq!(bump1, bump2);

        let (addr3, _) = ether_account_address(&program_id, [8u8; 20]);
        assert_ne!(addr1, addr3);
    }

    #[test]
    fn opcode_values_match_reference_table() {
        assert_eq!(Opcode::CollectTreasure as u8, 0x1E);
        assert_eq!(Opcode::TxExecFromAccount as u8, 0x2A);
    }

    #[test]
    fn base_accounts_order_and_writability_matches_chain_program() {
        let operator = Pubkey::new_unique();
        let treasury = Pubkey::new_unique();
        let operator_neon = Pubkey::new_unique();
        let program_id = Pubkey::new_unique();
        let chain_account = Pubkey::new_unique();
        let builder = IxBuilder::new(program_id, operator, treasury, 0, Pubkey::new_unique(), operator_neon);

        let ix = builder.make_cancel_ix([0u8; 32], &[chain_account]);

        assert_eq!(ix.accounts[0].pubkey, operator);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, treasury);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[2].pubkey, operator_neon);
        assert!(ix.accounts[2].is_writable);
        assert_eq!(ix.accounts[3].pubkey, solana_sdk::system_program::ID);
        assert!(!ix.accounts[3].is_writable);
        assert_eq!(ix.accounts[4].pubkey, program_id);
        assert!(!ix.accounts[4].is_writable);
        assert_eq!(ix.accounts[5].pubkey, chain_account);
    }

    #[test]
    fn operator_ether_address_is_deterministic_and_distinct_per_operator() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_eq!(operator_ether_address(&a), operator_ether_address(&a));
        assert_ne!(operator_ether_address(&a), operator_ether_address(&b));
        assert_eq!(operator_ether_address(&a).len(), 20);
    }

    fn sample_eth_tx() -> EthTx {
        use solana_sdk::keccak;
        let key = libsecp256k1::SecretKey::parse(&[9u8; 32]).unwrap();
        let chain_id = 245_022_940u64;
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&1u64);
        unsigned.append(&1_000_000_000u64);
        unsigned.append(&21_000u64);
        unsigned.append_empty_data();
        unsigned.append(&0u64);
        unsigned.append_empty_data();
        unsigned.append(&chain_id);
        unsigned.append_empty_data();
        unsigned.append_empty_data();
        let hash = keccak::hash(&unsigned.out()).to_bytes();

        let message = libsecp256k1::Message::parse(&hash);
        let (signature, recovery_id) = libsecp256k1::sign(&message, &key);
        let sig_bytes = signature.serialize();
        let v = chain_id * 2 + 35 + u64::from(recovery_id.serialize());

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&1u64);
        signed.append(&1_000_000_000u64);
        signed.append(&21_000u64);
        signed.append_empty_data();
        signed.append(&0u64);
        signed.append_empty_data();
        signed.append(&v);
        signed.append(&sig_bytes[0..32].to_vec());
        signed.append(&sig_bytes[32..64].to_vec());
        EthTx::from_rlp(&signed.out()).unwrap()
    }

    /// §8 property 3 — instruction bytes are a pure function of
    /// `(opcode, tx_sig, treasury_pool_index, payload)`; re-building yields
    /// identical bytes, and there is no spurious length prefix before the
    /// trailing payload (a bincode-derived encoding would add one).
    #[test]
    fn tx_exec_from_data_layout_is_bit_exact() {
        let eth_tx = sample_eth_tx();
        let builder = IxBuilder::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            42,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        );
        let ix = builder.make_tx_exec_from_data_ix(&eth_tx, &[]);

        let mut expected = vec![Opcode::TxExecFromData as u8];
        expected.extend_from_slice(&42u32.to_le_bytes());
        expected.extend_from_slice(eth_tx.raw_rlp());
        assert_eq!(ix.data, expected);

        let ix2 = builder.make_tx_exec_from_data_ix(&eth_tx, &[]);
        assert_eq!(ix.data, ix2.data);
    }

    #[test]
    fn holder_write_layout_is_bit_exact() {
        let builder = IxBuilder::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            0,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        );
        let tx_sig = [5u8; 32];
        let chunk = vec![1, 2, 3, 4, 5];
        let ix = builder.make_holder_write_ix(tx_sig, 128, &chunk);

        let mut expected = vec![Opcode::HolderWrite as u8];
        expected.extend_from_slice(&tx_sig);
        expected.extend_from_slice(&128u64.to_le_bytes());
        expected.extend_from_slice(&chunk);
        assert_eq!(ix.data, expected);
    }

    #[test]
    fn cancel_with_hash_layout_is_bit_exact() {
        let builder = IxBuilder::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            0,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        );
        let tx_sig = [9u8; 32];
        let ix = builder.make_cancel_ix(tx_sig, &[]);

        let mut expected = vec![Opcode::CancelWithHash as u8];
        expected.extend_from_slice(&tx_sig);
        assert_eq!(ix.data, expected);
    }
}
