//! Address Lookup Table instructions (§4.4 ALT-family strategies): built
//! against the Chain's native ALT program, `AddressLookupTable1111...`, not
//! the Chain-Instruction program. Opcodes follow that program's wire
//! format directly.
use solana_sdk::{
    clock::Slot,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    pubkey,
    system_program,
};

const ADDRESS_LOOKUP_TABLE_PROGRAM_ID: Pubkey = pubkey!("AddressLookupTab1e1111111111111111111111111");

/// Byte offset where an ALT account's address list begins, per the Chain's
/// ALT program account layout: a fixed-size header followed by a packed
/// `Pubkey` array.
const ALT_ACCOUNT_ADDRESSES_OFFSET: usize = 56;

#[derive(Debug, Clone, Copy)]
#[repr(u32)]
enum AltOpcode {
    Create = 0,
    Extend = 2,
    Deactivate = 3,
    Close = 4,
}

/// Derives the ALT's address the same way the Chain's ALT program does:
/// `PDA([authority, recent_slot_le], alt_program_id)`.
#[must_use]
pub fn derive_table_address(authority: &Pubkey, recent_slot: Slot) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[authority.as_ref(), &recent_slot.to_le_bytes()],
        &ADDRESS_LOOKUP_TABLE_PROGRAM_ID,
    )
}

#[must_use]
pub fn make_create_lookup_table_ix(
    authority: &Pubkey,
    payer: &Pubkey,
    recent_slot: Slot,
) -> (Instruction, Pubkey) {
    let (table_address, bump_seed) = derive_table_address(authority, recent_slot);
    let accounts = vec![
        AccountMeta::new(table_address, false),
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    let data = (AltOpcode::Create as u32, recent_slot, bump_seed);
    (Instruction::new_with_bincode(ADDRESS_LOOKUP_TABLE_PROGRAM_ID, &data, accounts), table_address)
}

#[must_use]
pub fn make_extend_lookup_table_ix(
    table_address: &Pubkey,
    authority: &Pubkey,
    payer: &Pubkey,
    new_addresses: &[Pubkey],
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*table_address, false),
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    let data = (AltOpcode::Extend as u32, new_addresses.to_vec());
    Instruction::new_with_bincode(ADDRESS_LOOKUP_TABLE_PROGRAM_ID, &data, accounts)
}

#[must_use]
pub fn make_deactivate_lookup_table_ix(table_address: &Pubkey, authority: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*table_address, false),
        AccountMeta::new_readonly(*authority, true),
    ];
    Instruction::new_with_bincode(ADDRESS_LOOKUP_TABLE_PROGRAM_ID, &(AltOpcode::Deactivate as u32,), accounts)
}

#[must_use]
pub fn make_close_lookup_table_ix(table_address: &Pubkey, authority: &Pubkey, recipient: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*table_address, false),
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(*recipient, false),
    ];
    Instruction::new_with_bincode(ADDRESS_LOOKUP_TABLE_PROGRAM_ID, &(AltOpcode::Close as u32,), accounts)
}

/// Deserializes the raw account data returned by [`crate::chain_rpc::Rpc`]
/// into the list of addresses an ALT-family strategy needs to validate
/// against its `ExecCfg::accounts_touched`. Skips the fixed-size ALT
/// program header and reads the trailing packed `Pubkey` array directly;
/// avoids a dependency on the ALT program's own account crate for what is
/// otherwise a fixed, stable layout.
pub fn parse_table_addresses(data: &[u8]) -> Result<Vec<Pubkey>, &'static str> {
    if data.len() < ALT_ACCOUNT_ADDRESSES_OFFSET {
        return Err("address lookup table account data shorter than header");
    }
    let body = &data[ALT_ACCOUNT_ADDRESSES_OFFSET..];
    if body.len() % 32 != 0 {
        return Err("address lookup table account data not a whole number of pubkeys");
    }
    Ok(body
        .chunks_exact(32)
        .map(|chunk| {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(chunk);
            Pubkey::from(bytes)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_address_is_deterministic_for_same_slot() {
        let authority = Pubkey::new_unique();
        let (addr1, _) = derive_table_address(&authority, 1_000);
        let (addr2, _) = derive_table_address(&authority, 1_000);
        assert_eq!(addr1, addr2);

        let (addr3, _) = derive_table_address(&authority, 1_001);
        assert_ne!(addr1, addr3);
    }
}
