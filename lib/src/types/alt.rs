//! Address Lookup Table bookkeeping (§4.4 ALT-family strategies): tracks
//! the table an `ExecCtx` created against the Chain's native ALT program so
//! the ladder knows whether it can extend or must deactivate-and-close it.
use solana_sdk::{clock::Slot, pubkey::Pubkey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltState {
    Active,
    Deactivated,
    Closed,
}

#[derive(Debug, Clone)]
pub struct AddressLookupTable {
    pub table_account: Pubkey,
    pub authority: Pubkey,
    pub last_extended_slot: Slot,
    pub deactivation_slot: Option<Slot>,
    pub state: AltState,
    /// The addresses actually extended into the on-chain table so far, in
    /// the order the Chain's ALT program stored them — what
    /// `v0::Message::try_compile` needs to resolve a tx's references into
    /// lookup indices instead of raw keys.
    pub addresses: Vec<Pubkey>,
}

impl AddressLookupTable {
    #[must_use]
    pub fn new(table_account: Pubkey, authority: Pubkey, created_at_slot: Slot) -> Self {
        Self {
            table_account,
            authority,
            last_extended_slot: created_at_slot,
            deactivation_slot: None,
            state: AltState::Active,
            addresses: Vec::new(),
        }
    }

    /// Records `new_addresses` as extended into the table at `slot`. Skips
    /// any already present — `ExtendLookupTable` is itself idempotent on
    /// duplicates, so the bookkeeping mirrors that.
    pub fn extend(&mut self, new_addresses: &[Pubkey], slot: Slot) {
        debug_assert_eq!(self.state, AltState::Active, "extending a non-active ALT");
        for address in new_addresses {
            if !self.addresses.contains(address) {
                self.addresses.push(*address);
            }
        }
        self.last_extended_slot = slot;
    }

    pub fn deactivate(&mut self, slot: Slot) {
        self.state = AltState::Deactivated;
        self.deactivation_slot = Some(slot);
    }

    /// The Chain's ALT program enforces a cooldown between deactivation and
    /// close; `current_slot` must be at least `min_cooldown_slots` past
    /// `deactivation_slot` before `Close` is legal.
    #[must_use]
    pub fn closeable_at(&self, current_slot: Slot, min_cooldown_slots: u64) -> bool {
        match self.deactivation_slot {
            Some(deactivated_at) => current_slot >= deactivated_at.saturating_add(min_cooldown_slots),
            None => false,
        }
    }

    pub fn close(&mut self) {
        self.state = AltState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_closeable_before_cooldown_elapses() {
        let mut alt = AddressLookupTable::new(Pubkey::new_unique(), Pubkey::new_unique(), 100);
        alt.deactivate(200);
        assert!(!alt.closeable_at(250, 100));
        assert!(alt.closeable_at(300, 100));
    }

    #[test]
    fn not_closeable_while_active() {
        let alt = AddressLookupTable::new(Pubkey::new_unique(), Pubkey::new_unique(), 100);
        assert!(!alt.closeable_at(1_000_000, 0));
    }
}
