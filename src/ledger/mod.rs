//! Ledger primitives consumed by the voting and change logic.
//!
//! The real state tree lives outside this crate; it is reached through the
//! narrow [`EntryCache`] and [`AccountRoots`] traits. [`LedgerState`] is an
//! in-memory implementation of both, used by the command front-end and the
//! tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];
pub type Amount = u64;
pub type LedgerIndex = u32;
pub type EntryKey = Hash;

pub const ZERO_HASH: Hash = [0u8; 32];
pub const SECONDS_PER_DAY: u64 = 86_400;

/// 160-bit account identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    pub const ZERO: AccountId = AccountId([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s.trim(), &mut bytes)?;
        Ok(AccountId(bytes))
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(serde::de::Error::custom)
    }
}

/// Hex encoding for 32-byte hashes in JSON.
pub mod serde_hash {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Hash;

    pub fn serialize<S>(value: &Hash, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Hash, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(encoded.trim(), &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    AccountRoot,
    Amendments,
    FeeSettings,
    Dividend,
}

fn index(space: &[u8], data: &[u8]) -> EntryKey {
    let mut hasher = Sha256::new();
    hasher.update(space);
    hasher.update(data);
    hasher.finalize().into()
}

pub fn account_root_index(account: &AccountId) -> EntryKey {
    index(b"acct", &account.0)
}

pub fn amendments_index() -> EntryKey {
    index(b"amendments", &[])
}

pub fn fee_index() -> EntryKey {
    index(b"fee", &[])
}

pub fn dividend_index() -> EntryKey {
    index(b"dividend", &[])
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRoot {
    pub account: AccountId,
    pub balance: Amount,
    #[serde(default)]
    pub sequence: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendments {
    #[serde(default, with = "serde_hash_vec")]
    pub amendments: Vec<Hash>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSettings {
    pub base_fee: u64,
    pub reference_fee_units: u32,
    pub reserve_base: u32,
    pub reserve_increment: u32,
}

/// Singleton record of the last dividend applied to the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub dividend_time: u32,
    pub total_coins: u64,
    pub total_coins_secondary: u64,
}

mod serde_hash_vec {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Hash;

    pub fn serialize<S>(value: &[Hash], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(value.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Hash>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| {
                let mut out = [0u8; 32];
                hex::decode_to_slice(s.trim(), &mut out).map_err(D::Error::custom)?;
                Ok(out)
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    AccountRoot(AccountRoot),
    Amendments(Amendments),
    FeeSettings(FeeSettings),
    Dividend(DividendRecord),
}

impl LedgerEntry {
    /// Empty entry of the given type, as produced by `create`.
    pub fn new(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::AccountRoot => LedgerEntry::AccountRoot(AccountRoot::default()),
            EntryType::Amendments => LedgerEntry::Amendments(Amendments::default()),
            EntryType::FeeSettings => LedgerEntry::FeeSettings(FeeSettings::default()),
            EntryType::Dividend => LedgerEntry::Dividend(DividendRecord::default()),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            LedgerEntry::AccountRoot(_) => EntryType::AccountRoot,
            LedgerEntry::Amendments(_) => EntryType::Amendments,
            LedgerEntry::FeeSettings(_) => EntryType::FeeSettings,
            LedgerEntry::Dividend(_) => EntryType::Dividend,
        }
    }

    /// Canonical key of the entry, derived from its content.
    pub fn key(&self) -> EntryKey {
        match self {
            LedgerEntry::AccountRoot(root) => account_root_index(&root.account),
            LedgerEntry::Amendments(_) => amendments_index(),
            LedgerEntry::FeeSettings(_) => fee_index(),
            LedgerEntry::Dividend(_) => dividend_index(),
        }
    }
}

/// Typed view over one [`LedgerEntry`] variant.
pub trait Entry: Default {
    const TYPE: EntryType;

    fn from_entry(entry: LedgerEntry) -> Option<Self>;

    fn into_entry(self) -> LedgerEntry;
}

macro_rules! entry {
    ($variant:ident, $ty:ty) => {
        impl Entry for $ty {
            const TYPE: EntryType = EntryType::$variant;

            fn from_entry(entry: LedgerEntry) -> Option<Self> {
                match entry {
                    LedgerEntry::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_entry(self) -> LedgerEntry {
                LedgerEntry::$variant(self)
            }
        }
    };
}

entry!(AccountRoot, AccountRoot);
entry!(Amendments, Amendments);
entry!(FeeSettings, FeeSettings);
entry!(Dividend, DividendRecord);

/// Read/create/write access to ledger entries during transaction apply.
///
/// Entries are handed out as owned copies; nothing is written back until
/// [`EntryCache::mark_modified`] is called.
pub trait EntryCache {
    fn fetch(&self, entry_type: EntryType, key: &EntryKey) -> Option<LedgerEntry>;

    fn create(&mut self, entry_type: EntryType, key: EntryKey) -> LedgerEntry;

    fn mark_modified(&mut self, key: EntryKey, entry: LedgerEntry);

    fn fetch_as<E: Entry>(&self, key: &EntryKey) -> Option<E>
    where
        Self: Sized,
    {
        self.fetch(E::TYPE, key).and_then(E::from_entry)
    }

    fn fetch_or_create<E: Entry>(&mut self, key: EntryKey) -> E
    where
        Self: Sized,
    {
        match self.fetch_as::<E>(&key) {
            Some(entry) => entry,
            None => E::from_entry(self.create(E::TYPE, key)).unwrap_or_default(),
        }
    }

    fn persist<E: Entry>(&mut self, key: EntryKey, entry: E)
    where
        Self: Sized,
    {
        self.mark_modified(key, entry.into_entry());
    }
}

/// Full scan over the account roots of a ledger.
pub trait AccountRoots {
    fn for_each_account_root(&self, visitor: &mut dyn FnMut(&AccountId, Amount));
}

/// Header of a closed ledger, as seen by the voting logic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub seq: LedgerIndex,
    #[serde(with = "serde_hash")]
    pub hash: Hash,
    #[serde(with = "serde_hash")]
    pub parent_hash: Hash,
    pub dividend_time: u32,
    pub total_coins: u64,
    pub total_coins_secondary: u64,
}

/// In-memory ledger state keyed by entry index.
#[derive(Clone, Debug, Default)]
pub struct LedgerState {
    pub seq: LedgerIndex,
    pub parent_hash: Hash,
    entries: BTreeMap<EntryKey, LedgerEntry>,
    modified: BTreeSet<EntryKey>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(
        seq: LedgerIndex,
        parent_hash: Hash,
        entries: impl IntoIterator<Item = LedgerEntry>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.key(), entry))
            .collect();
        Self {
            seq,
            parent_hash,
            entries,
            modified: BTreeSet::new(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    pub fn credit_account(&mut self, account: &AccountId, amount: Amount) {
        let key = account_root_index(account);
        let entry = self.entries.entry(key).or_insert_with(|| {
            LedgerEntry::AccountRoot(AccountRoot {
                account: *account,
                ..AccountRoot::default()
            })
        });
        if let LedgerEntry::AccountRoot(root) = entry {
            root.balance = root.balance.saturating_add(amount);
        }
    }

    pub fn balance(&self, account: &AccountId) -> Option<Amount> {
        self.fetch_as::<AccountRoot>(&account_root_index(account))
            .map(|root| root.balance)
    }

    pub fn dividend(&self) -> Option<DividendRecord> {
        self.fetch_as(&dividend_index())
    }

    pub fn amendments(&self) -> Option<Amendments> {
        self.fetch_as(&amendments_index())
    }

    pub fn fees(&self) -> Option<FeeSettings> {
        self.fetch_as(&fee_index())
    }

    /// Keys written since construction or the last [`LedgerState::clear_modified`].
    pub fn modified(&self) -> &BTreeSet<EntryKey> {
        &self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    pub fn state_root(&self) -> Hash {
        compute_merkle_root(&self.entries)
    }

    /// Close the ledger and return its header.
    pub fn header(&self) -> LedgerHeader {
        let dividend = self.dividend().unwrap_or_default();
        let state_root = self.state_root();

        let mut hasher = Sha256::new();
        hasher.update(b"ledger");
        hasher.update(self.seq.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(state_root);
        hasher.update(dividend.dividend_time.to_le_bytes());
        hasher.update(dividend.total_coins.to_le_bytes());
        hasher.update(dividend.total_coins_secondary.to_le_bytes());

        LedgerHeader {
            seq: self.seq,
            hash: hasher.finalize().into(),
            parent_hash: self.parent_hash,
            dividend_time: dividend.dividend_time,
            total_coins: dividend.total_coins,
            total_coins_secondary: dividend.total_coins_secondary,
        }
    }

    /// Open the successor of this ledger with the same state.
    pub fn successor(&self) -> LedgerState {
        LedgerState {
            seq: self.seq + 1,
            parent_hash: self.header().hash,
            entries: self.entries.clone(),
            modified: BTreeSet::new(),
        }
    }
}

impl EntryCache for LedgerState {
    fn fetch(&self, entry_type: EntryType, key: &EntryKey) -> Option<LedgerEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.entry_type() == entry_type)
            .cloned()
    }

    fn create(&mut self, entry_type: EntryType, key: EntryKey) -> LedgerEntry {
        let entry = LedgerEntry::new(entry_type);
        self.entries.insert(key, entry.clone());
        self.modified.insert(key);
        entry
    }

    fn mark_modified(&mut self, key: EntryKey, entry: LedgerEntry) {
        self.entries.insert(key, entry);
        self.modified.insert(key);
    }
}

impl AccountRoots for LedgerState {
    fn for_each_account_root(&self, visitor: &mut dyn FnMut(&AccountId, Amount)) {
        for entry in self.entries.values() {
            if let LedgerEntry::AccountRoot(root) = entry {
                visitor(&root.account, root.balance);
            }
        }
    }
}

fn compute_merkle_root(entries: &BTreeMap<EntryKey, LedgerEntry>) -> Hash {
    let leaves = entries
        .iter()
        .map(|(key, entry)| {
            let mut hasher = Sha256::new();
            hasher.update(b"entry");
            hasher.update(key);
            match entry {
                LedgerEntry::AccountRoot(root) => {
                    hasher.update(root.account.0);
                    hasher.update(root.balance.to_le_bytes());
                    hasher.update(root.sequence.to_le_bytes());
                }
                LedgerEntry::Amendments(list) => {
                    hasher.update((list.amendments.len() as u64).to_le_bytes());
                    for amendment in &list.amendments {
                        hasher.update(amendment);
                    }
                }
                LedgerEntry::FeeSettings(fees) => {
                    hasher.update(fees.base_fee.to_le_bytes());
                    hasher.update(fees.reference_fee_units.to_le_bytes());
                    hasher.update(fees.reserve_base.to_le_bytes());
                    hasher.update(fees.reserve_increment.to_le_bytes());
                }
                LedgerEntry::Dividend(record) => {
                    hasher.update(record.dividend_time.to_le_bytes());
                    hasher.update(record.total_coins.to_le_bytes());
                    hasher.update(record.total_coins_secondary.to_le_bytes());
                }
            }
            hasher.finalize().into()
        })
        .collect();
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<Hash>) -> Hash {
    if leaves.is_empty() {
        return Sha256::digest(b"ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId {
        AccountId([byte; 20])
    }

    #[test]
    fn state_root_is_deterministic() {
        let mut ledger = LedgerState::new();
        ledger.credit_account(&account(1), 1_000);
        ledger.credit_account(&account(2), 2_000);
        let root1 = ledger.state_root();
        let root2 = ledger.clone().state_root();
        assert_eq!(root1, root2);

        ledger.credit_account(&account(2), 1);
        assert_ne!(root1, ledger.state_root());
    }

    #[test]
    fn fetch_or_create_creates_empty_singleton() {
        let mut ledger = LedgerState::new();
        let record: DividendRecord = ledger.fetch_or_create(dividend_index());
        assert_eq!(record, DividendRecord::default());
        assert!(ledger.modified().contains(&dividend_index()));
    }

    #[test]
    fn fetch_ignores_mismatched_type() {
        let mut ledger = LedgerState::new();
        ledger.persist(fee_index(), FeeSettings::default());
        assert!(ledger.fetch(EntryType::Dividend, &fee_index()).is_none());
        assert!(ledger.fetch(EntryType::FeeSettings, &fee_index()).is_some());
    }

    #[test]
    fn header_reflects_dividend_record() {
        let mut ledger = LedgerState::new();
        ledger.persist(
            dividend_index(),
            DividendRecord {
                dividend_time: 100,
                total_coins: 5_000,
                total_coins_secondary: 70,
            },
        );
        let header = ledger.header();
        assert_eq!(header.dividend_time, 100);
        assert_eq!(header.total_coins, 5_000);
        assert_eq!(header.total_coins_secondary, 70);

        let next = ledger.successor();
        assert_eq!(next.seq, 1);
        assert_eq!(next.parent_hash, header.hash);
    }

    #[test]
    fn account_id_round_trips_through_json() {
        let id = account(0xab);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn account_roots_are_visited() {
        let mut ledger = LedgerState::new();
        ledger.credit_account(&account(1), 10);
        ledger.credit_account(&account(2), 20);
        ledger.persist(fee_index(), FeeSettings::default());

        let mut seen = Vec::new();
        ledger.for_each_account_root(&mut |id, balance| seen.push((*id, balance)));
        seen.sort();
        assert_eq!(seen, vec![(account(1), 10), (account(2), 20)]);
    }
}
