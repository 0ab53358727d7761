//! Dividend issuance and rank-proportional distribution.
//!
//! All arithmetic is integer-only so every validator computes identical
//! balances.

use tracing::{debug, info};

use crate::ledger::{
    account_root_index, dividend_index, AccountId, AccountRoot, AccountRoots, Amount,
    DividendRecord, EntryCache,
};

/// Primary issuance: 0.3% of the total supply.
pub const ISSUANCE_NUM: u128 = 3;
pub const ISSUANCE_DEN: u128 = 1_000;

/// Secondary issuance: 0.03% of the secondary supply.
pub const SECONDARY_ISSUANCE_NUM: u128 = 3;
pub const SECONDARY_ISSUANCE_DEN: u128 = 10_000;

/// Amounts issued by one dividend for the given supplies.
pub fn issuance(total_coins: u64, total_coins_secondary: u64) -> (Amount, Amount) {
    let primary = total_coins as u128 * ISSUANCE_NUM / ISSUANCE_DEN;
    let secondary = total_coins_secondary as u128 * SECONDARY_ISSUANCE_NUM / SECONDARY_ISSUANCE_DEN;
    (primary as Amount, secondary as Amount)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedAccount {
    pub account: AccountId,
    pub balance: Amount,
    pub rank: u32,
}

/// Competition ranking by ascending balance.
///
/// The poorest account gets rank 1 and the rank grows by one each time the
/// balance strictly increases. Equal balances are ordered by account id.
/// Returns the ranked accounts together with the sum of all ranks.
pub fn compute_ranks(mut accounts: Vec<(AccountId, Amount)>) -> (Vec<RankedAccount>, u64) {
    accounts.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut ranked = Vec::with_capacity(accounts.len());
    let mut total_part = 0u64;
    let mut rank = 0u32;
    let mut previous: Option<Amount> = None;
    for (account, balance) in accounts {
        match previous {
            Some(prev) if balance <= prev => {}
            _ => rank += 1,
        }
        previous = Some(balance);
        total_part += rank as u64;
        ranked.push(RankedAccount {
            account,
            balance,
            rank,
        });
    }
    (ranked, total_part)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub account: AccountId,
    pub amount: Amount,
}

/// Split `dividend` across `accounts` in proportion to rank.
///
/// The root account and accounts whose share truncates to zero receive
/// nothing. An empty account list yields no payouts.
pub fn compute_payouts(
    accounts: Vec<(AccountId, Amount)>,
    dividend: Amount,
    root: &AccountId,
) -> Vec<Payout> {
    let (ranked, total_part) = compute_ranks(accounts);
    if total_part == 0 {
        return Vec::new();
    }

    ranked
        .into_iter()
        .filter(|entry| entry.account != *root)
        .filter_map(|entry| {
            let amount = (dividend as u128 * entry.rank as u128 / total_part as u128) as Amount;
            (amount > 0).then_some(Payout {
                account: entry.account,
                amount,
            })
        })
        .collect()
}

/// Apply a dividend transaction: update the dividend record, then credit
/// every eligible account.
pub(super) fn apply<L: EntryCache + AccountRoots>(
    ledger: &mut L,
    total_coins: u64,
    total_coins_secondary: u64,
    today: u32,
    root: &AccountId,
) -> Vec<Payout> {
    let key = dividend_index();
    let mut record: DividendRecord = ledger.fetch_or_create(key);
    info!(?record, "previous dividend object");

    let (amount, amount_secondary) = issuance(total_coins, total_coins_secondary);
    record.dividend_time = today;
    record.total_coins = total_coins.saturating_add(amount);
    record.total_coins_secondary = total_coins_secondary.saturating_add(amount_secondary);
    ledger.persist(key, record.clone());
    info!(?record, amount, amount_secondary, "current dividend object");

    let mut accounts = Vec::new();
    ledger.for_each_account_root(&mut |account, balance| accounts.push((*account, balance)));
    if accounts.is_empty() {
        info!("no accounts to receive dividend");
        return Vec::new();
    }

    let payouts = compute_payouts(accounts, amount, root);
    let mut credited = Vec::with_capacity(payouts.len());
    for payout in payouts {
        let index = account_root_index(&payout.account);
        let Some(mut account) = ledger.fetch_as::<AccountRoot>(&index) else {
            debug!(account = %payout.account, "account vanished before payout");
            continue;
        };
        account.balance = account.balance.saturating_add(payout.amount);
        ledger.persist(index, account);
        debug!(account = %payout.account, amount = payout.amount, "dividend paid");
        credited.push(payout);
    }
    credited
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId {
        AccountId([byte; 20])
    }

    #[test]
    fn issuance_is_fixed_point() {
        assert_eq!(issuance(1_000_000, 1_000_000), (3_000, 300));
        assert_eq!(issuance(999, 9_999), (2, 2));
        assert_eq!(issuance(u64::MAX, 0).0, (u64::MAX as u128 * 3 / 1_000) as u64);
    }

    #[test]
    fn competition_ranks() {
        let (ranked, total_part) = compute_ranks(vec![
            (account(4), 30),
            (account(1), 10),
            (account(3), 20),
            (account(2), 10),
        ]);
        let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 1, 2, 3]);
        assert_eq!(total_part, 7);
        let order: Vec<AccountId> = ranked.iter().map(|r| r.account).collect();
        assert_eq!(order, vec![account(1), account(2), account(3), account(4)]);
    }

    #[test]
    fn ranks_ignore_input_order() {
        let forward = vec![(account(1), 5), (account(2), 5), (account(3), 9)];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(compute_ranks(forward), compute_ranks(backward));
    }

    #[test]
    fn payouts_follow_rank() {
        let payouts = compute_payouts(
            vec![
                (account(1), 10),
                (account(2), 10),
                (account(3), 20),
                (account(4), 30),
            ],
            700,
            &AccountId::ZERO,
        );
        let amounts: Vec<(AccountId, Amount)> =
            payouts.iter().map(|p| (p.account, p.amount)).collect();
        assert_eq!(
            amounts,
            vec![
                (account(1), 100),
                (account(2), 100),
                (account(3), 200),
                (account(4), 300),
            ]
        );
    }

    #[test]
    fn root_is_excluded_even_at_top_rank() {
        let root = account(9);
        let payouts = compute_payouts(vec![(account(1), 10), (root, 1_000)], 300, &root);
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].account, account(1));
        assert_eq!(payouts[0].amount, 100);
    }

    #[test]
    fn zero_shares_are_skipped() {
        // total_part = 1 + 2 = 3; rank 1 gets 2 / 3 = 0.
        let payouts = compute_payouts(vec![(account(1), 1), (account(2), 2)], 2, &AccountId::ZERO);
        assert_eq!(
            payouts,
            vec![Payout {
                account: account(2),
                amount: 1,
            }]
        );
    }

    #[test]
    fn empty_ledger_has_no_payouts() {
        assert!(compute_payouts(Vec::new(), 1_000, &AccountId::ZERO).is_empty());
    }
}
