//! C4: subset-sum search over `(id, cents)` items — item capping, MITM
//! primary, DP fallback, post-verification. All amounts here are
//! assumed to already share one sign with the target (spec §4.4); the
//! engine itself works in absolute cents internally.

use std::collections::HashMap;

use crate::config::Limits;
use crate::model::RowId;

#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub id: RowId,
    pub cents: i64,
}

/// Group by `cents`, cap each group at
/// `min(count, max(1, |target|/max(1,|c|)), CAP_PER_VALUE)`, sort the
/// capped list by `|cents|` descending, truncate to `KSUM_MAX_ITEMS`.
pub fn cap_items(target_cents: i64, items: &[Item], limits: &Limits) -> Vec<Item> {
    let mut by_value: HashMap<i64, Vec<Item>> = HashMap::new();
    for item in items {
        by_value.entry(item.cents).or_default().push(*item);
    }

    let target_abs = target_cents.unsigned_abs().max(1) as i64;
    let mut capped = Vec::new();
    for (cents, mut group) in by_value {
        let c_abs = cents.unsigned_abs().max(1) as i64;
        let cap = (group.len() as i64)
            .min((target_abs / c_abs).max(1))
            .min(limits.cap_per_value as i64) as usize;
        group.truncate(cap);
        capped.extend(group);
    }

    capped.sort_by(|a, b| b.cents.abs().cmp(&a.cents.abs()).then(a.id.cmp(&b.id)));
    capped.truncate(limits.ksum_max_items);
    capped
}

/// `target_cents` and every item's cents share a sign (or are zero).
/// Returns `None` if no subset of the capped items sums to target.
pub fn solve(target_cents: i64, items: &[Item], limits: &Limits) -> Option<Vec<RowId>> {
    if target_cents == 0 || items.is_empty() {
        return None;
    }

    let capped = cap_items(target_cents, items, limits);
    if capped.is_empty() {
        return None;
    }

    if let Some(ids) = mitm_search(target_cents, &capped, limits) {
        if verify(target_cents, &ids, &capped) {
            return Some(ids);
        }
    }

    if target_cents.unsigned_abs() as i64 <= limits.dp_max_target_cents && capped.len() <= limits.dp_max_items_dp {
        if let Some(ids) = dp_search(target_cents, &capped) {
            if verify(target_cents, &ids, &capped) {
                return Some(ids);
            }
        }
    }

    None
}

fn verify(target_cents: i64, ids: &[RowId], items: &[Item]) -> bool {
    let by_id: HashMap<RowId, i64> = items.iter().map(|i| (i.id, i.cents)).collect();
    ids.iter().map(|id| by_id.get(id).copied().unwrap_or(0)).sum::<i64>() == target_cents
}

/// Meet-in-the-middle. Shrinks the working item count by twos until
/// `2^(n/2) <= MITM_STATE_BUDGET`, enumerates all subsets of the left
/// half, hash-joins against the right half's sum -> min-cardinality-ids
/// map.
fn mitm_search(target_cents: i64, items: &[Item], limits: &Limits) -> Option<Vec<RowId>> {
    let mut n = items.len();
    while n > 0 && pow2_half_exceeds_budget(n, limits.mitm_state_budget) {
        n -= 2;
    }
    if n == 0 {
        return None;
    }
    let working = &items[..n];
    let mid = working.len() / 2;
    let (left, right) = working.split_at(mid);

    let mut right_map: HashMap<i64, Vec<RowId>> = HashMap::new();
    for mask in 0u32..(1u32 << right.len()) {
        let mut sum = 0i64;
        let mut ids = Vec::new();
        for (i, item) in right.iter().enumerate() {
            if mask & (1 << i) != 0 {
                sum += item.cents;
                ids.push(item.id);
            }
        }
        match right_map.get(&sum) {
            Some(existing) if existing.len() <= ids.len() => {}
            _ => {
                right_map.insert(sum, ids);
            }
        }
    }

    for mask in 0u32..(1u32 << left.len()) {
        let mut sum = 0i64;
        let mut ids = Vec::new();
        for (i, item) in left.iter().enumerate() {
            if mask & (1 << i) != 0 {
                sum += item.cents;
                ids.push(item.id);
            }
        }
        let needed = target_cents - sum;
        if let Some(right_ids) = right_map.get(&needed) {
            if ids.is_empty() && right_ids.is_empty() {
                continue;
            }
            ids.extend(right_ids.iter().copied());
            return Some(ids);
        }
    }
    None
}

fn pow2_half_exceeds_budget(n: usize, budget: usize) -> bool {
    let half = n / 2;
    if half >= usize::BITS as usize {
        return true;
    }
    (1usize << half) > budget
}

/// Classic 0/1 subset-sum DP over absolute cents, with a parent table
/// for path reconstruction. Guarded by `DP_MAX_TARGET_CENTS` /
/// `DP_MAX_ITEMS_DP` by the caller.
fn dp_search(target_cents: i64, items: &[Item]) -> Option<Vec<RowId>> {
    let target_abs = target_cents.unsigned_abs() as usize;
    // DP operates on |cents| of items that share target's sign; zero-cents
    // items can never change the achievable set, skip them.
    let values: Vec<(i64, usize)> = items
        .iter()
        .filter(|i| i.cents != 0)
        .map(|i| (i.id as i64, i.cents.unsigned_abs() as usize))
        .collect();

    // reachable[s] = Some(index into `values` used to first reach s), -1 = start
    let mut reachable: Vec<Option<usize>> = vec![None; target_abs + 1];
    let mut prev_sum: Vec<Option<usize>> = vec![None; target_abs + 1];
    reachable[0] = Some(usize::MAX); // sentinel: reachable with zero items
    for (idx, (_, cents_abs)) in values.iter().enumerate() {
        if *cents_abs == 0 || *cents_abs > target_abs {
            continue;
        }
        for s in (*cents_abs..=target_abs).rev() {
            if reachable[s].is_none() && reachable[s - cents_abs].is_some() {
                reachable[s] = Some(idx);
                prev_sum[s] = Some(s - cents_abs);
            }
        }
    }

    reachable[target_abs]?;
    let mut ids = Vec::new();
    let mut s = target_abs;
    while s > 0 {
        let idx = reachable[s]?;
        if idx == usize::MAX {
            break;
        }
        ids.push(values[idx].0 as RowId);
        s = prev_sum[s]?;
    }
    Some(ids)
}
