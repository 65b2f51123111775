//! `M2_KSUM_SAME_DAY`: for each `(tenant, bank, acc_tail, sign, date)`
//! partition, run an N:1 pass (each ERP row as target against remaining
//! APIs) then a 1:N pass (each API row as target against remaining
//! ERPs), sharing `used_api`/`used_erp` across both passes (spec §4.5,
//! §9 open question: N:1 before 1:N is intentional order-dependence).
//! API rows with `is_rent = true` never participate.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use super::{account_key, Working};
use crate::model::{ApiRow, Edge, ErpRow, RowId, StageName};
use crate::subset_sum::{self, Item};

type PartitionKey = ((String, String, String), i64, NaiveDate);

pub fn same_day(working: &Working) -> Vec<Edge> {
    let limits = working.limits;

    let mut api_groups: BTreeMap<PartitionKey, Vec<&ApiRow>> = BTreeMap::new();
    for row in working.residual_api().filter(|r| !r.flags.is_rent()) {
        let key = (
            account_key(&row.tenant_id, &row.bank_code, &row.acc_tail),
            row.api_sign(),
            row.api_date,
        );
        api_groups.entry(key).or_default().push(row);
    }

    let mut erp_groups: BTreeMap<PartitionKey, Vec<&ErpRow>> = BTreeMap::new();
    for row in working.residual_erp() {
        let key = (
            account_key(&row.tenant_id, &row.bank_code, &row.acc_tail),
            row.erp_sign(),
            row.erp_date,
        );
        erp_groups.entry(key).or_default().push(row);
    }

    let mut edges = Vec::new();
    for (key, mut api_rows) in api_groups {
        let Some(erp_rows) = erp_groups.get(&key) else { continue };
        let mut erp_rows = erp_rows.clone();

        // Oversized partitions are trimmed to the top KSUM_MAX_ITEMS by
        // |cents| before running KSUM (spec §7 OversizedPartition).
        if api_rows.len() + erp_rows.len() > limits.max_group_guard {
            api_rows.sort_by_key(|r| std::cmp::Reverse(r.api_cents.abs()));
            api_rows.truncate(limits.ksum_max_items);
            erp_rows.sort_by_key(|r| std::cmp::Reverse(r.erp_cents.abs()));
            erp_rows.truncate(limits.ksum_max_items);
        }

        let mut used_api: HashSet<RowId> = HashSet::new();
        let mut used_erp: HashSet<RowId> = HashSet::new();

        // Pass 1: N:1, each ERP row as target against remaining APIs.
        let mut erp_by_amount: Vec<&ErpRow> = erp_rows.clone();
        erp_by_amount.sort_by(|a, b| b.erp_cents.abs().cmp(&a.erp_cents.abs()).then(a.erp_row_id.cmp(&b.erp_row_id)));
        for target in &erp_by_amount {
            if used_erp.contains(&target.erp_row_id) {
                continue;
            }
            let items: Vec<Item> = api_rows
                .iter()
                .filter(|r| !used_api.contains(&r.api_row_id))
                .map(|r| Item { id: r.api_row_id, cents: r.api_cents })
                .collect();
            if let Some(ids) = subset_sum::solve(target.erp_cents, &items, limits) {
                used_erp.insert(target.erp_row_id);
                for id in &ids {
                    used_api.insert(*id);
                    edges.push(Edge {
                        api_row_id: *id,
                        erp_row_id: target.erp_row_id,
                        stage: StageName::M2KsumSameDay,
                        ddiff: 0,
                    });
                }
            }
        }

        // Pass 2: 1:N, each remaining API row as target against
        // remaining ERPs.
        let mut api_by_amount: Vec<&ApiRow> = api_rows.clone();
        api_by_amount.sort_by(|a, b| b.api_cents.abs().cmp(&a.api_cents.abs()).then(a.api_row_id.cmp(&b.api_row_id)));
        for target in &api_by_amount {
            if used_api.contains(&target.api_row_id) {
                continue;
            }
            let items: Vec<Item> = erp_rows
                .iter()
                .filter(|r| !used_erp.contains(&r.erp_row_id))
                .map(|r| Item { id: r.erp_row_id, cents: r.erp_cents })
                .collect();
            if let Some(ids) = subset_sum::solve(target.api_cents, &items, limits) {
                used_api.insert(target.api_row_id);
                for id in &ids {
                    used_erp.insert(*id);
                    edges.push(Edge {
                        api_row_id: target.api_row_id,
                        erp_row_id: *id,
                        stage: StageName::M2KsumSameDay,
                        ddiff: 0,
                    });
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::model::{ApiRow, ErpRow, RowFlags};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 10).unwrap()
    }

    fn api_row(id: u32, cents: i64) -> ApiRow {
        ApiRow {
            api_row_id: id,
            api_uid: format!("a{id}"),
            tenant_id: "t".into(),
            bank_code: "237".into(),
            bank_name: "Bank".into(),
            acc_tail: "7242".into(),
            api_date: date(),
            api_cents: cents,
            desc_norm: String::new(),
            flags: RowFlags::default(),
        }
    }

    fn erp_row(id: u32, cents: i64) -> ErpRow {
        ErpRow {
            erp_row_id: id,
            erp_uid: format!("e{id}"),
            tenant_id: "t".into(),
            bank_code: "237".into(),
            bank_name: "Bank".into(),
            acc_tail: "7242".into(),
            erp_date: date(),
            erp_cents: cents,
            desc_norm: String::new(),
            favorecido: None,
            nr_documento: None,
        }
    }

    #[test]
    fn n1_runs_before_1n_and_consumes() {
        let api = vec![api_row(1, 3000), api_row(2, 2000), api_row(3, 5000)];
        let erp = vec![erp_row(9, 10000)];
        let limits = Limits::default();
        let working = Working::new(&api, &erp, &limits);

        let edges = same_day(&working);
        let mut api_ids: Vec<u32> = edges.iter().map(|e| e.api_row_id).collect();
        api_ids.sort();
        assert_eq!(api_ids, vec![1, 2, 3]);
        assert!(edges.iter().all(|e| e.erp_row_id == 9));
        assert!(edges.iter().all(|e| e.stage == StageName::M2KsumSameDay));
    }

    #[test]
    fn rent_rows_excluded() {
        let mut api = api_row(1, 3000);
        api.flags.is_rent_generic = true;
        let api = vec![api, api_row(2, 2000)];
        let erp = vec![erp_row(9, 3000)];
        let limits = Limits::default();
        let working = Working::new(&api, &erp, &limits);

        let edges = same_day(&working);
        assert!(edges.iter().all(|e| e.api_row_id != 1));
    }
}
