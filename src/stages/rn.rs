//! 1:1 row-number (RN) matchers: partition by
//! `(tenant, bank, acc_tail, sign, date)`, subkey by `cents`, sort each
//! side deterministically by `(cents, row_id)`, and join equal-rank
//! rows (spec §4.5 "Grouping key").

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{account_key, Working};
use crate::calendar;
use crate::model::{ApiRow, Edge, ErpRow, StageName};

type PartitionKey = ((String, String, String), i64, NaiveDate);

fn partition_api<'a>(
    rows: impl Iterator<Item = &'a ApiRow>,
    date_for_key: impl Fn(&ApiRow) -> NaiveDate,
) -> BTreeMap<PartitionKey, Vec<&'a ApiRow>> {
    let mut groups: BTreeMap<PartitionKey, Vec<&ApiRow>> = BTreeMap::new();
    for row in rows {
        let key = (
            account_key(&row.tenant_id, &row.bank_code, &row.acc_tail),
            row.api_sign(),
            date_for_key(row),
        );
        groups.entry(key).or_default().push(row);
    }
    groups
}

fn partition_erp<'a>(rows: impl Iterator<Item = &'a ErpRow>) -> BTreeMap<PartitionKey, Vec<&'a ErpRow>> {
    let mut groups: BTreeMap<PartitionKey, Vec<&ErpRow>> = BTreeMap::new();
    for row in rows {
        let key = (
            account_key(&row.tenant_id, &row.bank_code, &row.acc_tail),
            row.erp_sign(),
            row.erp_date,
        );
        groups.entry(key).or_default().push(row);
    }
    groups
}

/// Join two sorted-by-(cents,row_id) slices by rank within each
/// distinct cents subkey, returning `(api_row_id, erp_row_id)` pairs.
fn rn_join(mut api: Vec<&ApiRow>, mut erp: Vec<&ErpRow>) -> Vec<(u32, u32)> {
    api.sort_by_key(|r| (r.api_cents, r.api_row_id));
    erp.sort_by_key(|r| (r.erp_cents, r.erp_row_id));

    let mut pairs = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < api.len() && j < erp.len() {
        let a = api[i];
        let e = erp[j];
        match a.api_cents.cmp(&e.erp_cents) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                // Collect the whole equal-cents run on each side, then
                // pair by rank (row number) within it.
                let cents = a.api_cents;
                let mut a_run = Vec::new();
                while i < api.len() && api[i].api_cents == cents {
                    a_run.push(api[i]);
                    i += 1;
                }
                let mut e_run = Vec::new();
                while j < erp.len() && erp[j].erp_cents == cents {
                    e_run.push(erp[j]);
                    j += 1;
                }
                for (a, e) in a_run.iter().zip(e_run.iter()) {
                    pairs.push((a.api_row_id, e.erp_row_id));
                }
            }
        }
    }
    pairs
}

/// D-minus-1 flag-restricted stages: API rows carrying `flag` are
/// partitioned by their own date; matched against ERP rows one business
/// day later sharing the same account key and sign (ddiff = 1).
pub fn dminus1_rn(working: &Working, stage: StageName, flag: impl Fn(&ApiRow) -> bool) -> Vec<Edge> {
    let api_groups = partition_api(working.residual_api().filter(|r| flag(r)), |r| r.api_date);
    let mut edges = Vec::new();

    for (key, api_rows) in api_groups {
        let ((tenant, bank, acc_tail), sign, api_date) = key;
        let erp_date = calendar::shift_business_days(api_date, 1);
        let erp_rows: Vec<&ErpRow> = working
            .residual_erp()
            .filter(|r| {
                account_key(&r.tenant_id, &r.bank_code, &r.acc_tail) == (tenant.clone(), bank.clone(), acc_tail.clone())
                    && r.erp_sign() == sign
                    && r.erp_date == erp_date
            })
            .collect();

        for (api_id, erp_id) in rn_join(api_rows, erp_rows) {
            edges.push(Edge { api_row_id: api_id, erp_row_id: erp_id, stage, ddiff: 1 });
        }
    }
    edges
}

/// M1_SAME_DAY_RN: generic RN 1:1 on all remaining rows sharing
/// `(tenant, bank, acc_tail, sign, date, cents)` (ddiff = 0).
pub fn same_day_rn(working: &Working) -> Vec<Edge> {
    let api_groups = partition_api(working.residual_api(), |r| r.api_date);
    let erp_groups = partition_erp(working.residual_erp());

    let mut edges = Vec::new();
    for (key, api_rows) in api_groups {
        let Some(erp_rows) = erp_groups.get(&key) else { continue };
        for (api_id, erp_id) in rn_join(api_rows, erp_rows.clone()) {
            edges.push(Edge {
                api_row_id: api_id,
                erp_row_id: erp_id,
                stage: StageName::M1SameDayRn,
                ddiff: 0,
            });
        }
    }
    edges
}
