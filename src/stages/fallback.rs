//! `07_FALLBACK_BALANCE_DAY`: for every partition where the API and ERP
//! cent sums already agree, emit the full residual cross-product as a
//! single N:M match. The component validator (C6) is the final
//! authority on whether it survives deduplication.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{account_key, Working};
use crate::model::{ApiRow, Edge, ErpRow, StageName};

type PartitionKey = ((String, String, String), i64, NaiveDate);

pub fn balance_day(working: &Working) -> Vec<Edge> {
    let mut api_groups: BTreeMap<PartitionKey, Vec<&ApiRow>> = BTreeMap::new();
    for row in working.residual_api() {
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
    for (key, api_rows) in api_groups {
        let Some(erp_rows) = erp_groups.get(&key) else { continue };
        let api_sum: i64 = api_rows.iter().map(|r| r.api_cents).sum();
        let erp_sum: i64 = erp_rows.iter().map(|r| r.erp_cents).sum();
        if api_sum != erp_sum {
            continue;
        }
        for a in &api_rows {
            for e in erp_rows {
                edges.push(Edge {
                    api_row_id: a.api_row_id,
                    erp_row_id: e.erp_row_id,
                    stage: StageName::FallbackBalanceDay,
                    ddiff: 0,
                });
            }
        }
    }
    edges
}
