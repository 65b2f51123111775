use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::calendar;
use crate::model::{
    ApiRow, DailyAgg, DailyAggRow, Edge, ErpRow, MonthlyAggRow, RowId, UnrecApiRow, UnrecErpRow,
};

type AccKey = (String, String, String, String);

fn acc_key(tenant_id: &str, bank_code: &str, bank_name: &str, acc_tail: &str) -> AccKey {
    (tenant_id.to_string(), bank_code.to_string(), bank_name.to_string(), acc_tail.to_string())
}

pub fn unreconciled(api: &[ApiRow], erp: &[ErpRow], edges: &[Edge]) -> (Vec<UnrecApiRow>, Vec<UnrecErpRow>) {
    let matched_api: HashSet<RowId> = edges.iter().map(|e| e.api_row_id).collect();
    let matched_erp: HashSet<RowId> = edges.iter().map(|e| e.erp_row_id).collect();

    let unrec_api = api
        .iter()
        .filter(|r| !matched_api.contains(&r.api_row_id))
        .map(|r| UnrecApiRow {
            tenant_id: r.tenant_id.clone(),
            bank_code: r.bank_code.clone(),
            bank_name: r.bank_name.clone(),
            acc_tail: r.acc_tail.clone(),
            date: r.api_date,
            amount: r.api_amount(),
            api_id: r.api_uid.clone(),
            desc_norm: r.desc_norm.clone(),
        })
        .collect();

    let unrec_erp = erp
        .iter()
        .filter(|r| !matched_erp.contains(&r.erp_row_id))
        .map(|r| UnrecErpRow {
            tenant_id: r.tenant_id.clone(),
            bank_code: r.bank_code.clone(),
            bank_name: r.bank_name.clone(),
            acc_tail: r.acc_tail.clone(),
            date: r.erp_date,
            amount: r.erp_amount(),
            cd_lancamento: r.erp_uid.clone(),
            desc_norm: r.desc_norm.clone(),
        })
        .collect();

    (unrec_api, unrec_erp)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Dense spine over `[date_from, date_to]` for every account on either side.
pub fn daily(
    api: &[ApiRow],
    erp: &[ErpRow],
    edges: &[Edge],
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Vec<DailyAggRow> {
    let api_by_id: HashMap<RowId, &ApiRow> = api.iter().map(|r| (r.api_row_id, r)).collect();
    let erp_by_id: HashMap<RowId, &ErpRow> = erp.iter().map(|r| (r.erp_row_id, r)).collect();

    let mut api_to_erp: HashMap<RowId, Vec<RowId>> = HashMap::new();
    for edge in edges {
        api_to_erp.entry(edge.api_row_id).or_default().push(edge.erp_row_id);
    }

    let mut totals: BTreeMap<(AccKey, NaiveDate), DailyAgg> = BTreeMap::new();
    let mut accounts: HashSet<AccKey> = HashSet::new();

    for row in api {
        accounts.insert(acc_key(&row.tenant_id, &row.bank_code, &row.bank_name, &row.acc_tail));
    }
    for row in erp {
        accounts.insert(acc_key(&row.tenant_id, &row.bank_code, &row.bank_name, &row.acc_tail));
    }

    for account in &accounts {
        for date in calendar::date_range(date_from, date_to) {
            totals.entry((account.clone(), date)).or_insert_with(DailyAgg::default);
        }
    }

    // The spine above is the only place allowed to create a `(account, date)`
    // entry outside `[date_from, date_to]`'s bounds — rows loaded from the
    // wider `READ_FROM..READ_TO` buffer window (kept around for D-1 and
    // description-stage date matching) can land outside it, and must not
    // widen the dense spine the aggregate promises (spec §4.7/§6).
    let in_window = |date: NaiveDate| date >= date_from && date <= date_to;

    // Each API row's |amount| is split across its surviving ERP matches in
    // proportion to their |amount| and booked on the ERP's date.
    for (api_id, erp_ids) in &api_to_erp {
        let Some(api_row) = api_by_id.get(api_id) else { continue };
        let api_abs = api_row.api_cents.abs() as f64 / 100.0;
        let erp_abs_total: f64 = erp_ids
            .iter()
            .filter_map(|id| erp_by_id.get(id))
            .map(|r| r.erp_cents.abs() as f64 / 100.0)
            .sum();
        if erp_abs_total <= 0.0 {
            continue;
        }
        let account = acc_key(&api_row.tenant_id, &api_row.bank_code, &api_row.bank_name, &api_row.acc_tail);
        for erp_id in erp_ids {
            let Some(erp_row) = erp_by_id.get(erp_id) else { continue };
            if !in_window(erp_row.erp_date) {
                continue;
            }
            let weight = (erp_row.erp_cents.abs() as f64 / 100.0) / erp_abs_total;
            let contribution = api_abs * weight;
            let entry = totals.entry((account.clone(), erp_row.erp_date)).or_insert_with(DailyAgg::default);
            entry.api_matched_abs += contribution;
        }
    }

    let matched_erp_ids: HashSet<RowId> = edges.iter().map(|e| e.erp_row_id).collect();
    for row in erp {
        if !matched_erp_ids.contains(&row.erp_row_id) || !in_window(row.erp_date) {
            continue;
        }
        let account = acc_key(&row.tenant_id, &row.bank_code, &row.bank_name, &row.acc_tail);
        let entry = totals.entry((account, row.erp_date)).or_insert_with(DailyAgg::default);
        entry.erp_matched_abs += row.erp_cents.abs() as f64 / 100.0;
    }

    let (unrec_api, unrec_erp) = unreconciled(api, erp, edges);
    for row in &unrec_api {
        if !in_window(row.date) {
            continue;
        }
        let account = acc_key(&row.tenant_id, &row.bank_code, &row.bank_name, &row.acc_tail);
        let entry = totals.entry((account, row.date)).or_insert_with(DailyAgg::default);
        entry.api_unrec_abs += row.amount.abs();
    }
    for row in &unrec_erp {
        if !in_window(row.date) {
            continue;
        }
        let account = acc_key(&row.tenant_id, &row.bank_code, &row.bank_name, &row.acc_tail);
        let entry = totals.entry((account, row.date)).or_insert_with(DailyAgg::default);
        entry.erp_unrec_abs += row.amount.abs();
    }

    totals
        .into_iter()
        .map(|((account, date), mut agg)| {
            agg.api_matched_abs = round2(agg.api_matched_abs);
            agg.erp_matched_abs = round2(agg.erp_matched_abs);
            agg.api_unrec_abs = round2(agg.api_unrec_abs);
            agg.erp_unrec_abs = round2(agg.erp_unrec_abs);
            agg.unrec_total_abs = round2(agg.api_unrec_abs + agg.erp_unrec_abs);
            agg.unrec_diff = round2(agg.erp_unrec_abs - agg.api_unrec_abs);
            let (tenant_id, bank_code, bank_name, acc_tail) = account;
            DailyAggRow { tenant_id, bank_code, bank_name, acc_tail, date, agg }
        })
        .collect()
}

pub fn monthly(daily_rows: &[DailyAggRow]) -> Vec<MonthlyAggRow> {
    let mut groups: BTreeMap<(AccKey, NaiveDate), DailyAgg> = BTreeMap::new();

    for row in daily_rows {
        let account = acc_key(&row.tenant_id, &row.bank_code, &row.bank_name, &row.acc_tail);
        let month_start = row.date.with_day(1).expect("day 1 is valid in every month");
        let entry = groups.entry((account, month_start)).or_insert_with(DailyAgg::default);
        entry.api_matched_abs += row.agg.api_matched_abs;
        entry.erp_matched_abs += row.agg.erp_matched_abs;
        entry.api_unrec_abs += row.agg.api_unrec_abs;
        entry.erp_unrec_abs += row.agg.erp_unrec_abs;
    }

    groups
        .into_iter()
        .map(|((account, month_start), mut agg)| {
            agg.api_matched_abs = round2(agg.api_matched_abs);
            agg.erp_matched_abs = round2(agg.erp_matched_abs);
            agg.api_unrec_abs = round2(agg.api_unrec_abs);
            agg.erp_unrec_abs = round2(agg.erp_unrec_abs);
            agg.unrec_total_abs = round2(agg.api_unrec_abs + agg.erp_unrec_abs);
            agg.unrec_diff = round2(agg.erp_unrec_abs - agg.api_unrec_abs);
            let (tenant_id, bank_code, bank_name, acc_tail) = account;
            MonthlyAggRow { tenant_id, bank_code, bank_name, acc_tail, month_start, agg }
        })
        .collect()
}
