use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{account_key, candidate_dates, Working};
use crate::keywords;
use crate::model::{ApiRow, Edge, ErpRow, RowId, StageName};

const DESC_ANCHOR_MIN_KEYWORDS: usize = 2;
const MIN_INTERSECTION: usize = 2;

fn cents_balance_within_a_cent(api_abs: i64, erp_abs: i64) -> bool {
    (api_abs - erp_abs).abs() <= 1
}

/// Intersects on the full normalized-description token set, not the
/// stopword/length-filtered keyword set the other stages use.
fn full_token_intersection_size(a: &str, b: &str) -> usize {
    let b_tokens: std::collections::HashSet<&str> = b.split_whitespace().collect();
    a.split_whitespace().filter(|t| b_tokens.contains(t)).count()
}

pub fn signature_mn(working: &Working) -> Vec<Edge> {
    type Key = ((String, String, String), NaiveDate, i64, String);

    let mut api_clusters: BTreeMap<Key, Vec<&ApiRow>> = BTreeMap::new();
    for row in working.residual_api() {
        let kws = keywords::extract(&row.desc_norm, working.limits.max_keywords);
        let sig = keywords::signature(&kws);
        if sig.is_empty() {
            continue;
        }
        let key = (
            account_key(&row.tenant_id, &row.bank_code, &row.acc_tail),
            row.api_date,
            row.api_sign(),
            sig,
        );
        api_clusters.entry(key).or_default().push(row);
    }

    let mut erp_clusters: BTreeMap<Key, Vec<&ErpRow>> = BTreeMap::new();
    for row in working.residual_erp() {
        let kws = keywords::extract(&row.match_text(), working.limits.max_keywords);
        let sig = keywords::signature(&kws);
        if sig.is_empty() {
            continue;
        }
        let key = (
            account_key(&row.tenant_id, &row.bank_code, &row.acc_tail),
            row.erp_date,
            row.erp_sign(),
            sig,
        );
        erp_clusters.entry(key).or_default().push(row);
    }

    let mut edges = Vec::new();
    for (key, api_rows) in &api_clusters {
        let Some(erp_rows) = erp_clusters.get(key) else { continue };
        let api_sum: i64 = api_rows.iter().map(|r| r.api_cents.abs()).sum();
        let erp_sum: i64 = erp_rows.iter().map(|r| r.erp_cents.abs()).sum();
        if !cents_balance_within_a_cent(api_sum, erp_sum) {
            continue;
        }
        for a in api_rows {
            for e in erp_rows {
                edges.push(Edge {
                    api_row_id: a.api_row_id,
                    erp_row_id: e.erp_row_id,
                    stage: StageName::DescMnSignature,
                    ddiff: 0,
                });
            }
        }
    }
    edges
}

fn sorted_api_anchors<'a>(rows: impl Iterator<Item = &'a ApiRow>, min_amount_cents: i64) -> Vec<&'a ApiRow> {
    let mut anchors: Vec<&ApiRow> = rows.filter(|r| r.api_cents.abs() >= min_amount_cents).collect();
    anchors.sort_by(|a, b| b.api_cents.abs().cmp(&a.api_cents.abs()).then(a.api_row_id.cmp(&b.api_row_id)));
    anchors
}

fn sorted_erp_anchors<'a>(rows: impl Iterator<Item = &'a ErpRow>, min_amount_cents: i64) -> Vec<&'a ErpRow> {
    let mut anchors: Vec<&ErpRow> = rows.filter(|r| r.erp_cents.abs() >= min_amount_cents).collect();
    anchors.sort_by(|a, b| b.erp_cents.abs().cmp(&a.erp_cents.abs()).then(a.erp_row_id.cmp(&b.erp_row_id)));
    anchors
}

pub fn full_1n(working: &Working) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut used_api: std::collections::HashSet<RowId> = std::collections::HashSet::new();
    let mut used_erp: std::collections::HashSet<RowId> = std::collections::HashSet::new();

    let anchors = sorted_api_anchors(working.residual_api(), working.limits.desc_min_amount_cents);

    for anchor in anchors {
        if used_api.contains(&anchor.api_row_id) {
            continue;
        }
        let anchor_kws = keywords::extract(&anchor.desc_norm, working.limits.max_keywords);
        if anchor_kws.len() < DESC_ANCHOR_MIN_KEYWORDS {
            continue;
        }
        let dates = candidate_dates(anchor.api_date);
        let boundary = account_key(&anchor.tenant_id, &anchor.bank_code, &anchor.acc_tail);
        let sign = anchor.api_sign();

        let candidates: Vec<&ErpRow> = working
            .residual_erp()
            .filter(|r| {
                !used_erp.contains(&r.erp_row_id)
                    && account_key(&r.tenant_id, &r.bank_code, &r.acc_tail) == boundary
                    && r.erp_sign() == sign
                    && dates.contains(&r.erp_date)
            })
            .filter(|r| full_token_intersection_size(&anchor.desc_norm, &r.match_text()) >= MIN_INTERSECTION)
            .collect();

        if candidates.is_empty() {
            continue;
        }
        let sum: i64 = candidates.iter().map(|r| r.erp_cents.abs()).sum();
        if sum != anchor.api_cents.abs() {
            continue;
        }

        used_api.insert(anchor.api_row_id);
        for c in &candidates {
            used_erp.insert(c.erp_row_id);
            edges.push(Edge {
                api_row_id: anchor.api_row_id,
                erp_row_id: c.erp_row_id,
                stage: StageName::DescFull1N,
                ddiff: 0,
            });
        }
    }
    edges
}

/// Iterative (explicit-stack) branch-and-bound, prefix-sum pruned.
fn branch_and_bound(target_abs: i64, candidates: &[(RowId, i64)], max_depth: usize, max_nodes: usize) -> Option<Vec<RowId>> {
    if candidates.is_empty() || target_abs <= 0 {
        return None;
    }
    let mut sorted: Vec<(RowId, i64)> = candidates.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    let n = sorted.len().min(max_depth);
    let sorted = &sorted[..n];

    let mut suffix_sum = vec![0i64; n + 1];
    for i in (0..n).rev() {
        suffix_sum[i] = suffix_sum[i + 1] + sorted[i].1;
    }

    // Explicit stack: (index, remaining_target, chosen_ids)
    let mut stack: Vec<(usize, i64, Vec<RowId>)> = vec![(0, target_abs, Vec::new())];
    let mut visited = 0usize;

    while let Some((idx, remaining, chosen)) = stack.pop() {
        visited += 1;
        if visited > max_nodes {
            return None;
        }
        if remaining == 0 {
            return Some(chosen);
        }
        if idx >= n || remaining < 0 || suffix_sum[idx] < remaining {
            continue;
        }
        let (id, cents) = sorted[idx];
        // Include branch first so a matching path is found depth-first.
        let mut with_item = chosen.clone();
        with_item.push(id);
        stack.push((idx + 1, remaining - cents, with_item));
        stack.push((idx + 1, remaining, chosen));
    }
    None
}

pub fn ksum_anchored(working: &Working) -> (Vec<Edge>, Vec<Edge>) {
    let limits = working.limits;
    let mut used_api: std::collections::HashSet<RowId> = std::collections::HashSet::new();
    let mut used_erp: std::collections::HashSet<RowId> = std::collections::HashSet::new();

    let mut edges_1n = Vec::new();
    let api_anchors = sorted_api_anchors(working.residual_api(), limits.desc_min_amount_cents);
    for anchor in api_anchors {
        if used_api.contains(&anchor.api_row_id) {
            continue;
        }
        let anchor_kws = keywords::extract(&anchor.desc_norm, limits.max_keywords);
        if anchor_kws.len() < DESC_ANCHOR_MIN_KEYWORDS {
            continue;
        }
        let boundary = account_key(&anchor.tenant_id, &anchor.bank_code, &anchor.acc_tail);
        let sign = anchor.api_sign();
        let candidates: Vec<(RowId, i64)> = working
            .residual_erp()
            .filter(|r| {
                !used_erp.contains(&r.erp_row_id)
                    && account_key(&r.tenant_id, &r.bank_code, &r.acc_tail) == boundary
                    && r.erp_sign() == sign
                    && r.erp_date == anchor.api_date
            })
            .filter(|r| {
                let kws = keywords::extract(&r.match_text(), limits.max_keywords);
                keywords::intersection_size(&anchor_kws, &kws) >= MIN_INTERSECTION
            })
            .map(|r| (r.erp_row_id, r.erp_cents.abs()))
            .collect();

        if let Some(ids) = branch_and_bound(anchor.api_cents.abs(), &candidates, limits.branch_max_depth, limits.branch_max_nodes) {
            used_api.insert(anchor.api_row_id);
            for id in ids {
                used_erp.insert(id);
                edges_1n.push(Edge {
                    api_row_id: anchor.api_row_id,
                    erp_row_id: id,
                    stage: StageName::DescKsum1N,
                    ddiff: 0,
                });
            }
        }
    }

    let mut edges_n1 = Vec::new();
    let erp_anchors = sorted_erp_anchors(working.residual_erp(), limits.desc_min_amount_cents);
    for anchor in erp_anchors {
        if used_erp.contains(&anchor.erp_row_id) {
            continue;
        }
        let anchor_kws = keywords::extract(&anchor.match_text(), limits.max_keywords);
        if anchor_kws.len() < DESC_ANCHOR_MIN_KEYWORDS {
            continue;
        }
        let boundary = account_key(&anchor.tenant_id, &anchor.bank_code, &anchor.acc_tail);
        let sign = anchor.erp_sign();
        let candidates: Vec<(RowId, i64)> = working
            .residual_api()
            .filter(|r| {
                !used_api.contains(&r.api_row_id)
                    && account_key(&r.tenant_id, &r.bank_code, &r.acc_tail) == boundary
                    && r.api_sign() == sign
                    && r.api_date == anchor.erp_date
            })
            .filter(|r| {
                let kws = keywords::extract(&r.desc_norm, limits.max_keywords);
                keywords::intersection_size(&anchor_kws, &kws) >= MIN_INTERSECTION
            })
            .map(|r| (r.api_row_id, r.api_cents.abs()))
            .collect();

        if let Some(ids) = branch_and_bound(anchor.erp_cents.abs(), &candidates, limits.branch_max_depth, limits.branch_max_nodes) {
            used_erp.insert(anchor.erp_row_id);
            for id in ids {
                used_api.insert(id);
                edges_n1.push(Edge {
                    api_row_id: id,
                    erp_row_id: anchor.erp_row_id,
                    stage: StageName::DescKsumN1,
                    ddiff: 0,
                });
            }
        }
    }

    (edges_1n, edges_n1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::model::RowFlags;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 10).unwrap()
    }

    fn api_row(id: u32, cents: i64, desc: &str) -> ApiRow {
        ApiRow {
            api_row_id: id,
            api_uid: format!("a{id}"),
            tenant_id: "t".into(),
            bank_code: "237".into(),
            bank_name: "Bank".into(),
            acc_tail: "7242".into(),
            api_date: date(),
            api_cents: cents,
            desc_norm: desc.into(),
            flags: RowFlags::default(),
        }
    }

    fn erp_row(id: u32, cents: i64, desc: &str, favorecido: Option<&str>) -> ErpRow {
        ErpRow {
            erp_row_id: id,
            erp_uid: format!("e{id}"),
            tenant_id: "t".into(),
            bank_code: "237".into(),
            bank_name: "Bank".into(),
            acc_tail: "7242".into(),
            erp_date: date(),
            erp_cents: cents,
            desc_norm: desc.into(),
            favorecido: favorecido.map(String::from),
            nr_documento: None,
        }
    }

    #[test]
    fn full_1n_uses_favorecido_when_description_alone_is_too_thin() {
        // Anchor's description shares nothing with the ERP row's
        // desc_norm alone, but shares >= 2 tokens with its favorecido —
        // match_text() must fold favorecido in (spec §3: "used only by
        // description matchers").
        let api = vec![api_row(1, 10_000_000, "PAGAMENTO FORNECEDOR ACME LTDA")];
        let erp = vec![erp_row(9, 10_000_000, "NF 7823", Some("ACME LTDA"))];
        let limits = Limits::default();
        let working = Working::new(&api, &erp, &limits);

        let edges = full_1n(&working);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0], Edge { api_row_id: 1, erp_row_id: 9, stage: StageName::DescFull1N, ddiff: 0 });
    }

    #[test]
    fn branch_and_bound_finds_subset() {
        let candidates = vec![(1, 100), (2, 200), (3, 300)];
        let ids = branch_and_bound(500, &candidates, 25, 200_000).unwrap();
        let sum: i64 = ids.iter().map(|id| candidates.iter().find(|c| c.0 == *id).unwrap().1).sum();
        assert_eq!(sum, 500);
    }

    #[test]
    fn branch_and_bound_none_when_unreachable() {
        let candidates = vec![(1, 100), (2, 200)];
        assert!(branch_and_bound(150, &candidates, 25, 200_000).is_none());
    }
}
