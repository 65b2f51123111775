//! C5: the fixed matcher cascade. Each stage reads the residual working
//! set and appends edges; rows consumed by a stage are unavailable to
//! every later stage (spec §4.5 "matched rows removed before the next
//! stage"). The cascade order here is not configurable — a straight-line
//! sequence of calls against a shared `Working`, not a dispatch table,
//! since this spec has exactly one cascade, unlike the teacher's
//! strategy-selected `run_two_way`/`run_three_way`.

mod description;
mod fallback;
mod ksum;
mod rn;

use std::collections::HashSet;

use tracing::debug;

use crate::calendar;
use crate::config::Limits;
use crate::model::{ApiRow, Edge, ErpRow, RowId, StageName};

/// Mutable cascade state: immutable row slices, plus the growing sets
/// of consumed row ids on each side (spec §9 "immutable row table plus
/// two growing sets of consumed row_ids").
pub struct Working<'a> {
    pub api: &'a [ApiRow],
    pub erp: &'a [ErpRow],
    pub limits: &'a Limits,
    consumed_api: HashSet<RowId>,
    consumed_erp: HashSet<RowId>,
    pub edges: Vec<Edge>,
}

impl<'a> Working<'a> {
    pub fn new(api: &'a [ApiRow], erp: &'a [ErpRow], limits: &'a Limits) -> Self {
        Self {
            api,
            erp,
            limits,
            consumed_api: HashSet::new(),
            consumed_erp: HashSet::new(),
            edges: Vec::new(),
        }
    }

    pub fn residual_api(&self) -> impl Iterator<Item = &ApiRow> {
        self.api.iter().filter(move |r| !self.consumed_api.contains(&r.api_row_id))
    }

    pub fn residual_erp(&self) -> impl Iterator<Item = &ErpRow> {
        self.erp.iter().filter(move |r| !self.consumed_erp.contains(&r.erp_row_id))
    }

    pub fn is_api_consumed(&self, id: RowId) -> bool {
        self.consumed_api.contains(&id)
    }

    pub fn is_erp_consumed(&self, id: RowId) -> bool {
        self.consumed_erp.contains(&id)
    }

    /// Record one batch of edges from a stage, marking every row
    /// involved as consumed regardless of whether this was a 1:1, M:N,
    /// or cross-product emission.
    fn commit(&mut self, stage: StageName, new_edges: Vec<Edge>) {
        debug!(stage = stage.as_str(), count = new_edges.len(), "stage produced edges");
        for edge in &new_edges {
            self.consumed_api.insert(edge.api_row_id);
            self.consumed_erp.insert(edge.erp_row_id);
        }
        self.edges.extend(new_edges);
    }
}

/// Run the full fixed cascade and return every candidate edge (still
/// subject to the component validator, C6).
pub fn run_cascade(api: &[ApiRow], erp: &[ErpRow], limits: &Limits) -> Vec<Edge> {
    let mut working = Working::new(api, erp, limits);

    let tax = rn::dminus1_rn(&working, StageName::M0TaxDMinus1Rn1to1, |r| r.flags.is_tax);
    working.commit(StageName::M0TaxDMinus1Rn1to1, tax);

    let bankfees = rn::dminus1_rn(&working, StageName::M0BankfeesDMinus1Rn1to1, |r| r.flags.is_bankfees);
    working.commit(StageName::M0BankfeesDMinus1Rn1to1, bankfees);

    let rent = rn::dminus1_rn(&working, StageName::M0RentDMinus1Rn1to1, |r| r.flags.is_rent_d1);
    working.commit(StageName::M0RentDMinus1Rn1to1, rent);

    let signature = description::signature_mn(&working);
    working.commit(StageName::DescMnSignature, signature);

    let full_1n = description::full_1n(&working);
    working.commit(StageName::DescFull1N, full_1n);

    let (ksum_1n, ksum_n1) = description::ksum_anchored(&working);
    working.commit(StageName::DescKsum1N, ksum_1n);
    working.commit(StageName::DescKsumN1, ksum_n1);

    let same_day_rn = rn::same_day_rn(&working);
    working.commit(StageName::M1SameDayRn, same_day_rn);

    let ksum_same_day = ksum::same_day(&working);
    working.commit(StageName::M2KsumSameDay, ksum_same_day);

    let balance_fallback = fallback::balance_day(&working);
    working.commit(StageName::FallbackBalanceDay, balance_fallback);

    working.edges
}

/// Shared partition key used by every RN/KSUM/fallback stage: join
/// never crosses tenant/bank/acc_tail (spec §3 invariant).
pub(crate) fn account_key(tenant_id: &str, bank_code: &str, acc_tail: &str) -> (String, String, String) {
    (tenant_id.to_string(), bank_code.to_string(), acc_tail.to_string())
}

pub(crate) fn candidate_dates(d: chrono::NaiveDate) -> [chrono::NaiveDate; 5] {
    [
        calendar::shift_business_days(d, -2),
        calendar::shift_business_days(d, -1),
        d,
        calendar::shift_business_days(d, 1),
        calendar::shift_business_days(d, 2),
    ]
}
