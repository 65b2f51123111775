use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::aggregate;
use crate::components;
use crate::config::{Limits, ACC_TAIL_DIGITS};
use crate::model::{DropLog, ReconInput, ReconOutput, MatchRow, RowTables};
use crate::normalize;
use crate::stages;

/// `date_from`/`date_to` should be the caller's original window, not the
/// widened `±5` day load window.
#[instrument(skip_all, fields(api_in = input.api.len(), erp_in = input.erp.len()))]
pub fn run(input: &ReconInput, limits: &Limits, date_from: NaiveDate, date_to: NaiveDate) -> ReconOutput {
    let mut drop_log = DropLog::default();
    let api = normalize::normalize_api(&input.api, ACC_TAIL_DIGITS, &mut drop_log);
    let erp = normalize::normalize_erp(&input.erp, ACC_TAIL_DIGITS, &mut drop_log);
    if !drop_log.invalid_amount.is_empty() {
        info!(dropped = drop_log.invalid_amount.len(), "rows dropped for invalid amount");
    }

    let tables = RowTables { api, erp };

    let candidate_edges = stages::run_cascade(&tables.api, &tables.erp, limits);
    info!(candidates = candidate_edges.len(), "cascade produced candidate edges");

    let validated_edges = components::validate(candidate_edges, &tables.api, &tables.erp);
    info!(validated = validated_edges.len(), "edges survived component validation");

    let api_by_id = tables.api_by_id();
    let erp_by_id = tables.erp_by_id();
    let matches: Vec<MatchRow> = validated_edges
        .iter()
        .filter_map(|edge| {
            let a = api_by_id.get(&edge.api_row_id)?;
            let e = erp_by_id.get(&edge.erp_row_id)?;
            Some(MatchRow {
                api_row_id: edge.api_row_id,
                erp_row_id: edge.erp_row_id,
                api_uid: a.api_uid.clone(),
                erp_uid: e.erp_uid.clone(),
                stage: edge.stage,
                priority: edge.priority(),
                ddiff: edge.ddiff,
            })
        })
        .collect();

    let (unrec_api, unrec_erp) = aggregate::unreconciled(&tables.api, &tables.erp, &validated_edges);
    let daily = aggregate::daily(&tables.api, &tables.erp, &validated_edges, date_from, date_to);
    let monthly = aggregate::monthly(&daily);

    ReconOutput { matches, unrec_api, unrec_erp, daily, monthly }
}
