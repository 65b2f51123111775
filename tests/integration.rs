//! End-to-end scenario tests, one per concrete scenario in the design
//! spec's "Testable properties" section.

use bankrecon_core::config::Limits;
use bankrecon_core::model::{RawApiRecord, RawErpRecord, ReconInput};
use bankrecon_core::run;
use chrono::NaiveDate;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the same registry/fmt-layer/env-filter subscriber the
/// teacher's CLI binaries use, so the cascade's `debug`/`trace` spans
/// are observable under `RUST_LOG=bankrecon_core=trace`. `try_init`
/// because multiple test binaries in this crate would otherwise race
/// to set the global default.
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .try_init();
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn api(uid: &str, amount: &str, date: NaiveDate, desc: &str) -> RawApiRecord {
    RawApiRecord {
        api_uid: uid.into(),
        tenant_id: "tenant-1".into(),
        bank_code: "237".into(),
        bank_name: "Bank 237".into(),
        account_number: "00007242".into(),
        date,
        amount: amount.into(),
        description: desc.into(),
        category: String::new(),
        categoryid: String::new(),
        operation_type: String::new(),
    }
}

fn erp(uid: &str, amount: &str, date: NaiveDate, desc: &str) -> RawErpRecord {
    RawErpRecord {
        erp_uid: uid.into(),
        tenant_id: "tenant-1".into(),
        bank_code: "237".into(),
        bank_name: "Bank 237".into(),
        account_number: "00007242".into(),
        date,
        amount: amount.into(),
        description: desc.into(),
        favorecido: None,
        nr_documento: None,
    }
}

#[test]
fn trivial_one_to_one() {
    init_tracing();
    let input = ReconInput {
        api: vec![api("a1", "123.45", d(2025, 8, 10), "X")],
        erp: vec![erp("e1", "123.45", d(2025, 8, 10), "X")],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));

    assert_eq!(out.matches.len(), 1);
    let m = &out.matches[0];
    assert_eq!(m.stage.as_str(), "M1_SAME_DAY_RN");
    assert_eq!(m.ddiff, 0);
    assert!(out.unrec_api.is_empty() && out.unrec_erp.is_empty());
}

#[test]
fn n_to_1_same_day() {
    let input = ReconInput {
        api: vec![
            api("a1", "30.00", d(2025, 8, 10), "X"),
            api("a2", "20.00", d(2025, 8, 10), "X"),
            api("a3", "50.00", d(2025, 8, 10), "X"),
        ],
        erp: vec![erp("e1", "100.00", d(2025, 8, 10), "X")],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));

    assert_eq!(out.matches.len(), 3);
    assert!(out.matches.iter().all(|m| m.erp_row_id == 0));
    assert!(out.matches.iter().all(|m| m.stage.as_str() == "M2_KSUM_SAME_DAY"));
    assert!(out.unrec_api.is_empty() && out.unrec_erp.is_empty());
}

#[test]
fn balanced_day_fallback() {
    // No subset of {100, 200} sums to 150, so neither RN nor KSUM fires;
    // the day still balances overall (300 = 300), so the fallback stage
    // emits the full 2x2 cross-product.
    let input = ReconInput {
        api: vec![
            api("a1", "1.00", d(2025, 8, 10), "X"),
            api("a2", "2.00", d(2025, 8, 10), "X"),
        ],
        erp: vec![
            erp("e1", "1.50", d(2025, 8, 10), "X"),
            erp("e2", "1.50", d(2025, 8, 10), "X"),
        ],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));

    assert_eq!(out.matches.len(), 4);
    assert!(out.matches.iter().all(|m| m.stage.as_str() == "07_FALLBACK_BALANCE_DAY"));
    assert!(out.unrec_api.is_empty() && out.unrec_erp.is_empty());
}

#[test]
fn description_anchor_full_1n() {
    let input = ReconInput {
        api: vec![api("a1", "150000.00", d(2025, 8, 10), "PAGAMENTO FORNECEDOR ACME NF 7823")],
        erp: vec![
            erp("e1", "100000.00", d(2025, 8, 10), "ACME NF 7823"),
            erp("e2", "50000.00", d(2025, 8, 10), "ACME JUROS NF 7823"),
        ],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));

    assert_eq!(out.matches.len(), 2);
    assert!(out.matches.iter().all(|m| m.stage.as_str() == "02_DESC_FULL_1N"));
    assert!(out.matches.iter().all(|m| m.api_row_id == 0));
    let mut erp_ids: Vec<u32> = out.matches.iter().map(|m| m.erp_row_id).collect();
    erp_ids.sort();
    assert_eq!(erp_ids, vec![0, 1]);
}

#[test]
fn component_reject_discards_imbalanced_group() {
    // api_cents(1)=1000 but the two ERP rows it would pair with sum to
    // 1200: component validator must discard both edges regardless of
    // which stage proposed them.
    let input = ReconInput {
        api: vec![api("a1", "10.00", d(2025, 8, 10), "X")],
        erp: vec![
            erp("e1", "7.00", d(2025, 8, 10), "X"),
            erp("e2", "5.00", d(2025, 8, 10), "X"),
        ],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));

    assert!(out.matches.is_empty());
    assert_eq!(out.unrec_api.len(), 1);
    assert_eq!(out.unrec_erp.len(), 2);
}

#[test]
fn oversized_partition_rn_drains_before_ksum() {
    let mut api_rows = Vec::new();
    let mut erp_rows = Vec::new();
    for i in 0..3000 {
        api_rows.push(api(&format!("a{i}"), "1.00", d(2025, 8, 10), "X"));
        erp_rows.push(erp(&format!("e{i}"), "1.00", d(2025, 8, 10), "X"));
    }
    let input = ReconInput { api: api_rows, erp: erp_rows };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));

    // The RN 1:1 bijection matches all 3,000 equal-cent pairs before
    // M2_KSUM_SAME_DAY ever runs, leaving nothing for KSUM to trim.
    assert_eq!(out.matches.len(), 3000);
    assert!(out.matches.iter().all(|m| m.stage.as_str() == "M1_SAME_DAY_RN"));
    assert!(out.unrec_api.is_empty() && out.unrec_erp.is_empty());
}

#[test]
fn idempotent_across_runs() {
    let input = ReconInput {
        api: vec![
            api("a1", "30.00", d(2025, 8, 10), "X"),
            api("a2", "20.00", d(2025, 8, 10), "X"),
        ],
        erp: vec![erp("e1", "50.00", d(2025, 8, 10), "X")],
    };
    let limits = Limits::default();
    let out1 = run(&input, &limits, d(2025, 8, 10), d(2025, 8, 10));
    let out2 = run(&input, &limits, d(2025, 8, 10), d(2025, 8, 10));

    let mut ids1: Vec<(u32, u32)> = out1.matches.iter().map(|m| (m.api_row_id, m.erp_row_id)).collect();
    let mut ids2: Vec<(u32, u32)> = out2.matches.iter().map(|m| (m.api_row_id, m.erp_row_id)).collect();
    ids1.sort();
    ids2.sort();
    assert_eq!(ids1, ids2);
}

#[test]
fn output_serializes_to_the_documented_json_shape() {
    let input = ReconInput {
        api: vec![api("a1", "123.45", d(2025, 8, 10), "X")],
        erp: vec![erp("e1", "123.45", d(2025, 8, 10), "X")],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 10), d(2025, 8, 10));
    let val = serde_json::to_value(&out).unwrap();

    assert!(val.get("matches").is_some());
    assert!(val.get("unrec_api").is_some());
    assert!(val.get("unrec_erp").is_some());
    assert!(val.get("daily").is_some());
    assert!(val.get("monthly").is_some());
    assert_eq!(val["matches"][0]["stage"], "M1_SAME_DAY_RN");
}

#[test]
fn daily_aggregate_covers_the_full_window() {
    let input = ReconInput {
        api: vec![api("a1", "100.00", d(2025, 8, 10), "X")],
        erp: vec![erp("e1", "100.00", d(2025, 8, 10), "X")],
    };
    let out = run(&input, &Limits::default(), d(2025, 8, 8), d(2025, 8, 12));

    // Dense spine: one row per day in [DATE_FROM, DATE_TO] for the account.
    assert_eq!(out.daily.len(), 5);
    let matched_day = out.daily.iter().find(|r| r.date == d(2025, 8, 10)).unwrap();
    assert!((matched_day.agg.api_matched_abs - 100.0).abs() < 1e-6);
    assert!((matched_day.agg.erp_matched_abs - 100.0).abs() < 1e-6);
}
