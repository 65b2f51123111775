use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Dense, zero-based row id assigned at load time. Unique within its side.
pub type RowId = u32;

// ---------------------------------------------------------------------------
// Flags derived from source category/operation-type codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowFlags {
    pub is_tax: bool,
    pub is_bankfees: bool,
    pub is_pix_tariff: bool,
    pub is_rent_d1: bool,
    pub is_rent_generic: bool,
}

impl RowFlags {
    pub fn is_rent(&self) -> bool {
        self.is_rent_d1 || self.is_rent_generic
    }
}

// ---------------------------------------------------------------------------
// Input rows (post-normalization)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ApiRow {
    pub api_row_id: RowId,
    pub api_uid: String,
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub acc_tail: String,
    pub api_date: NaiveDate,
    pub api_cents: i64,
    pub desc_norm: String,
    pub flags: RowFlags,
}

impl ApiRow {
    pub fn api_sign(&self) -> i64 {
        self.api_cents.signum()
    }

    pub fn api_amount(&self) -> f64 {
        self.api_cents as f64 / 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErpRow {
    pub erp_row_id: RowId,
    pub erp_uid: String,
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub acc_tail: String,
    pub erp_date: NaiveDate,
    pub erp_cents: i64,
    pub desc_norm: String,
    pub favorecido: Option<String>,
    pub nr_documento: Option<String>,
}

impl ErpRow {
    pub fn erp_sign(&self) -> i64 {
        self.erp_cents.signum()
    }

    pub fn erp_amount(&self) -> f64 {
        self.erp_cents as f64 / 100.0
    }

    /// Text the description matchers tokenize/extract keywords from:
    /// `desc_norm` plus `favorecido`/`nr_documento` when present (spec §3
    /// "used only by description matchers"). `desc_norm` alone stays the
    /// row's display description; this is the separate, matcher-only view.
    pub fn match_text(&self) -> String {
        let mut text = self.desc_norm.clone();
        for extra in [&self.favorecido, &self.nr_documento].into_iter().flatten() {
            if !extra.is_empty() {
                text.push(' ');
                text.push_str(extra);
            }
        }
        text
    }
}

// ---------------------------------------------------------------------------
// Raw (pre-normalization) rows — what a loader hands the pipeline
// ---------------------------------------------------------------------------

/// Amount and category fields are still strings; normalization turns
/// these into typed, validated `ApiRow`s or drops the record.
#[derive(Debug, Clone)]
pub struct RawApiRecord {
    pub api_uid: String,
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub account_number: String,
    pub date: NaiveDate,
    pub amount: String,
    pub description: String,
    pub category: String,
    pub categoryid: String,
    pub operation_type: String,
}

#[derive(Debug, Clone)]
pub struct RawErpRecord {
    pub erp_uid: String,
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub account_number: String,
    pub date: NaiveDate,
    pub amount: String,
    pub description: String,
    pub favorecido: Option<String>,
    pub nr_documento: Option<String>,
}

/// Pre-loaded raw records for both sides, already filtered by the caller
/// to `(tenant_id, date in [READ_FROM, READ_TO])`.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub api: Vec<RawApiRecord>,
    pub erp: Vec<RawErpRecord>,
}

// ---------------------------------------------------------------------------
// Candidate edges
// ---------------------------------------------------------------------------

/// The fixed, closed set of matcher stages, in cascade execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    M0TaxDMinus1Rn1to1,
    M0BankfeesDMinus1Rn1to1,
    M0RentDMinus1Rn1to1,
    DescMnSignature,
    DescFull1N,
    DescKsum1N,
    DescKsumN1,
    M1SameDayRn,
    M2KsumSameDay,
    FallbackBalanceDay,
}

impl StageName {
    /// Audit metadata only — stages never get re-ordered by priority.
    pub fn priority(self) -> u8 {
        match self {
            Self::M0TaxDMinus1Rn1to1 => 5,
            Self::M0BankfeesDMinus1Rn1to1 => 6,
            Self::M0RentDMinus1Rn1to1 => 7,
            Self::DescMnSignature
            | Self::DescFull1N
            | Self::DescKsum1N
            | Self::DescKsumN1 => 9,
            Self::M1SameDayRn => 10,
            Self::M2KsumSameDay => 20,
            Self::FallbackBalanceDay => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M0TaxDMinus1Rn1to1 => "M0_TAX_DMINUS1_RN_1TO1",
            Self::M0BankfeesDMinus1Rn1to1 => "M0_BANKFEES_DMINUS1_RN_1TO1",
            Self::M0RentDMinus1Rn1to1 => "M0_RENT_DMINUS1_RN_1TO1",
            Self::DescMnSignature => "01_DESC_MN_SIGNATURE",
            Self::DescFull1N => "02_DESC_FULL_1N",
            Self::DescKsum1N => "03_DESC_KSUM_1N",
            Self::DescKsumN1 => "03_DESC_KSUM_N1",
            Self::M1SameDayRn => "M1_SAME_DAY_RN",
            Self::M2KsumSameDay => "M2_KSUM_SAME_DAY",
            Self::FallbackBalanceDay => "07_FALLBACK_BALANCE_DAY",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// A derived `#[serde(rename_all = ...)]` can't reproduce these literal
// strings (no case convention inserts the `01_`/`02_`/`07_` prefixes), so
// `as_str()` stays the single source of truth for the wire format too.
impl Serialize for StageName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// M:N matches are represented as the full cross-product of edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub api_row_id: RowId,
    pub erp_row_id: RowId,
    pub stage: StageName,
    pub ddiff: i32,
}

impl Edge {
    pub fn priority(&self) -> u8 {
        self.stage.priority()
    }
}

// ---------------------------------------------------------------------------
// Output tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MatchRow {
    pub api_row_id: RowId,
    pub erp_row_id: RowId,
    pub api_uid: String,
    pub erp_uid: String,
    pub stage: StageName,
    pub priority: u8,
    pub ddiff: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnrecApiRow {
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub acc_tail: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub api_id: String,
    pub desc_norm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnrecErpRow {
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub acc_tail: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub cd_lancamento: String,
    pub desc_norm: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DailyAgg {
    pub api_matched_abs: f64,
    pub erp_matched_abs: f64,
    pub api_unrec_abs: f64,
    pub erp_unrec_abs: f64,
    pub unrec_total_abs: f64,
    pub unrec_diff: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyAggRow {
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub acc_tail: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub agg: DailyAgg,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAggRow {
    pub tenant_id: String,
    pub bank_code: String,
    pub bank_name: String,
    pub acc_tail: String,
    pub month_start: NaiveDate,
    #[serde(flatten)]
    pub agg: DailyAgg,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ReconOutput {
    pub matches: Vec<MatchRow>,
    pub unrec_api: Vec<UnrecApiRow>,
    pub unrec_erp: Vec<UnrecErpRow>,
    pub daily: Vec<DailyAggRow>,
    pub monthly: Vec<MonthlyAggRow>,
}

// ---------------------------------------------------------------------------
// Drop log / row lookup tables
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DropLog {
    pub invalid_amount: Vec<String>,
}

impl DropLog {
    pub fn record_invalid_amount(&mut self, uid: impl Into<String>) {
        self.invalid_amount.push(uid.into());
    }
}

pub struct RowTables {
    pub api: Vec<ApiRow>,
    pub erp: Vec<ErpRow>,
}

impl RowTables {
    pub fn api_by_id(&self) -> HashMap<RowId, &ApiRow> {
        self.api.iter().map(|r| (r.api_row_id, r)).collect()
    }

    pub fn erp_by_id(&self) -> HashMap<RowId, &ErpRow> {
        self.erp.iter().map(|r| (r.erp_row_id, r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_name_serializes_to_its_literal_spec_string() {
        // A derived snake_case rename can't produce these (no digit
        // prefixes, M-prefixed names lowercased) — must match `as_str()`.
        assert_eq!(serde_json::to_string(&StageName::M1SameDayRn).unwrap(), "\"M1_SAME_DAY_RN\"");
        assert_eq!(serde_json::to_string(&StageName::DescMnSignature).unwrap(), "\"01_DESC_MN_SIGNATURE\"");
        assert_eq!(serde_json::to_string(&StageName::DescFull1N).unwrap(), "\"02_DESC_FULL_1N\"");
        assert_eq!(serde_json::to_string(&StageName::FallbackBalanceDay).unwrap(), "\"07_FALLBACK_BALANCE_DAY\"");
    }
}
