//! C1: canonicalize raw source rows into `ApiRow`/`ErpRow` — integer
//! cents, account tail, normalized description, derived flags.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use unicode_normalization::UnicodeNormalization;

use crate::model::{ApiRow, ErpRow, DropLog, RawApiRecord, RawErpRecord, RowFlags, RowId};

/// Parse a source amount string into exact cents, half-to-even.
///
/// Returns `None` for anything that doesn't parse as a decimal — the
/// caller decides whether that means "drop the row" or "drop it only
/// for exact-cent stages" (spec §4.1/§7).
pub fn parse_cents(amount: &str) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;

    let decimal: Decimal = amount.trim().parse().ok()?;
    let hundred = Decimal::from(100);
    let scaled = (decimal * hundred).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    scaled.to_i64()
}

/// Strip non-digits and leading zeros, keep the rightmost
/// `ACC_TAIL_DIGITS` characters (fewer if the source is shorter).
pub fn acc_tail(account_number: &str, digits: usize) -> String {
    let only_digits: String = account_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = only_digits.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    if trimmed.len() > digits {
        trimmed[trimmed.len() - digits..].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Uppercase, NFD-fold (strip combining marks), collapse non-alphanumeric
/// runs to a single space, trim.
pub fn normalize_description(raw: &str) -> String {
    let upper = raw.to_uppercase();
    let folded: String = upper.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let mut out = String::with_capacity(folded.len());
    let mut last_was_space = false;
    for ch in folded.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// `(category, categoryid, optype_upper) -> RowFlags`, per spec §6.
pub fn derive_flags(category: &str, categoryid: &str, optype: &str) -> RowFlags {
    let category = category.to_lowercase();
    let optype = optype.to_uppercase();

    let is_tax = category == "tax on financial operations" || categoryid == "15030000";
    let is_bankfees = categoryid == "16000000" || category == "bank fees";
    let is_pix_tariff =
        category == "transfer - pix" && optype == "TARIFA_SERVICOS_AVULSOS";
    let is_rent_d1 = optype == "RENDIMENTO_APLIC_FINANCEIRA";
    let is_rent_generic = category == "proceeds interests and dividends"
        || categoryid == "03060000"
        || optype == "RESGATE_APLIC_FINANCEIRA";

    RowFlags {
        is_tax,
        is_bankfees,
        is_pix_tariff,
        is_rent_d1,
        is_rent_generic,
    }
}

/// Normalize one side of a `ReconInput`. Rows whose amount does not parse
/// are dropped and recorded in `drop_log`, never panicking.
pub fn normalize_api(records: &[RawApiRecord], acc_tail_digits: usize, drop_log: &mut DropLog) -> Vec<ApiRow> {
    let mut out = Vec::with_capacity(records.len());
    let mut next_id: RowId = 0;
    for rec in records {
        let Some(cents) = parse_cents(&rec.amount) else {
            drop_log.record_invalid_amount(rec.api_uid.clone());
            continue;
        };
        out.push(ApiRow {
            api_row_id: next_id,
            api_uid: rec.api_uid.clone(),
            tenant_id: rec.tenant_id.clone(),
            bank_code: rec.bank_code.clone(),
            bank_name: rec.bank_name.clone(),
            acc_tail: acc_tail(&rec.account_number, acc_tail_digits),
            api_date: rec.date,
            api_cents: cents,
            desc_norm: normalize_description(&rec.description),
            flags: derive_flags(&rec.category, &rec.categoryid, &rec.operation_type),
        });
        next_id += 1;
    }
    out
}

pub fn normalize_erp(records: &[RawErpRecord], acc_tail_digits: usize, drop_log: &mut DropLog) -> Vec<ErpRow> {
    let mut out = Vec::with_capacity(records.len());
    let mut next_id: RowId = 0;
    for rec in records {
        let Some(cents) = parse_cents(&rec.amount) else {
            drop_log.record_invalid_amount(rec.erp_uid.clone());
            continue;
        };
        out.push(ErpRow {
            erp_row_id: next_id,
            erp_uid: rec.erp_uid.clone(),
            tenant_id: rec.tenant_id.clone(),
            bank_code: rec.bank_code.clone(),
            bank_name: rec.bank_name.clone(),
            acc_tail: acc_tail(&rec.account_number, acc_tail_digits),
            erp_date: rec.date,
            erp_cents: cents,
            desc_norm: normalize_description(&rec.description),
            favorecido: rec.favorecido.as_deref().map(normalize_description),
            nr_documento: rec.nr_documento.as_deref().map(normalize_description),
        });
        next_id += 1;
    }
    out
}
