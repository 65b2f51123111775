//! C3: stopword-filtered keyword extraction and signature computation.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Fixed Portuguese banking stopword set (spec §4.3). A plain array is
/// enough for ~40 words — no `phf` dependency justified at this size.
const STOPWORDS: &[&str] = &[
    "PAGAMENTO", "TRANSFERENCIA", "DOC", "TED", "PIX", "BOLETO", "COBRANCA",
    "DEPOSITO", "SAQUE", "RECEBIMENTO", "LIQUIDACAO", "COMPENSACAO", "TARIFA",
    "TARIFAS", "SERVICO", "SERVICOS", "OPERACAO", "REFERENTE", "CONTA",
    "CORRENTE", "BANCO", "BANCARIA", "BANCARIO", "CREDITO", "DEBITO", "VALOR",
    "DATA", "NUMERO", "CODIGO", "AGENCIA", "CLIENTE", "TITULAR", "FAVORECIDO",
    "LANCAMENTO", "MOVIMENTO", "EXTRATO", "REMESSA", "ORDEM", "AUTOMATICO",
    "AUTOMATICA", "PARA", "POR", "DE", "DA", "DO", "EM",
];

fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Deduplicated, order-preserving keyword list from an already
/// normalized (uppercased, folded) description, capped at
/// `max_keywords`. Excludes tokens of length <= 2, purely numeric
/// tokens, and the stopword set.
pub fn extract(desc_norm: &str, max_keywords: usize) -> Vec<String> {
    let stopwords = stopword_set();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for token in desc_norm.split_whitespace() {
        if out.len() >= max_keywords {
            break;
        }
        if token.len() <= 2 || is_numeric(token) || stopwords.contains(token) {
            continue;
        }
        if seen.insert(token) {
            out.push(token.to_string());
        }
    }
    out
}

/// First 3 keywords joined by `|`; empty string if fewer than one
/// keyword survives extraction.
pub fn signature(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return String::new();
    }
    keywords.iter().take(3).cloned().collect::<Vec<_>>().join("|")
}

/// Size of the intersection between two keyword sets, used by the
/// description-anchored stages (spec §4.5 "keyword intersection >= 2").
pub fn intersection_size(a: &[String], b: &[String]) -> usize {
    let b_set: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().filter(|k| b_set.contains(k.as_str())).count()
}
