//! Prompt construction for the commentary engine. Every prompt is built by a
//! named-slot function so templates stay type-checked and testable without a
//! model call.

use crate::models::FilingChunk;

/// Delimiter between chunks so the model can tell source boundaries apart.
const CHUNK_DELIMITER: &str = "\n\n---\n\n";

/// Maps internal filing item codes to human-readable section labels.
/// Unknown codes pass through verbatim; an unrecognized section is not an
/// error.
pub fn section_label(item_code: &str) -> &str {
    match item_code {
        "item_1a" => "Item 1A: Risk Factors",
        "item_3" => "Item 3: Legal Proceedings",
        "item_7" => "Item 7: MD&A",
        "item_7a" => "Item 7A: Market Risk Disclosures",
        other => other,
    }
}

/// Formats retrieved chunks into a single context block, in retrieval order
/// (similarity-descending, not chronological). Each chunk is prefixed with a
/// provenance header naming the filing it came from.
pub fn format_chunks_as_context(chunks: &[FilingChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "[Source: {} {} {} — {}]\n{}",
                c.filing_type,
                c.filing_year,
                c.filing_period,
                section_label(&c.item_code),
                c.chunk_text
            )
        })
        .collect::<Vec<_>>()
        .join(CHUNK_DELIMITER)
}

pub fn commentary_system_prompt() -> String {
    "You are a senior equity research analyst. Given excerpts from SEC filings \
(10-K / 10-Q) for a publicly traded company, produce a concise yet insightful \
investment commentary.

Structure your commentary with the following sections:
1. **Business Overview & Performance** – key takeaways on revenue, profitability, and growth.
2. **Risk Factors** – the most material risks disclosed.
3. **Legal & Regulatory** – any notable legal proceedings or regulatory risks.
4. **Market Risk** – exposure to interest-rate, FX, or commodity risk.
5. **Analyst Takeaway** – a brief, balanced conclusion summarising the investment thesis.

Guidelines:
- Be factual; cite specifics from the filings when possible.
- If the provided excerpts lack information for a section, state that clearly \
rather than speculating.
- Keep total length under 200 words."
        .to_string()
}

pub fn commentary_user_prompt(
    ticker: &str,
    company_name: &str,
    sector: &str,
    context: &str,
) -> String {
    format!(
        "Company : {} — {}
Sector  : {}

=== SEC Filing Excerpts ===
{}
===========================

Produce the investment commentary now.",
        ticker, company_name, sector, context
    )
}

pub fn overview_system_prompt() -> String {
    "You are a senior portfolio strategist. Given individual analyst commentaries \
for each position in an investment portfolio, produce a holistic portfolio overview.

Structure your overview with the following sections:
1. **Portfolio Composition** – summarise what sectors and companies the portfolio holds.
2. **Key Strengths** – common positive themes across holdings.
3. **Concentration Risks** – sector, geographic, or single-name concentration concerns.
4. **Cross-Cutting Risk Factors** – risks that affect multiple holdings simultaneously \
(e.g., macro, regulatory, interest-rate exposure).
5. **Diversification Assessment** – how well-diversified the portfolio is and any gaps.
6. **Overall Verdict** – a balanced, actionable summary for the investor.

Guidelines:
- Reference specific tickers when making a point.
- Be concise; keep total length under 200 words.
- Do not repeat the individual commentaries verbatim."
        .to_string()
}

pub fn overview_user_prompt(portfolio_name: &str, commentaries: &str) -> String {
    format!(
        "Portfolio: {}

=== Individual Position Commentaries ===
{}
=========================================

Produce the portfolio overview now.",
        portfolio_name, commentaries
    )
}
