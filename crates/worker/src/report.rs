use valuescan_core::domain::stock::StockRow;
use valuescan_core::ingest::types::CompanyProfile;
use valuescan_core::scan::ScanStats;

const UNKNOWN: &str = "unknown";
const NAME_WIDTH: usize = 32;

pub fn render_table(rows: &[StockRow]) -> String {
    let mut out = format!(
        "{:<8} {:<NAME_WIDTH$} {:>12} {:>8} {:>8}  {}\n",
        "SYMBOL", "NAME", "MCAP($B)", "P/E", "DIV(%)", "SCANNED"
    );
    for r in rows {
        out.push_str(&format!(
            "{:<8} {:<NAME_WIDTH$} {:>12.2} {:>8.2} {:>8.2}  {}\n",
            r.symbol.as_str(),
            truncate(&r.name, NAME_WIDTH),
            r.market_cap_b,
            r.pe,
            r.dividend_yield_pct,
            r.scan_date,
        ));
    }
    out
}

pub fn render_profile(profile: &CompanyProfile) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| UNKNOWN.to_string());
    format!(
        "{}\n  name:     {}\n  sector:   {}\n  industry: {}\n  link:     {}\n\n{}\n",
        profile.symbol,
        field(&profile.long_name),
        field(&profile.sector),
        field(&profile.industry),
        profile.symbol.detail_url(),
        profile
            .business_summary
            .as_deref()
            .unwrap_or("No business summary available."),
    )
}

pub fn render_stats(stats: &ScanStats) -> String {
    let mut out = format!(
        "scanned {} of {} candidates: {} rows, {} skipped",
        stats.scanned,
        stats.candidates,
        stats.included,
        stats.skipped.len()
    );
    if stats.provider_unreachable {
        out.push_str(" (market data provider unreachable)");
    }
    match (&stats.save_error, stats.saved) {
        (Some(err), _) => out.push_str(&format!("; cache not written: {err}")),
        (None, false) => out.push_str("; cache not written"),
        (None, true) => {}
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut t: String = s.chars().take(width.saturating_sub(1)).collect();
    t.push('…');
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use valuescan_core::domain::stock::TickerSymbol;

    fn row(symbol: &str, name: &str) -> StockRow {
        StockRow {
            symbol: TickerSymbol::normalize(symbol).unwrap(),
            name: name.to_string(),
            market_cap_b: 460.123,
            pe: 13.0,
            dividend_yield_pct: 3.3,
            scan_date: "2024-06-03".to_string(),
            detail_url: None,
        }
    }

    #[test]
    fn table_has_header_and_one_line_per_row() {
        let text = render_table(&[row("XOM", "Exxon Mobil Corporation"), row("KO", "Coca-Cola")]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("SYMBOL"));
        assert!(lines[1].starts_with("XOM"));
        assert!(lines[1].contains("460.12"));
        assert!(lines[2].contains("2024-06-03"));
    }

    #[test]
    fn long_names_are_cut_to_column_width() {
        let long = "A".repeat(50);
        let cut = truncate(&long, NAME_WIDTH);
        assert_eq!(cut.chars().count(), NAME_WIDTH);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("Apple", NAME_WIDTH), "Apple");
    }

    #[test]
    fn missing_profile_fields_show_placeholders() {
        let profile = CompanyProfile {
            symbol: TickerSymbol::normalize("BRK.B").unwrap(),
            long_name: Some("Berkshire Hathaway Inc.".to_string()),
            sector: None,
            industry: None,
            business_summary: None,
        };
        let text = render_profile(&profile);
        assert!(text.starts_with("BRK-B\n"));
        assert!(text.contains("sector:   unknown"));
        assert!(text.contains("https://finance.yahoo.com/quote/BRK-B"));
        assert!(text.contains("No business summary available."));
    }

    #[test]
    fn stats_mention_outage_and_unsaved_cache() {
        let stats = ScanStats {
            candidates: 503,
            scanned: 250,
            included: 0,
            skipped: Vec::new(),
            provider_unreachable: true,
            saved: false,
            save_error: None,
        };
        let text = render_stats(&stats);
        assert!(text.contains("scanned 250 of 503"));
        assert!(text.contains("unreachable"));
        assert!(text.ends_with("cache not written"));
    }

    #[test]
    fn stats_carry_cache_write_failure() {
        let stats = ScanStats {
            candidates: 503,
            scanned: 250,
            included: 240,
            skipped: Vec::new(),
            provider_unreachable: false,
            saved: false,
            save_error: Some("failed to replace results.csv".to_string()),
        };
        assert!(render_stats(&stats).ends_with("cache not written: failed to replace results.csv"));
    }
}
