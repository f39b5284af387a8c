//! Change-report assembly: turns classified change sets into the plain-text
//! report handed to the notifier. Formatting only, no detection logic.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::detector::{FundChangeSet, IndexChanges};
use crate::utils::formatting::{format_delta, format_pct, month_display};

/// One fund's change set together with the disclosure period it covers.
#[derive(Debug, Clone, Serialize)]
pub struct FundReport {
    pub changes: FundChangeSet,
    pub month: String,
}

/// The full report for one run. Always produced, even when every source
/// failed and both sections are empty.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    /// Run period, "YYYY-MM".
    pub month: String,
    pub index_changes: BTreeMap<String, IndexChanges>,
    pub fund_changes: BTreeMap<String, FundReport>,
    pub monitored_indexes: Vec<String>,
    pub monitored_funds: Vec<String>,
}

const RULE: &str = "============================================================";

impl ChangeReport {
    pub fn has_index_changes(&self) -> bool {
        !self.index_changes.is_empty()
    }

    pub fn has_fund_changes(&self) -> bool {
        self.fund_changes.values().any(|f| f.changes.has_changes())
    }

    pub fn has_changes(&self) -> bool {
        self.has_index_changes() || self.has_fund_changes()
    }

    pub fn subject(&self) -> String {
        if self.has_changes() {
            format!("Portfolio Changes Detected - {}", self.month)
        } else {
            format!("No Portfolio Changes - {}", self.month)
        }
    }

    pub fn render(&self) -> String {
        self.render_with_names(&HashMap::new())
    }

    /// Render with an optional ticker -> company-name map for the index
    /// sections. Unresolved tickers are shown bare.
    pub fn render_with_names(&self, company_names: &HashMap<String, String>) -> String {
        if !self.has_changes() {
            return self.render_no_changes();
        }

        let mut lines = vec![format!("Portfolio Changes Detected - {}", self.month), String::new()];

        if self.has_index_changes() {
            lines.push(RULE.to_string());
            lines.push("INDEX CONSTITUENT CHANGES".to_string());
            lines.push(RULE.to_string());
            lines.push(String::new());
            for (name, changes) in &self.index_changes {
                lines.push(name.clone());
                lines.push("-".repeat(name.len()));
                if !changes.added.is_empty() {
                    lines.push(format!("Added ({}):", changes.added.len()));
                    for symbol in &changes.added {
                        lines.push(format!("  + {}", with_name(symbol, company_names)));
                    }
                    lines.push(String::new());
                }
                if !changes.removed.is_empty() {
                    lines.push(format!("Removed ({}):", changes.removed.len()));
                    for symbol in &changes.removed {
                        lines.push(format!("  - {}", with_name(symbol, company_names)));
                    }
                    lines.push(String::new());
                }
                lines.push(String::new());
            }
        }

        if self.has_fund_changes() {
            lines.push(RULE.to_string());
            lines.push("MUTUAL FUND HOLDINGS CHANGES".to_string());
            lines.push(RULE.to_string());
            lines.push(String::new());
            for (name, fund) in &self.fund_changes {
                if fund.changes.has_changes() {
                    lines.push(render_fund_section(name, fund));
                    lines.push(String::new());
                }
            }
        }

        lines.push(RULE.to_string());
        lines.join("\n")
    }

    fn render_no_changes(&self) -> String {
        let mut lines = vec![
            format!("No Portfolio Changes - {}", self.month),
            String::new(),
            RULE.to_string(),
            String::new(),
            "All monitored indexes and mutual funds remain unchanged.".to_string(),
            String::new(),
        ];
        if !self.monitored_indexes.is_empty() {
            lines.push("Monitored Indexes:".to_string());
            for name in &self.monitored_indexes {
                lines.push(format!("  - {name}"));
            }
            lines.push(String::new());
        }
        if !self.monitored_funds.is_empty() {
            lines.push("Monitored Mutual Funds:".to_string());
            for name in &self.monitored_funds {
                lines.push(format!("  - {name}"));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

fn with_name(symbol: &str, company_names: &HashMap<String, String>) -> String {
    match company_names.get(symbol) {
        Some(name) => format!("{symbol} ({name})"),
        None => symbol.to_string(),
    }
}

fn render_fund_section(fund_name: &str, fund: &FundReport) -> String {
    let changes = &fund.changes;
    let mut lines = vec![
        fund_name.to_string(),
        "-".repeat(fund_name.len()),
        format!("Period: {}", month_display(&fund.month)),
        String::new(),
    ];

    if !changes.additions.is_empty() {
        lines.push(format!("NEW ADDITIONS ({}):", changes.additions.len()));
        for (symbol, pct) in &changes.additions {
            lines.push(format!("  + {symbol} ({})", format_pct(*pct)));
        }
        lines.push(String::new());
    }
    if !changes.exits.is_empty() {
        lines.push(format!("COMPLETE EXITS ({}):", changes.exits.len()));
        for (symbol, old_pct) in &changes.exits {
            lines.push(format!("  - {symbol} (was {})", format_pct(*old_pct)));
        }
        lines.push(String::new());
    }
    if !changes.increases.is_empty() {
        lines.push("SIGNIFICANT INCREASES:".to_string());
        for entry in &changes.increases {
            lines.push(format!(
                "  {}: {} -> {} ({})",
                entry.symbol,
                format_pct(entry.old_pct),
                format_pct(entry.new_pct),
                format_delta(entry.delta)
            ));
        }
        lines.push(String::new());
    }
    if !changes.decreases.is_empty() {
        lines.push("SIGNIFICANT DECREASES:".to_string());
        for entry in &changes.decreases {
            lines.push(format!(
                "  {}: {} -> {} ({})",
                entry.symbol,
                format_pct(entry.old_pct),
                format_pct(entry.new_pct),
                format_delta(entry.delta)
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
