//! Rate list view

use super::ui;
use crate::core::format::{format_rate, format_time};
use crate::core::{AggregatedRate, RatesProvider};
use anyhow::Result;
use comfy_table::Cell;

/// Whether the average sits strictly above the midpoint of the observed range.
pub fn is_increasing(rate: &AggregatedRate) -> bool {
    rate.average_rate > (rate.min_rate + rate.max_rate) / 2.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub currency: String,
    pub pair: String,
    pub rate_label: String,
    pub range_label: String,
    pub last_updated: String,
    pub is_increasing: bool,
}

impl From<&AggregatedRate> for RateRow {
    fn from(rate: &AggregatedRate) -> Self {
        RateRow {
            currency: rate.currency.clone(),
            pair: format!("{}/USD", rate.currency),
            rate_label: format_rate(rate.average_rate),
            range_label: format!(
                "{} - {}",
                format_rate(rate.min_rate),
                format_rate(rate.max_rate)
            ),
            last_updated: format_time(&rate.last_updated),
            is_increasing: is_increasing(rate),
        }
    }
}

pub struct RateDisplay<'a> {
    rates: &'a [AggregatedRate],
}

impl<'a> RateDisplay<'a> {
    pub fn new(rates: &'a [AggregatedRate]) -> Self {
        Self { rates }
    }

    pub fn rows(&self) -> Vec<RateRow> {
        self.rates.iter().map(RateRow::from).collect()
    }

    /// Resolves a 1-based row number or a currency code to the currency code
    /// of a listed rate.
    pub fn select(&self, input: &str) -> Option<String> {
        let input = input.trim();
        if let Ok(index) = input.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| self.rates.get(i))
                .map(|r| r.currency.clone());
        }
        self.rates
            .iter()
            .find(|r| r.currency.eq_ignore_ascii_case(input))
            .map(|r| r.currency.clone())
    }

    pub fn render(&self, selected: Option<&str>) -> String {
        let mut output = format!(
            "{}\n\n",
            ui::style_text("Current Exchange Rates", ui::StyleType::Title)
        );

        if self.rates.is_empty() {
            output.push_str(&ui::style_text(
                "No rates available",
                ui::StyleType::Subtle,
            ));
            return output;
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("#"),
            ui::header_cell("Pair"),
            ui::header_cell("Rate"),
            ui::header_cell("Range"),
            ui::header_cell("Updated"),
        ]);

        for (i, row) in self.rows().iter().enumerate() {
            let is_selected = selected.is_some_and(|c| c.eq_ignore_ascii_case(&row.currency));
            let pair = if is_selected {
                Cell::new(format!("» {}", row.pair))
            } else {
                Cell::new(&row.pair)
            };
            table.add_row(vec![
                ui::number_cell(&(i + 1).to_string()),
                pair,
                ui::trend_cell(&row.rate_label, row.is_increasing),
                ui::number_cell(&row.range_label),
                Cell::new(&row.last_updated),
            ]);
        }

        output.push_str(&table.to_string());
        output
    }
}

/// Fetches current rates once and prints them.
pub async fn run(provider: &dyn RatesProvider) -> Result<()> {
    let pb = ui::new_spinner("Fetching current rates...");
    let rates = provider.get_current_rates().await;
    pb.finish_and_clear();

    let rates = rates?;
    println!("{}", RateDisplay::new(&rates).render(None));
    Ok(())
}
