//! Trend chart view

use super::ui;
use crate::core::format::{capitalize, format_date, format_rate, timeframe_label};
use crate::core::{RatesProvider, Timeframe, TrendData};
use anyhow::Result;

pub const EMPTY_PLACEHOLDER: &str = "No data available";

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Chart-ready series built from trend data, points kept in received order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendChart {
    pub title: String,
    pub series_label: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl TrendChart {
    /// Returns `None` when there is nothing to plot.
    pub fn from_data(data: &TrendData, timeframe: &str) -> Option<Self> {
        if data.data_points.is_empty() {
            return None;
        }

        Some(TrendChart {
            title: format!("{}/USD {} Trend", data.currency, capitalize(timeframe)),
            series_label: format!("{}/USD Rate", data.currency),
            labels: data
                .data_points
                .iter()
                .map(|p| format_date(&p.date))
                .collect(),
            values: data.data_points.iter().map(|p| p.rate).collect(),
        })
    }

    fn bounds(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            })
    }

    /// Lowest and highest y-axis tick labels.
    pub fn y_ticks(&self) -> (String, String) {
        let (lo, hi) = self.bounds();
        (format_rate(lo), format_rate(hi))
    }

    pub fn sparkline(&self) -> String {
        let (lo, hi) = self.bounds();
        let span = hi - lo;
        self.values
            .iter()
            .map(|v| {
                if span <= f64::EPSILON {
                    BARS[BARS.len() / 2]
                } else {
                    let level = ((v - lo) / span * (BARS.len() - 1) as f64).round() as usize;
                    BARS[level.min(BARS.len() - 1)]
                }
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let (low, high) = self.y_ticks();
        let width = low.len().max(high.len());
        let line = self.sparkline();

        let mut output = format!("{}\n", ui::style_text(&self.title, ui::StyleType::Title));
        output.push_str(&ui::style_text(&self.series_label, ui::StyleType::Subtle));
        output.push_str("\n\n");
        output.push_str(&format!("{high:>width$} ┤ {line}\n"));
        output.push_str(&format!("{low:>width$} ┤\n"));

        if let (Some(first), Some(last)) = (self.labels.first(), self.labels.last()) {
            output.push_str(&format!(
                "{:>width$}   {} → {}\n\n",
                "", first, last
            ));
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Rate")]);
        for (label, value) in self.labels.iter().zip(&self.values) {
            table.add_row(vec![
                comfy_table::Cell::new(label),
                ui::number_cell(&format_rate(*value)),
            ]);
        }
        output.push_str(&table.to_string());
        output
    }
}

/// Renders the chart or the empty-state placeholder.
pub fn render_trend(data: Option<&TrendData>, timeframe: &str) -> String {
    match data.and_then(|d| TrendChart::from_data(d, timeframe)) {
        Some(chart) => chart.render(),
        None => ui::style_text(EMPTY_PLACEHOLDER, ui::StyleType::Subtle),
    }
}

/// Fetches a trend series once and prints it.
pub async fn run(provider: &dyn RatesProvider, currency: &str, timeframe: Timeframe) -> Result<()> {
    let currency = currency.to_uppercase();
    let pb = ui::new_spinner(&format!("Fetching {currency} {timeframe} trend..."));
    let trend = provider.get_trends(&currency, timeframe).await;
    pb.finish_and_clear();

    let trend = trend?;
    println!(
        "{}\n",
        ui::style_text(&timeframe_label(timeframe.as_str()), ui::StyleType::Label)
    );
    println!("{}", render_trend(Some(&trend), timeframe.as_str()));
    Ok(())
}
