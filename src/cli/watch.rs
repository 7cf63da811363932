//! Live dashboard: redraws on every state change and reads selections from stdin.

use super::rates::RateDisplay;
use super::trend::render_trend;
use super::ui;
use crate::core::dashboard::{
    Dashboard, DashboardHandle, DashboardSettings, DashboardState, DashboardStatus,
};
use crate::core::format::timeframe_label;
use crate::core::{AggregatedRate, RatesProvider, Timeframe};
use anyhow::{Context, Result};
use console::Term;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const HELP: &str = "Enter a currency code or row number to select it, d/w/m to change timeframe, q to quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectCurrency(String),
    SelectTimeframe(Timeframe),
    Quit,
    Unknown(String),
}

/// Interprets one line of user input. Blank lines yield `None`.
pub fn parse_command(input: &str, rates: &[AggregatedRate]) -> Option<Command> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let command = match input.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Command::Quit,
        "d" => Command::SelectTimeframe(Timeframe::Daily),
        "w" => Command::SelectTimeframe(Timeframe::Weekly),
        "m" => Command::SelectTimeframe(Timeframe::Monthly),
        other => {
            if let Ok(timeframe) = other.parse::<Timeframe>() {
                Command::SelectTimeframe(timeframe)
            } else if let Some(currency) = RateDisplay::new(rates).select(input) {
                Command::SelectCurrency(currency)
            } else if input.len() == 3 && input.chars().all(|c| c.is_ascii_alphabetic()) {
                Command::SelectCurrency(input.to_uppercase())
            } else {
                Command::Unknown(input.to_string())
            }
        }
    };
    Some(command)
}

fn render_tabs(active: Timeframe) -> String {
    Timeframe::ALL
        .iter()
        .map(|t| {
            let caption = format!(" {} ", t.title());
            if *t == active {
                ui::style_text(&caption, ui::StyleType::ActiveTab)
            } else {
                caption
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a full dashboard frame from a state snapshot.
pub fn render_dashboard(state: &DashboardState) -> String {
    let mut output = format!(
        "{}\n\n",
        ui::style_text("Currency Rate Dashboard", ui::StyleType::Title)
    );

    if let DashboardStatus::Error(message) = state.status() {
        output.push_str(&ui::style_text(&message, ui::StyleType::Error));
        output.push('\n');
        return output;
    }

    let loading = ui::style_text("Loading...", ui::StyleType::Subtle);

    if state.rates_loading {
        output.push_str(&loading);
    } else {
        output.push_str(&RateDisplay::new(&state.rates).render(Some(&state.selection.currency)));
    }
    output.push_str(&format!("\n\n{}\n\n", ui::separator()));

    let timeframe = state.selection.timeframe;
    output.push_str(&render_tabs(timeframe));
    output.push_str(&format!(
        "   {}\n\n",
        ui::style_text(&timeframe_label(timeframe.as_str()), ui::StyleType::Label)
    ));

    if state.trend_loading {
        output.push_str(&loading);
    } else {
        output.push_str(&render_trend(state.trend.as_ref(), timeframe.as_str()));
    }
    output.push('\n');
    output
}

fn redraw(term: &Term, state: &DashboardState) -> Result<()> {
    term.clear_screen().context("Failed to clear terminal")?;
    term.write_line(&render_dashboard(state))
        .context("Failed to write to terminal")?;
    term.write_line(&ui::style_text(HELP, ui::StyleType::Subtle))
        .context("Failed to write to terminal")?;
    Ok(())
}

/// Forwards stdin lines from a plain OS thread, so a pending read never
/// holds the runtime open on exit.
fn spawn_input_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("fxdash-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        return;
                    }
                }
            }
        })
        .context("Failed to start input reader")?;
    Ok(rx)
}

/// Drives the dashboard from `input` lines until `q` is entered, `quit`
/// resolves or the dashboard stops. Every state change is passed to `draw`.
async fn event_loop<Q, D>(
    handle: &DashboardHandle,
    mut input: mpsc::Receiver<String>,
    quit: Q,
    mut draw: D,
) -> Result<()>
where
    Q: Future<Output = ()>,
    D: FnMut(&DashboardState) -> Result<()>,
{
    let mut state_rx = handle.subscribe();
    let initial = state_rx.borrow_and_update().clone();
    draw(&initial)?;

    let mut input_open = true;
    tokio::pin!(quit);

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                draw(&state)?;
            }
            line = input.recv(), if input_open => {
                let Some(line) = line else {
                    debug!("Input closed, waiting for Ctrl-C");
                    input_open = false;
                    continue;
                };
                let rates = state_rx.borrow().rates.clone();
                match parse_command(&line, &rates) {
                    Some(Command::Quit) => break,
                    Some(Command::SelectCurrency(currency)) => handle.select_currency(&currency),
                    Some(Command::SelectTimeframe(timeframe)) => handle.select_timeframe(timeframe),
                    Some(Command::Unknown(text)) => warn!(input = %text, "Unrecognised input"),
                    None => {}
                }
            }
            _ = &mut quit => break,
        }
    }
    Ok(())
}

/// Runs the live dashboard until the user quits or presses Ctrl-C.
pub async fn run(provider: Arc<dyn RatesProvider>, settings: DashboardSettings) -> Result<()> {
    let handle = Dashboard::start(provider, settings);
    let term = Term::stdout();
    let input = spawn_input_reader()?;

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    };
    let result = event_loop(&handle, input, ctrl_c, |state| redraw(&term, state)).await;

    handle.shutdown().await;
    result
}
