//! Operator commands read from stdin and their dispatch onto the dashboard.

use std::sync::Arc;

use client_core::Dashboard;
use shared::domain::AgentParameters;
use tracing::debug;

use crate::panel::{render_bins, render_panel, render_route};

pub const HELP: &str = "\
commands:
  optimize            request an optimized collection route
  refresh             clear the route and reload bin data
  threshold <0-100>   set the fill threshold sent to the optimizer
  max-bins <n>        set the maximum number of bins per route
  show                print the control panel
  json                print the view model as JSON
  bins                list bins with fill level and status
  route               list route waypoints
  help                show this text
  quit                exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Optimize,
    Refresh,
    SetThreshold(u8),
    SetMaxBins(u32),
    Show,
    Json,
    Bins,
    Route,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments for '{head}'"));
    }

    let command = match (head.to_ascii_lowercase().as_str(), arg) {
        ("optimize" | "o", None) => ConsoleCommand::Optimize,
        ("refresh" | "r", None) => ConsoleCommand::Refresh,
        ("threshold", Some(value)) => ConsoleCommand::SetThreshold(
            value
                .parse()
                .map_err(|_| format!("invalid threshold '{value}'"))?,
        ),
        ("max-bins", Some(value)) => ConsoleCommand::SetMaxBins(
            value
                .parse()
                .map_err(|_| format!("invalid bin count '{value}'"))?,
        ),
        ("show", None) => ConsoleCommand::Show,
        ("json", None) => ConsoleCommand::Json,
        ("bins", None) => ConsoleCommand::Bins,
        ("route", None) => ConsoleCommand::Route,
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit" | "q", None) => ConsoleCommand::Quit,
        ("threshold" | "max-bins", None) => return Err(format!("'{head}' needs a value")),
        _ => return Err(format!("unknown command '{line}'; type 'help'")),
    };
    Ok(command)
}

pub enum Flow {
    Continue,
    Exit,
}

/// Runs one command. Network-bound actions are spawned so the console keeps
/// accepting input while they are outstanding.
pub async fn dispatch(dashboard: &Arc<Dashboard>, command: ConsoleCommand) -> Flow {
    debug!(?command, "console command");
    match command {
        ConsoleCommand::Optimize => {
            println!("Optimizing collection route...");
            let dashboard = Arc::clone(dashboard);
            tokio::spawn(async move { dashboard.optimize_route().await });
        }
        ConsoleCommand::Refresh => {
            println!("Refreshing bin data...");
            let dashboard = Arc::clone(dashboard);
            tokio::spawn(async move { dashboard.refresh_data().await });
        }
        ConsoleCommand::SetThreshold(fill_threshold) => {
            let current = dashboard.parameters().await;
            update_parameters(dashboard, AgentParameters::new(fill_threshold, current.max_bins()))
                .await;
        }
        ConsoleCommand::SetMaxBins(max_bins) => {
            let current = dashboard.parameters().await;
            update_parameters(dashboard, AgentParameters::new(current.fill_threshold(), max_bins))
                .await;
        }
        ConsoleCommand::Show => print!("{}", render_panel(&dashboard.view_model().await)),
        ConsoleCommand::Json => match serde_json::to_string_pretty(&dashboard.view_model().await) {
            Ok(text) => println!("{text}"),
            Err(err) => println!("failed to encode view model: {err}"),
        },
        ConsoleCommand::Bins => print!("{}", render_bins(&dashboard.bins().await)),
        ConsoleCommand::Route => print!("{}", render_route(dashboard.route_snapshot().await.as_ref())),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Flow::Exit,
    }
    Flow::Continue
}

async fn update_parameters(
    dashboard: &Dashboard,
    parameters: Result<AgentParameters, shared::error::ParameterError>,
) {
    match parameters {
        Ok(parameters) => {
            dashboard.set_parameters(parameters).await;
            println!(
                "Parameters: fill threshold {}%, max bins {}",
                parameters.fill_threshold(),
                parameters.max_bins()
            );
        }
        Err(err) => println!("{err}"),
    }
}
