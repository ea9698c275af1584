use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::{load_settings_from, SETTINGS_FILE},
    Dashboard, DashboardEvent, HttpDashboardApi, MapSyncAdapter,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing_subscriber::EnvFilter;

mod console;
mod panel;

use console::{dispatch, parse_command, Flow, HELP};
use panel::{render_notice, render_panel, TerminalViewport};

#[derive(Parser, Debug)]
#[command(name = "optibin-desktop", about = "Bin fleet dashboard console")]
struct Args {
    /// Settings file; missing files fall back to defaults.
    #[arg(long, default_value = SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    fill_threshold: Option<u8>,
    #[arg(long)]
    max_bins: Option<u32>,
    /// Request a route as soon as the inventory is loaded.
    #[arg(long)]
    optimize: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config)?;
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if let Some(fill_threshold) = args.fill_threshold {
        settings.fill_threshold = fill_threshold;
    }
    if let Some(max_bins) = args.max_bins {
        settings.max_bins = max_bins;
    }
    let backend_url = settings.backend_url()?;
    tracing::info!(%backend_url, "starting dashboard console");

    let api = Arc::new(HttpDashboardApi::new(backend_url.as_str()));
    let dashboard = Dashboard::new(api, &settings).context("invalid dashboard settings")?;

    let renderer = tokio::spawn(render_events(
        Arc::clone(&dashboard),
        dashboard.subscribe_events(),
        MapSyncAdapter::new(settings.fit_padding()),
    ));

    {
        let dashboard = Arc::clone(&dashboard);
        let optimize = args.optimize;
        tokio::spawn(async move {
            dashboard.load_inventory().await;
            if optimize {
                dashboard.optimize_route().await;
            }
        });
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                if let Flow::Exit = dispatch(&dashboard, command).await {
                    break;
                }
            }
            Err(message) => println!("{message}"),
        }
    }

    renderer.abort();
    Ok(())
}

async fn render_events(
    dashboard: Arc<Dashboard>,
    mut events: broadcast::Receiver<DashboardEvent>,
    mut map_sync: MapSyncAdapter,
) {
    let mut viewport = TerminalViewport;
    loop {
        match events.recv().await {
            Ok(DashboardEvent::ViewModelChanged(vm)) => print!("{}", render_panel(&vm)),
            Ok(DashboardEvent::RouteChanged(route)) => {
                map_sync.sync(route.as_ref(), &mut viewport);
            }
            Ok(DashboardEvent::Notice(notice)) => println!("{}", render_notice(&notice)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "console renderer fell behind; redrawing");
                print!("{}", render_panel(&dashboard.view_model().await));
                let route = dashboard.route_snapshot().await;
                map_sync.sync(route.as_ref(), &mut viewport);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
