//! Text rendering of the control panel and map layers.

use std::fmt::Write as _;

use client_core::{
    DashboardViewModel, MapViewport, Notice, NoticeSeverity, Padding, RouteBounds, RouteSnapshot,
};
use shared::domain::Bin;

pub fn render_panel(vm: &DashboardViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Network Statistics ==");
    let _ = writeln!(out, "Total Bins in Network     {}", vm.total_bins);
    let _ = writeln!(out, "Bins Requiring Service    {}", vm.bins_requiring_service);
    let _ = writeln!(out, "Optimized Route Distance  {}", vm.optimized_distance);
    if vm.is_optimized {
        let _ = writeln!(out, "Stops on Route            {}", vm.stops_on_route);
        let _ = writeln!(out, "Efficiency Gain           {}", vm.efficiency_gain);
        let _ = writeln!(out, "Route Optimized Successfully");
    }
    out
}

pub fn render_notice(notice: &Notice) -> String {
    match notice.severity {
        NoticeSeverity::Info => format!("[info] {}", notice.message),
        NoticeSeverity::Error => format!("[error] {}", notice.message),
    }
}

pub fn render_bins(bins: &[Bin]) -> String {
    if bins.is_empty() {
        return "No bins loaded.\n".to_string();
    }
    let mut out = String::new();
    for bin in bins {
        let _ = writeln!(
            out,
            "{:<10} {:>3}%  {:<6}  ({:.5}, {:.5})",
            bin.id.as_str(),
            bin.fill_level,
            bin.status.label(),
            bin.location.lat,
            bin.location.lng
        );
    }
    out
}

pub fn render_route(route: Option<&RouteSnapshot>) -> String {
    let Some(route) = route else {
        return "No route computed.\n".to_string();
    };
    let mut out = String::new();
    for (index, point) in route.waypoints.iter().enumerate() {
        let marker = if index == 0 { " (depot)" } else { "" };
        let _ = writeln!(out, "{index:>3}: ({:.5}, {:.5}){marker}", point.lat, point.lng);
    }
    out
}

/// Viewport stand-in that reports reframe requests on stdout.
pub struct TerminalViewport;

impl MapViewport for TerminalViewport {
    fn fly_to_bounds(&mut self, bounds: RouteBounds, padding: Padding) {
        println!(
            "map: framing route SW({:.5}, {:.5}) NE({:.5}, {:.5}) padding {}x{}",
            bounds.south_west.lat,
            bounds.south_west.lng,
            bounds.north_east.lat,
            bounds.north_east.lng,
            padding.x,
            padding.y
        );
    }
}
