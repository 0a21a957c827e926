//! `nfsconv exports` and `nfsconv graph`

use anyhow::Result;
use colored::Colorize;
use declarative::DependencyGraph;

use super::Session;
use crate::Context;
use crate::engine::{Target, matches_filter, parse_target};

pub fn exports(ctx: &Context) -> Result<()> {
    let session = Session::load(ctx)?;
    print!("{}", session.resolved.exports_content);
    Ok(())
}

pub fn graph(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::load(ctx)?;
    let target = target.map(parse_target).unwrap_or_default();

    for line in graph_lines(&session.resolved.graph, &target) {
        match line.strip_prefix("    ") {
            Some(edge) => println!("    {}", edge.dimmed()),
            None => println!("{}", line.bold()),
        }
    }
    Ok(())
}

/// Resources in convergence order, each followed by its outgoing edges
///
/// ```text
/// 1. package:nfs-common
///     require -> service:nfs-kernel-server
/// ```
pub fn graph_lines(graph: &DependencyGraph, target: &Target) -> Vec<String> {
    let edges = graph.edges();
    let mut lines = Vec::new();

    for (position, index) in graph.topological_order().into_iter().enumerate() {
        let id = graph.resource(index).id();
        if !matches_filter(&id, target) {
            continue;
        }

        lines.push(format!("{}. {id}", position + 1));
        for edge in edges.iter().filter(|e| e.from == id) {
            lines.push(format!("    {} -> {}", edge.kind, edge.to));
        }
    }
    lines
}
