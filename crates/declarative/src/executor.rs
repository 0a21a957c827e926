//! Convergence engine - applies a dependency graph in require order
//!
//! One run walks the graph once. A resource whose requirement failed is
//! never applied and reports `DependencyFailed`; independent branches keep
//! converging. Notifications are coalesced: every notified resource is
//! refreshed at most once, after all resources have been applied.

use crate::context::{ApplyContext, NoProgress, ProgressCallback};
use crate::graph::DependencyGraph;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceId};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reason recorded for every pending change in a dry run
pub const DRY_RUN_REASON: &str = "dry run";

/// Outcome for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub id: ResourceId,
    pub description: String,
    pub result: ApplyResult,
    /// Outcome of the notification-triggered refresh, if one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<ApplyResult>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvergeReport {
    /// One entry per resource, in convergence order
    pub resources: Vec<ResourceReport>,
    pub summary: ExecuteSummary,
}

impl ConvergeReport {
    /// Check if the run converged without failures
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }

    /// Report for a single resource
    pub fn get(&self, id: &ResourceId) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| &r.id == id)
    }

    /// Result for a single resource
    pub fn result(&self, id: &ResourceId) -> Option<&ApplyResult> {
        self.get(id).map(|r| &r.result)
    }

    /// Resources that changed during the run
    pub fn changed(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources.iter().filter(|r| r.result.is_change())
    }

    /// Resources that failed, were skipped for a failed dependency,
    /// or failed to refresh
    pub fn failures(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources.iter().filter(|r| {
            !r.result.is_success() || r.refresh.as_ref().is_some_and(|f| !f.is_success())
        })
    }
}

/// Converge a graph with the given options and progress callback
///
/// With `jobs > 1`, resources at the same dependency depth are applied on a
/// rayon pool; otherwise the graph is walked in topological order.
/// Returns an error only if the thread pool cannot be created; resource
/// failures are part of the report.
pub fn converge<P: ProgressCallback>(
    graph: &DependencyGraph,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<ConvergeReport> {
    let order = graph.topological_order();
    let mut results: Vec<Option<ApplyResult>> = vec![None; graph.len()];

    let pool = if opts.jobs > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(opts.jobs)
                .build()
                .context("Failed to create apply thread pool")?,
        )
    } else {
        None
    };

    let batches = if pool.is_some() {
        graph.levels()
    } else {
        vec![order.clone()]
    };

    for batch in batches {
        let (parallel, serial): (Vec<usize>, Vec<usize>) = if pool.is_some() && batch.len() > 1 {
            batch
                .into_iter()
                .partition(|&i| graph.resource(i).can_parallelize())
        } else {
            (Vec::new(), batch)
        };

        progress.on_batch_start(parallel.len() + serial.len(), !parallel.is_empty());

        if let Some(pool) = &pool
            && !parallel.is_empty()
        {
            // Requirements live in earlier levels, so blocking is known up front
            let runnable: Vec<usize> = parallel
                .into_iter()
                .filter(|&i| !skip_if_blocked(graph, &mut results, i, progress))
                .collect();

            let applied: Vec<ApplyResult> = pool.install(|| {
                runnable
                    .par_iter()
                    .map(|&i| apply_resource(graph.resource(i), opts))
                    .collect()
            });

            for (index, result) in runnable.into_iter().zip(applied) {
                progress.on_resource_complete(&graph.resource(index).id(), &result);
                results[index] = Some(result);
            }
        }

        for index in serial {
            if skip_if_blocked(graph, &mut results, index, progress) {
                continue;
            }
            let resource = graph.resource(index);
            progress.on_resource_start(&resource.id(), &resource.description());
            let result = apply_resource(resource, opts);
            progress.on_resource_complete(&resource.id(), &result);
            results[index] = Some(result);
        }

        progress.on_batch_complete();
    }

    let refreshes = refresh_notified(graph, &order, &results, opts, progress);

    let mut report = ConvergeReport::default();
    for index in order {
        let resource = graph.resource(index);
        let result = results[index]
            .take()
            .unwrap_or(ApplyResult::Skipped {
                reason: "not reached".to_string(),
            });
        report.summary.add_result(&result);
        if let Some(refresh) = &refreshes[index] {
            report.summary.add_refresh(refresh);
        }
        report.resources.push(ResourceReport {
            id: resource.id(),
            description: resource.description(),
            result,
            refresh: refreshes[index].clone(),
        });
    }

    Ok(report)
}

/// Record `DependencyFailed` if any requirement did not succeed
fn skip_if_blocked<P: ProgressCallback>(
    graph: &DependencyGraph,
    results: &mut [Option<ApplyResult>],
    index: usize,
    progress: &mut P,
) -> bool {
    let blocked_by = graph
        .requires_of(index)
        .find(|&dep| results[dep].as_ref().is_some_and(|r| !r.is_success()));

    let Some(dep) = blocked_by else {
        return false;
    };

    let id = graph.resource(index).id();
    let dependency = graph.resource(dep).id();
    log::warn!("Skipping {id}: required {dependency} did not converge");

    let result = ApplyResult::DependencyFailed {
        dependency: dependency.to_string(),
    };
    progress.on_resource_complete(&id, &result);
    results[index] = Some(result);
    true
}

/// Refresh every notified resource once, in topological order
fn refresh_notified<P: ProgressCallback>(
    graph: &DependencyGraph,
    order: &[usize],
    results: &[Option<ApplyResult>],
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Vec<Option<ApplyResult>> {
    // target -> the notifiers that triggered it
    let mut notified: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, result) in results.iter().enumerate() {
        let triggered = result.as_ref().is_some_and(|r| {
            r.is_change() || (opts.dry_run && matches!(r, ApplyResult::Skipped { .. }))
        });
        if triggered {
            for target in graph.notifies_of(index) {
                notified.entry(target).or_default().push(index);
            }
        }
    }

    let mut refreshes: Vec<Option<ApplyResult>> = vec![None; graph.len()];
    for &index in order {
        let Some(sources) = notified.get(&index) else {
            continue;
        };

        let resource = graph.resource(index);
        let id = resource.id();
        match &results[index] {
            Some(r) if !r.is_success() => {
                log::warn!("Not refreshing {id}: it did not converge");
                continue;
            }
            // Brought up this run after every notifier converged
            Some(ApplyResult::Created)
                if sources
                    .iter()
                    .all(|&source| graph.requires_of(index).any(|dep| dep == source)) =>
            {
                log::debug!("Not refreshing {id}: created this run");
                continue;
            }
            _ => {}
        }

        let result = if opts.dry_run {
            ApplyResult::Skipped {
                reason: DRY_RUN_REASON.to_string(),
            }
        } else {
            log::info!("Refreshing {id}");
            let mut ctx = ApplyContext::new(false, opts.verbose);
            match resource.refresh(&mut ctx) {
                Ok(result) => result,
                Err(e) => ApplyResult::Failed {
                    error: format!("{e:#}"),
                },
            }
        };

        progress.on_refresh(&id, &result);
        refreshes[index] = Some(result);
    }

    refreshes
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, opts: &ExecuteOptions) -> ApplyResult {
    let id = resource.id();

    if opts.dry_run {
        return match resource.needs_apply() {
            Ok(true) => ApplyResult::Skipped {
                reason: DRY_RUN_REASON.to_string(),
            },
            Ok(false) => ApplyResult::Unchanged,
            Err(e) => ApplyResult::Failed {
                error: format!("{e:#}"),
            },
        };
    }

    log::debug!("Applying {id}");
    let mut ctx = ApplyContext::new(false, opts.verbose);
    match resource.apply(&mut ctx) {
        Ok(result) => {
            if result.is_change() {
                log::info!("{id}: {}", result.label());
            }
            result
        }
        Err(e) => {
            log::warn!("{id} failed: {e:#}");
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

/// Converge without progress reporting
pub fn converge_simple(graph: &DependencyGraph, opts: &ExecuteOptions) -> Result<ConvergeReport> {
    converge(graph, opts, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attributes, ResourceState};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type EventLog = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct TestResource {
        name: String,
        present: Arc<AtomicBool>,
        fail: bool,
        refreshes: Arc<AtomicUsize>,
        log: EventLog,
    }

    impl TestResource {
        fn new(name: &str, log: &EventLog) -> Self {
            Self {
                name: name.to_string(),
                present: Arc::new(AtomicBool::new(false)),
                fail: false,
                refreshes: Arc::new(AtomicUsize::new(0)),
                log: Arc::clone(log),
            }
        }

        fn converged(name: &str, log: &EventLog) -> Self {
            let resource = Self::new(name, log);
            resource.present.store(true, Ordering::SeqCst);
            resource
        }

        fn failing(name: &str, log: &EventLog) -> Self {
            Self {
                fail: true,
                ..Self::new(name, log)
            }
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> ResourceId {
            ResourceId::file(self.name.clone())
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.name)
        }

        fn attributes(&self) -> Attributes {
            Attributes::from([("ensure", "present".to_string())])
        }

        fn current_state(&self) -> Result<ResourceState> {
            if self.present.load(Ordering::SeqCst) {
                Ok(ResourceState::Present { details: None })
            } else {
                Ok(ResourceState::Absent)
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.log.lock().unwrap().push(format!("apply:{}", self.name));
            if self.fail {
                anyhow::bail!("{} exploded", self.name);
            }
            if self.present.swap(true, Ordering::SeqCst) {
                Ok(ApplyResult::Unchanged)
            } else {
                Ok(ApplyResult::Created)
            }
        }

        fn refresh(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.log.lock().unwrap().push(format!("refresh:{}", self.name));
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(ApplyResult::Modified)
        }
    }

    fn events(log: &EventLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn position(events: &[String], event: &str) -> usize {
        events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("missing event {event} in {events:?}"))
    }

    fn sequential() -> ExecuteOptions {
        ExecuteOptions {
            jobs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_converge_empty_graph() {
        let graph = DependencyGraph::new();
        let report = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(report.summary.total(), 0);
        assert!(report.is_success());
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let a = graph.add(TestResource::new("a", &log)).unwrap();
        let b = graph.add(TestResource::new("b", &log)).unwrap();
        graph.require(&a, &b).unwrap();

        let first = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(first.summary.created, 2);

        let second = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(second.summary.no_change, 2);
        assert!(
            second
                .resources
                .iter()
                .all(|r| r.result == ApplyResult::Unchanged)
        );
    }

    #[test]
    fn test_require_edges_order_applies() {
        for jobs in [1, 4] {
            let log = EventLog::default();
            let mut graph = DependencyGraph::new();
            // Declared in reverse of the required order
            let c = graph.add(TestResource::new("c", &log)).unwrap();
            let b = graph.add(TestResource::new("b", &log)).unwrap();
            let a = graph.add(TestResource::new("a", &log)).unwrap();
            graph.add(TestResource::new("free", &log)).unwrap();
            graph.require(&a, &b).unwrap();
            graph.require(&b, &c).unwrap();

            let opts = ExecuteOptions {
                jobs,
                ..Default::default()
            };
            let report = converge_simple(&graph, &opts).unwrap();
            assert!(report.is_success());

            let events = events(&log);
            assert!(position(&events, "apply:a") < position(&events, "apply:b"));
            assert!(position(&events, "apply:b") < position(&events, "apply:c"));
            assert_eq!(events.len(), 4);
        }
    }

    #[test]
    fn test_notifications_are_coalesced() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let service = TestResource::converged("service", &log);
        let refreshes = Arc::clone(&service.refreshes);
        let service = graph.add(service).unwrap();

        for name in ["one", "two", "three"] {
            let source = graph.add(TestResource::new(name, &log)).unwrap();
            graph.notify(&source, &service).unwrap();
        }

        let report = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(report.summary.refreshed, 1);
        assert_eq!(
            report.get(&service).unwrap().refresh,
            Some(ApplyResult::Modified)
        );

        let events = events(&log);
        let refresh_at = position(&events, "refresh:service");
        for name in ["one", "two", "three"] {
            assert!(position(&events, &format!("apply:{name}")) < refresh_at);
        }
    }

    #[test]
    fn test_unchanged_source_does_not_notify() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let service = TestResource::converged("service", &log);
        let refreshes = Arc::clone(&service.refreshes);
        let service = graph.add(service).unwrap();
        let source = graph.add(TestResource::converged("config", &log)).unwrap();
        graph.notify(&source, &service).unwrap();

        let report = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(report.get(&service).unwrap().refresh, None);
    }

    #[test]
    fn test_failure_is_contained_to_dependents() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let x = graph.add(TestResource::failing("x", &log)).unwrap();
        let y = graph.add(TestResource::new("y", &log)).unwrap();
        let z = graph.add(TestResource::new("z", &log)).unwrap();
        let free = graph.add(TestResource::new("free", &log)).unwrap();
        graph.require(&x, &y).unwrap();
        graph.require(&y, &z).unwrap();

        let report = converge_simple(&graph, &sequential()).unwrap();
        assert!(!report.is_success());
        assert!(matches!(
            report.result(&x),
            Some(ApplyResult::Failed { error }) if error.contains("exploded")
        ));
        assert_eq!(
            report.result(&y),
            Some(&ApplyResult::DependencyFailed {
                dependency: x.to_string()
            })
        );
        assert_eq!(
            report.result(&z),
            Some(&ApplyResult::DependencyFailed {
                dependency: y.to_string()
            })
        );
        assert_eq!(report.result(&free), Some(&ApplyResult::Created));

        let events = events(&log);
        assert!(!events.contains(&"apply:y".to_string()));
        assert!(!events.contains(&"apply:z".to_string()));
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.dependency_failed, 2);
        assert_eq!(report.failures().count(), 3);
    }

    #[test]
    fn test_failure_is_contained_in_parallel_levels() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let x = graph.add(TestResource::failing("x", &log)).unwrap();
        let y = graph.add(TestResource::new("y", &log)).unwrap();
        let other = graph.add(TestResource::new("other", &log)).unwrap();
        let after_other = graph.add(TestResource::new("after-other", &log)).unwrap();
        graph.require(&x, &y).unwrap();
        graph.require(&other, &after_other).unwrap();

        let opts = ExecuteOptions {
            jobs: 4,
            ..Default::default()
        };
        let report = converge_simple(&graph, &opts).unwrap();
        assert!(matches!(
            report.result(&y),
            Some(ApplyResult::DependencyFailed { .. })
        ));
        assert_eq!(report.result(&after_other), Some(&ApplyResult::Created));
        assert!(!events(&log).contains(&"apply:y".to_string()));
    }

    #[test]
    fn test_failed_target_is_not_refreshed() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let service = TestResource::failing("service", &log);
        let refreshes = Arc::clone(&service.refreshes);
        let service = graph.add(service).unwrap();
        let source = graph.add(TestResource::new("config", &log)).unwrap();
        graph.notify(&source, &service).unwrap();

        let report = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(report.get(&service).unwrap().refresh, None);
    }

    #[test]
    fn test_created_target_is_not_refreshed() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let source = graph.add(TestResource::new("config", &log)).unwrap();
        let service = TestResource::new("service", &log);
        let refreshes = Arc::clone(&service.refreshes);
        let service = graph.add(service).unwrap();
        graph.require(&source, &service).unwrap();
        graph.notify(&source, &service).unwrap();

        let report = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(report.result(&service), Some(&ApplyResult::Created));
        assert_eq!(report.get(&service).unwrap().refresh, None);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(report.summary.refreshed, 0);
    }

    #[test]
    fn test_created_target_without_require_is_refreshed() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let service = TestResource::new("service", &log);
        let refreshes = Arc::clone(&service.refreshes);
        let service = graph.add(service).unwrap();
        let source = graph.add(TestResource::new("config", &log)).unwrap();
        graph.notify(&source, &service).unwrap();

        let report = converge_simple(&graph, &sequential()).unwrap();
        assert_eq!(report.result(&service), Some(&ApplyResult::Created));
        assert_eq!(
            report.get(&service).unwrap().refresh,
            Some(ApplyResult::Modified)
        );
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dry_run_makes_no_changes() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let service = graph
            .add(TestResource::converged("service", &log))
            .unwrap();
        let config = TestResource::new("config", &log);
        let present = Arc::clone(&config.present);
        let config = graph.add(config).unwrap();
        graph.notify(&config, &service).unwrap();

        let opts = ExecuteOptions {
            dry_run: true,
            jobs: 1,
            verbose: false,
        };
        let report = converge_simple(&graph, &opts).unwrap();

        assert!(events(&log).is_empty());
        assert!(!present.load(Ordering::SeqCst));
        assert_eq!(
            report.result(&config),
            Some(&ApplyResult::Skipped {
                reason: DRY_RUN_REASON.to_string()
            })
        );
        assert_eq!(report.result(&service), Some(&ApplyResult::Unchanged));
        assert!(matches!(
            report.get(&service).unwrap().refresh,
            Some(ApplyResult::Skipped { .. })
        ));
        assert!(report.is_success());
    }

    #[test]
    fn test_report_follows_topological_order() {
        let log = EventLog::default();
        let mut graph = DependencyGraph::new();
        let b = graph.add(TestResource::new("b", &log)).unwrap();
        let a = graph.add(TestResource::new("a", &log)).unwrap();
        graph.require(&a, &b).unwrap();

        let report = converge_simple(&graph, &sequential()).unwrap();
        let ids: Vec<_> = report.resources.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
