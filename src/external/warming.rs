//! Cache warming (§4.6): a queue of `{key, factory, ttl, priority,
//! dependencies}` executed in dependency-topological order, priority
//! descending within each ready set, in bounded batches with a small
//! inter-batch delay. Circular dependencies are silently skipped.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde_json::Value;

use crate::error::ProviderError;

use super::cache::Cache;

pub type FactoryFuture = Pin<Box<dyn Future<Output = Result<Value, ProviderError>> + Send>>;

pub struct WarmingTask {
    pub key: String,
    pub priority: i32,
    pub dependencies: Vec<String>,
    pub ttl: ChronoDuration,
    pub stale_ttl: ChronoDuration,
    pub factory: Box<dyn Fn() -> FactoryFuture + Send + Sync>,
}

#[derive(Debug, Default)]
pub struct WarmingReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped_circular: Vec<String>,
}

pub struct CacheWarmer {
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl CacheWarmer {
    pub fn new(batch_size: usize, inter_batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            inter_batch_delay,
        }
    }

    pub async fn warm(&self, cache: &Cache, tasks: Vec<WarmingTask>) -> WarmingReport {
        let (order, skipped_circular) = topological_order(&tasks);

        let mut by_key: HashMap<String, WarmingTask> = tasks.into_iter().map(|t| (t.key.clone(), t)).collect();

        let mut report = WarmingReport {
            skipped_circular,
            ..Default::default()
        };

        for batch in order.chunks(self.batch_size) {
            for key in batch {
                let Some(task) = by_key.remove(key) else { continue };
                match (task.factory)().await {
                    Ok(value) => {
                        cache.insert(&task.key, &value, task.ttl, task.stale_ttl);
                        report.succeeded.push(task.key);
                    }
                    Err(_) => report.failed.push(task.key),
                }
            }
            if !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }

        report
    }
}

/// Kahn's algorithm over the dependency graph; within each ready set,
/// orders by descending priority (stable so equal priorities keep queue
/// order). Tasks left with unresolved dependencies after the graph
/// empties out are part of a cycle and are skipped rather than run.
fn topological_order(tasks: &[WarmingTask]) -> (Vec<String>, Vec<String>) {
    let keys: HashSet<&str> = tasks.iter().map(|t| t.key.as_str()).collect();
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let priority: HashMap<&str, i32> = tasks.iter().map(|t| (t.key.as_str(), t.priority)).collect();

    for task in tasks {
        let deps_in_queue = task.dependencies.iter().filter(|d| keys.contains(d.as_str())).count();
        indegree.insert(&task.key, deps_in_queue);
        for dep in &task.dependencies {
            if keys.contains(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(&task.key);
            }
        }
    }

    let mut ready: VecDeque<&str> = tasks
        .iter()
        .map(|t| t.key.as_str())
        .filter(|k| indegree[k] == 0)
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    let mut remaining = indegree.clone();

    while !ready.is_empty() {
        let mut batch: Vec<&str> = ready.drain(..).collect();
        batch.sort_by_key(|k| std::cmp::Reverse(priority[k]));
        for key in batch {
            order.push(key.to_string());
            if let Some(next) = dependents.get(key) {
                for &dependent in next {
                    if let Some(count) = remaining.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push_back(dependent);
                        }
                    }
                }
            }
        }
    }

    let ordered: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
    let skipped = tasks
        .iter()
        .map(|t| t.key.as_str())
        .filter(|k| !ordered.contains(k))
        .map(String::from)
        .collect();

    (order, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn task(key: &str, priority: i32, deps: &[&str]) -> WarmingTask {
        WarmingTask {
            key: key.to_string(),
            priority,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            ttl: ChronoDuration::minutes(15),
            stale_ttl: ChronoDuration::minutes(60),
            factory: Box::new(|| Box::pin(async { Ok(Value::Bool(true)) })),
        }
    }

    #[test]
    fn respects_dependency_order_and_priority() {
        let tasks = vec![task("c", 5, &["a", "b"]), task("a", 1, &[]), task("b", 10, &[])];
        let (order, skipped) = topological_order(&tasks);
        assert!(skipped.is_empty());
        assert_eq!(order, vec!["b".to_string(), "a".to_string(), "c".to_string()]);
    }

    #[test]
    fn circular_dependency_is_skipped_not_run() {
        let tasks = vec![task("x", 1, &["y"]), task("y", 1, &["x"]), task("z", 1, &[])];
        let (order, skipped) = topological_order(&tasks);
        assert_eq!(order, vec!["z".to_string()]);
        let mut skipped_sorted = skipped;
        skipped_sorted.sort();
        assert_eq!(skipped_sorted, vec!["x".to_string(), "y".to_string()]);
    }

    #[tokio::test]
    async fn warm_populates_cache_and_counts_failures() {
        let clock: crate::clock::SharedClock = Arc::new(SystemClock);
        let cache = Cache::new(crate::config::CacheConfig::default(), clock);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let tasks = vec![
            task("ok", 1, &[]),
            WarmingTask {
                key: "broken".to_string(),
                priority: 1,
                dependencies: vec![],
                ttl: ChronoDuration::minutes(15),
                stale_ttl: ChronoDuration::minutes(60),
                factory: Box::new(move || {
                    attempts_clone.fetch_add(1, Ordering::SeqCst);
                    Box::pin(async { Err(ProviderError::NotConfigured) })
                }),
            },
        ];

        let warmer = CacheWarmer::new(10, Duration::ZERO);
        let report = warmer.warm(&cache, tasks).await;
        assert_eq!(report.succeeded, vec!["ok".to_string()]);
        assert_eq!(report.failed, vec!["broken".to_string()]);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(cache.get_fresh::<Value>("ok").is_some());
    }
}
