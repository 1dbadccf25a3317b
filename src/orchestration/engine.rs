//! Engine driving task resolution and graph traversal.
//!
//! Decompositions nest arbitrarily deep, so the engine does not recurse on
//! the call stack. A run keeps an arena of graph slots, a queue of pending
//! steps and a set of in-flight oracle calls, all driven from one task:
//!
//! - a *visit* is one arrival of the traversal at a node
//! - non-conditional nodes fan out to every successor
//! - end markers join: a graph completes once every visit has finished or
//!   is parked at an end marker, and only then records `DONE`
//! - a completed graph resolves the node that decomposed into it
//!
//! Oracle calls are the only suspension points and run concurrently.

use crate::core::{LedgerEntry, TaskGraph, TaskNode, DONE};
use crate::error::{Error, Result};
use crate::oracle::{OracleRequest, OracleResponse, ReasoningOracle, Verdict};
use crate::orchestration::prompt;
use crate::util::bounded;
use crate::{twlog, twlog_debug, twlog_error, twlog_warn};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default bound on a single oracle call (10 minutes).
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 600;

/// Queued steps handled between cooperative yields.
const STEPS_PER_YIELD: usize = 64;

/// Engine limits. Only the oracle timeout is set by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on each oracle call; `None` waits forever.
    pub oracle_timeout: Option<Duration>,
    /// Deepest allowed graph nesting (the root's own graph is depth 1).
    pub max_depth: Option<usize>,
    /// Most node visits allowed in one run.
    pub max_visits: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Some(Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS)),
            max_depth: None,
            max_visits: None,
        }
    }
}

/// Identifier of one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters collected during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub oracle_calls: usize,
    pub graphs_built: usize,
    pub visits: usize,
    pub cache_hits: usize,
}

/// Outcome of resolving a task.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub run_id: RunId,
    /// The resolved task; `output` holds its answer (or `DONE` when decomposed).
    pub node: TaskNode,
    /// Ledger snapshot taken when the run finished.
    pub ledger: Vec<LedgerEntry>,
    pub stats: RunStats,
}

impl Resolution {
    pub fn answer(&self) -> Option<&Value> {
        self.node.output.as_ref()
    }
}

/// Resolves tasks and executes task graphs against a reasoning oracle.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use taskweave::core::{Ledger, TaskNode};
/// use taskweave::oracle::ClaudeOracle;
/// use taskweave::orchestration::Engine;
///
/// let engine = Engine::new(Arc::new(ClaudeOracle::new()?));
/// let root = TaskNode::new("plan", "Solve the problem correctly.", Ledger::seeded("2+2=?", "RUNNING"));
/// let resolution = engine.resolve(root).await?;
/// println!("{:?}", resolution.answer());
/// ```
pub struct Engine {
    oracle: Arc<dyn ReasoningOracle>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self {
            oracle,
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Abort runs when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve a task: answer it directly or decompose and execute the
    /// resulting graphs until every leaf is answered.
    ///
    /// Exactly the records produced by the resolution are appended to the
    /// task's ledger.
    pub async fn resolve(&self, node: TaskNode) -> Result<Resolution> {
        let ledger = node.ledger().clone();
        let mut run = Run::new(self, Some(node));
        let request = prompt::resolution_request(run.node(Site::Root)?);
        twlog!("Run {}: resolving '{}'", run.id.short(), request.task);
        run.ask(Awaiting::Resolution(Site::Root), request);
        run.finish().await?;

        let Run {
            id, root, stats, ..
        } = run;
        let node = root.ok_or(Error::Stalled)?;
        Ok(Resolution {
            run_id: id,
            node,
            ledger: ledger.snapshot(),
            stats,
        })
    }

    /// Traverse `graph` from its start node and return the ledger snapshot.
    pub async fn execute(&self, graph: TaskGraph) -> Result<Vec<LedgerEntry>> {
        let start = graph.start_index().ok_or_else(|| Error::MalformedDecomposition {
            task: graph.parent().unwrap_or("<graph>").to_string(),
            reason: "graph has no start node".to_string(),
            payload: String::new(),
        })?;
        let ledger = graph.ledger().clone();

        let mut run = Run::new(self, None);
        twlog!("Run {}: executing {:?}", run.id.short(), graph);
        let slot = run.push_slot(graph, None, 1);
        run.enter(slot, start);
        run.finish().await?;

        Ok(ledger.snapshot())
    }
}

/// Where a resolving task lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Root,
    Node { graph: usize, node: NodeIndex },
}

/// What an in-flight oracle call will settle.
#[derive(Debug, Clone, Copy)]
enum Awaiting {
    Resolution(Site),
    Selection { graph: usize, node: NodeIndex },
}

#[derive(Debug)]
enum Step {
    Visit { graph: usize, node: NodeIndex },
    Resolved { site: Site, value: Value },
}

type Inflight = FuturesUnordered<BoxFuture<'static, (Awaiting, Result<OracleResponse>)>>;

/// A graph taking part in a run.
struct Slot {
    graph: TaskGraph,
    /// Task that decomposed into this graph; `None` for a top-level execute.
    owner: Option<Site>,
    depth: usize,
    /// Visits started but not finished, parked end visits included.
    active: usize,
    /// Visits that arrived at an end marker and wait for the join.
    parked: usize,
    /// Key of the `DONE` record, set once an end marker is reached.
    end_record: Option<String>,
    /// Nodes whose resolution is underway.
    resolving: HashSet<NodeIndex>,
    /// Visits parked until a node in `resolving` finishes.
    waiters: HashMap<NodeIndex, usize>,
}

struct Run<'e> {
    engine: &'e Engine,
    id: RunId,
    root: Option<TaskNode>,
    slots: Vec<Slot>,
    queue: VecDeque<Step>,
    inflight: Inflight,
    stats: RunStats,
    finished: bool,
}

impl<'e> Run<'e> {
    fn new(engine: &'e Engine, root: Option<TaskNode>) -> Self {
        Self {
            engine,
            id: RunId::new(),
            root,
            slots: Vec::new(),
            queue: VecDeque::new(),
            inflight: FuturesUnordered::new(),
            stats: RunStats::default(),
            finished: false,
        }
    }

    fn node(&self, site: Site) -> Result<&TaskNode> {
        match site {
            Site::Root => self.root.as_ref().ok_or(Error::Stalled),
            Site::Node { graph, node } => Ok(self.slots[graph].graph.node_at(node)),
        }
    }

    fn node_mut(&mut self, site: Site) -> Result<&mut TaskNode> {
        match site {
            Site::Root => self.root.as_mut().ok_or(Error::Stalled),
            Site::Node { graph, node } => Ok(self.slots[graph].graph.node_at_mut(node)),
        }
    }

    fn push_slot(&mut self, graph: TaskGraph, owner: Option<Site>, depth: usize) -> usize {
        self.slots.push(Slot {
            graph,
            owner,
            depth,
            active: 0,
            parked: 0,
            end_record: None,
            resolving: HashSet::new(),
            waiters: HashMap::new(),
        });
        self.stats.graphs_built += 1;
        self.slots.len() - 1
    }

    /// Drive queued steps and oracle calls until the run completes.
    async fn finish(&mut self) -> Result<()> {
        let result = self.drive().await;
        match &result {
            Ok(()) => twlog!("Run {}: finished {:?}", self.id.short(), self.stats),
            Err(e) => twlog_error!("Run {}: failed: {}", self.id.short(), e),
        }
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let cancel = self.engine.cancel.clone();
        loop {
            let mut handled = 0usize;
            while let Some(step) = self.queue.pop_front() {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                match step {
                    Step::Visit { graph, node } => self.visit(graph, node)?,
                    Step::Resolved { site, value } => self.resolved(site, value)?,
                }
                // Cached loops never reach an oracle call; let other tasks run.
                handled += 1;
                if handled % STEPS_PER_YIELD == 0 {
                    tokio::task::yield_now().await;
                }
            }
            if self.finished {
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = self.inflight.next() => next,
            };
            match next {
                Some((awaiting, response)) => self.settle(awaiting, response?)?,
                None => return Err(Error::Stalled),
            }
        }
    }

    /// Send a request to the oracle without waiting for it.
    fn ask(&mut self, awaiting: Awaiting, request: OracleRequest) {
        self.stats.oracle_calls += 1;
        let oracle = Arc::clone(&self.engine.oracle);
        let limit = self.engine.config.oracle_timeout;
        self.inflight.push(Box::pin(async move {
            let response = match bounded(limit, oracle.complete(&request)).await {
                Ok(response) => response,
                Err(after) => Err(Error::OracleTimeout {
                    task: request.task.clone(),
                    after,
                }),
            };
            (awaiting, response)
        }));
    }

    /// Start a visit of `node` in `graph`.
    fn enter(&mut self, graph: usize, node: NodeIndex) {
        self.slots[graph].active += 1;
        self.queue.push_back(Step::Visit { graph, node });
    }

    fn visit(&mut self, graph: usize, node: NodeIndex) -> Result<()> {
        self.stats.visits += 1;
        if let Some(limit) = self.engine.config.max_visits {
            if self.stats.visits > limit {
                return Err(Error::VisitLimitExceeded { limit });
            }
        }

        let slot = &mut self.slots[graph];
        let task = slot.graph.node_at(node);
        let name = task.name.clone();
        let ledger = task.ledger().clone();

        if task.is_end_marker() {
            let key = task.parent.clone().unwrap_or(name);
            slot.end_record.get_or_insert(key);
            slot.parked += 1;
            return self.try_join(graph);
        }

        if let Some(value) = slot.graph.cache().get(&name).cloned() {
            twlog_debug!("Cache hit for '{}'", name);
            self.stats.cache_hits += 1;
            ledger.append(name, value);
            return self.dispatch(graph, node);
        }

        if slot.resolving.contains(&node) {
            twlog_debug!("'{}' is already resolving; waiting for its result", name);
            *slot.waiters.entry(node).or_insert(0) += 1;
            return Ok(());
        }

        slot.resolving.insert(node);
        let request = prompt::resolution_request(slot.graph.node_at(node));
        self.ask(Awaiting::Resolution(Site::Node { graph, node }), request);
        Ok(())
    }

    fn settle(&mut self, awaiting: Awaiting, response: OracleResponse) -> Result<()> {
        match awaiting {
            Awaiting::Resolution(site) => {
                let name = self.node(site)?.name.clone();
                match Verdict::from_response(&name, response)? {
                    Verdict::DirectAnswer(answer) => {
                        twlog_debug!("'{}' answered directly", name);
                        self.node(site)?.ledger().append(name, answer.clone());
                        self.queue.push_back(Step::Resolved { site, value: answer });
                        Ok(())
                    }
                    Verdict::Decomposition(payload) => {
                        let depth = match site {
                            Site::Root => 1,
                            Site::Node { graph, .. } => self.slots[graph].depth + 1,
                        };
                        if let Some(limit) = self.engine.config.max_depth {
                            if depth > limit {
                                return Err(Error::DepthLimitExceeded { task: name, limit });
                            }
                        }

                        let child = TaskGraph::from_decomposition(&payload, self.node(site)?)?;
                        twlog!(
                            "'{}' decomposed into {} tasks at depth {}",
                            name,
                            child.len(),
                            depth
                        );
                        let start = child.start_index().ok_or(Error::Stalled)?;
                        let slot = self.push_slot(child, Some(site), depth);
                        self.enter(slot, start);
                        Ok(())
                    }
                    Verdict::BranchChoice(choice) => Err(Error::MalformedDecomposition {
                        task: name,
                        reason: "expected an answer or a decomposition, got a branch choice"
                            .to_string(),
                        payload: choice,
                    }),
                }
            }
            Awaiting::Selection { graph, node } => self.select(graph, node, response),
        }
    }

    /// Record a finished resolution and continue every visit waiting on it.
    fn resolved(&mut self, site: Site, value: Value) -> Result<()> {
        self.node_mut(site)?.output = Some(value.clone());

        let Site::Node { graph, node } = site else {
            self.finished = true;
            return Ok(());
        };

        let slot = &mut self.slots[graph];
        let task = slot.graph.node_at(node);
        let name = task.name.clone();
        let ledger = task.ledger().clone();
        slot.graph.cache_mut().insert(name.clone(), value.clone());
        slot.resolving.remove(&node);
        let waiting = slot.waiters.remove(&node).unwrap_or(0);

        self.dispatch(graph, node)?;
        for _ in 0..waiting {
            self.stats.cache_hits += 1;
            ledger.append(name.clone(), value.clone());
            self.dispatch(graph, node)?;
        }
        Ok(())
    }

    /// Continue a visit past its node.
    fn dispatch(&mut self, graph: usize, node: NodeIndex) -> Result<()> {
        let successors = self.slots[graph].graph.successors_of(node);
        let task = self.slots[graph].graph.node_at(node);

        if task.conditional {
            if successors.is_empty() {
                twlog_debug!("Conditional '{}' has no successors", task.name);
                return self.finish_visit(graph);
            }
            let candidates: Vec<(String, Option<String>)> = successors
                .iter()
                .map(|(index, condition)| {
                    let name = self.slots[graph].graph.node_at(*index).name.clone();
                    (name, condition.clone())
                })
                .collect();
            let request = prompt::selection_request(task, &candidates);
            self.ask(Awaiting::Selection { graph, node }, request);
            return Ok(());
        }

        for (next, _) in successors {
            self.enter(graph, next);
        }
        self.finish_visit(graph)
    }

    fn select(&mut self, graph: usize, node: NodeIndex, response: OracleResponse) -> Result<()> {
        let task = self.slots[graph].graph.node_at(node).name.clone();
        let choice = match Verdict::from_response(&task, response)? {
            Verdict::BranchChoice(choice) => choice,
            other => {
                return Err(Error::MalformedDecomposition {
                    task,
                    reason: "expected next_task_name".to_string(),
                    payload: format!("{:?}", other),
                })
            }
        };

        let successors = self.slots[graph].graph.successors_of(node);
        let candidates: Vec<(NodeIndex, String)> = successors
            .into_iter()
            .map(|(index, _)| (index, self.slots[graph].graph.node_at(index).name.clone()))
            .collect();
        let matches: Vec<NodeIndex> = candidates
            .iter()
            .filter(|(_, name)| *name == choice)
            .map(|(index, _)| *index)
            .collect();

        if matches.len() != 1 {
            return Err(Error::AmbiguousBranchSelection {
                task,
                choice,
                candidates: candidates.into_iter().map(|(_, name)| name).collect(),
            });
        }

        twlog_debug!("Conditional '{}' picked '{}'", task, choice);
        self.enter(graph, matches[0]);
        self.finish_visit(graph)
    }

    /// Close one visit.
    fn finish_visit(&mut self, graph: usize) -> Result<()> {
        self.slots[graph].active -= 1;
        self.try_join(graph)
    }

    /// Complete the graph once every remaining visit is parked at an end
    /// marker. The `DONE` record is appended once, after all other records
    /// the graph produced.
    fn try_join(&mut self, graph: usize) -> Result<()> {
        let slot = &mut self.slots[graph];
        if slot.active > slot.parked {
            return Ok(());
        }
        slot.active = 0;
        slot.parked = 0;

        match slot.end_record.take() {
            Some(key) => {
                slot.graph.ledger().append(key, DONE);
            }
            None => twlog_warn!(
                "Graph for '{}' finished without reaching an end marker",
                slot.graph.parent().unwrap_or("<graph>")
            ),
        }
        match slot.owner {
            Some(site) => self.queue.push_back(Step::Resolved {
                site,
                value: Value::from(DONE),
            }),
            None => self.finished = true,
        }
        Ok(())
    }
}
