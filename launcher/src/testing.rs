//! In-memory collaborators for exercising phases without a cluster

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::cluster::api::{ClusterApi, Endpoint, ObjectKind, PodPhase, PodSummary};
use crate::errors::DeployError;
use crate::exec::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::probe::clock::ManualClock;
use crate::probe::health::HealthCheck;
use crate::probe::poll::Attempt;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pops the next entry, repeating the last one forever
fn next_of<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

type Hook = Arc<dyn Fn() + Send + Sync>;

struct Rule {
    prefix: String,
    outputs: VecDeque<CommandOutput>,
    hook: Option<Hook>,
}

/// Command runner answering from prefix rules.
///
/// The longest matching prefix wins. Unmatched commands exit 0 with no output.
#[derive(Default)]
pub struct ScriptedCommands {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    missing: Mutex<HashSet<String>>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix`; repeated calls queue outputs
    pub fn on(&self, prefix: &str, output: CommandOutput) {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(rule) => rule.outputs.push_back(output),
            None => rules.push(Rule {
                prefix: prefix.to_string(),
                outputs: VecDeque::from([output]),
                hook: None,
            }),
        }
    }

    /// Like [`Self::on`], also running `hook` each time the rule matches
    pub fn on_then(
        &self,
        prefix: &str,
        output: CommandOutput,
        hook: impl Fn() + Send + Sync + 'static,
    ) {
        self.on(prefix, output);
        let mut rules = lock(&self.rules);
        if let Some(rule) = rules.iter_mut().find(|r| r.prefix == prefix) {
            rule.hook = Some(Arc::new(hook));
        }
    }

    /// Report `program` as not installed
    pub fn missing(&self, program: &str) {
        lock(&self.missing).insert(program.to_string());
    }

    /// Command lines run so far
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Whether a command starting with `prefix` was run
    pub fn ran(&self, prefix: &str) -> bool {
        lock(&self.calls).iter().any(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommands {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        let line = spec.command_line();
        lock(&self.calls).push(line.clone());

        let (output, hook) = {
            let mut rules = lock(&self.rules);
            let rule = rules
                .iter_mut()
                .filter(|r| line.starts_with(&r.prefix))
                .max_by_key(|r| r.prefix.len());
            match rule {
                Some(rule) => (next_of(&mut rule.outputs), rule.hook.clone()),
                None => (None, None),
            }
        };
        if let Some(hook) = hook {
            hook();
        }
        Ok(output.unwrap_or_else(|| CommandOutput::exited(0, "", "")))
    }

    fn is_available(&self, program: &str) -> bool {
        !lock(&self.missing).contains(program)
    }
}

/// Cluster held in memory
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<HashMap<(ObjectKind, String), i32>>,
    pods: Mutex<HashMap<String, VecDeque<Vec<PodSummary>>>>,
    ingresses: Mutex<HashMap<String, Endpoint>>,
    routes: Mutex<HashMap<String, Endpoint>>,
    failure: Mutex<Option<String>>,
    scaled: Mutex<Vec<(ObjectKind, String, i32)>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, kind: ObjectKind, name: &str, replicas: i32) -> Self {
        self.put_object(kind, name, replicas);
        self
    }

    /// Successive `list_pods` answers for `selector`, the last one repeating
    pub fn with_pods(self, selector: &str, states: Vec<Vec<PodSummary>>) -> Self {
        lock(&self.pods).insert(selector.to_string(), states.into());
        self
    }

    /// One ready, running pod for `selector`
    pub fn with_ready_pods(self, selector: &str) -> Self {
        let name = format!("{}-0", selector.trim_start_matches("app="));
        self.with_pods(selector, vec![vec![PodSummary::new(name, PodPhase::Running, true)]])
    }

    pub fn with_ingress(self, name: &str, endpoint: Endpoint) -> Self {
        lock(&self.ingresses).insert(name.to_string(), endpoint);
        self
    }

    pub fn with_route(self, name: &str, endpoint: Endpoint) -> Self {
        lock(&self.routes).insert(name.to_string(), endpoint);
        self
    }

    /// Fail every call with a cluster API error
    pub fn failing(self, message: &str) -> Self {
        *lock(&self.failure) = Some(message.to_string());
        self
    }

    pub fn put_object(&self, kind: ObjectKind, name: &str, replicas: i32) {
        lock(&self.objects).insert((kind, name.to_string()), replicas);
    }

    /// Scale calls received, in order
    pub fn scaled(&self) -> Vec<(ObjectKind, String, i32)> {
        lock(&self.scaled).clone()
    }

    fn check(&self) -> Result<(), DeployError> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(DeployError::ClusterApi(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn replicas(
        &self,
        kind: ObjectKind,
        name: &str,
        _namespace: &str,
    ) -> Result<Option<i32>, DeployError> {
        self.check()?;
        Ok(lock(&self.objects).get(&(kind, name.to_string())).copied())
    }

    async fn scale(
        &self,
        kind: ObjectKind,
        name: &str,
        _namespace: &str,
        replicas: i32,
    ) -> Result<(), DeployError> {
        self.check()?;
        lock(&self.scaled).push((kind, name.to_string(), replicas));
        lock(&self.objects).insert((kind, name.to_string()), replicas);
        Ok(())
    }

    async fn list_pods(
        &self,
        selector: &str,
        _namespace: &str,
    ) -> Result<Vec<PodSummary>, DeployError> {
        self.check()?;
        Ok(lock(&self.pods)
            .get_mut(selector)
            .and_then(next_of)
            .unwrap_or_default())
    }

    async fn ingress(&self, name: &str, _namespace: &str) -> Result<Option<Endpoint>, DeployError> {
        self.check()?;
        Ok(lock(&self.ingresses).get(name).cloned())
    }

    async fn route(&self, name: &str, _namespace: &str) -> Result<Option<Endpoint>, DeployError> {
        self.check()?;
        Ok(lock(&self.routes).get(name).cloned())
    }
}

/// Health check answering from a queue, `Pending` once it runs dry.
///
/// Every check advances the shared clock by `latency`.
pub struct ScriptedHealth {
    clock: Arc<ManualClock>,
    latency: Duration,
    answers: Mutex<VecDeque<Attempt>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHealth {
    pub fn new(clock: Arc<ManualClock>, latency: Duration) -> Self {
        Self {
            clock,
            latency,
            answers: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, attempt: Attempt) {
        lock(&self.answers).push_back(attempt);
    }

    /// Number of checks issued
    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// URLs checked, in order
    pub fn urls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl HealthCheck for ScriptedHealth {
    async fn check(&self, url: &str, _timeout: Duration) -> Attempt {
        lock(&self.calls).push(url.to_string());
        self.clock.advance(self.latency);
        lock(&self.answers)
            .pop_front()
            .unwrap_or_else(|| Attempt::Pending("connection refused".to_string()))
    }
}
