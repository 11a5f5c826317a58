use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fleetroll_core::*;
use fleetroll_exec::error::ExecError;
use fleetroll_exec::result::CommandResult;
use fleetroll_exec::traits::CommandRunner;

// Mock implementations

/// Runner driven by a closure, recording every command it sees
struct ScriptedRunner {
    script: Box<dyn Fn(&str) -> Result<CommandResult, ExecError> + Send + Sync>,
    log: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn new(
        script: impl Fn(&str) -> Result<CommandResult, ExecError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            log: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn saw_command(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.log.lock().unwrap().push(cmd.to_string());
        (self.script)(cmd)
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.run(cmd).await
    }

    fn runner_type(&self) -> &'static str {
        "scripted"
    }
}

fn ok(stdout: &str) -> Result<CommandResult, ExecError> {
    Ok(CommandResult {
        status: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: Duration::from_millis(1),
    })
}

fn conn_refused() -> Result<CommandResult, ExecError> {
    Err(ExecError::ConnectionFailed("connection refused".to_string()))
}

/// Script for a healthy host whose deployed configuration changes nothing
fn steady_host(cmd: &str) -> Result<CommandResult, ExecError> {
    match cmd {
        "echo ok" => ok("ok\n"),
        "uname -r" => ok("6.6.32\n"),
        c if c.contains("kernel-modules") => ok("6.6.32\n"),
        c if c.contains("kernel-params") => ok("loglevel=4 nohibernate\n"),
        _ => ok(""),
    }
}

/// Script for a host whose pending kernel differs from the running one
fn kernel_update_host(cmd: &str) -> Result<CommandResult, ExecError> {
    match cmd {
        "echo ok" => ok("ok\n"),
        "uname -r" => ok("6.6.32\n"),
        c if c.contains("kernel-modules") => ok("6.6.41\n"),
        c if c.contains("kernel-params") => ok("loglevel=4\n"),
        _ => ok(""),
    }
}

struct PerHostFactory {
    runners: HashMap<String, Arc<ScriptedRunner>>,
}

impl RunnerFactory for PerHostFactory {
    fn runner_for(&self, host: &HostConfig) -> Arc<dyn CommandRunner> {
        self.runners
            .get(&host.name)
            .unwrap_or_else(|| panic!("no runner scripted for {}", host.name))
            .clone()
    }
}

/// Deployer that records calls and optionally fails applies
struct RecordingDeployer {
    applies: Mutex<Vec<String>>,
    builds: Mutex<Vec<String>>,
    fail_apply: bool,
}

impl RecordingDeployer {
    fn new() -> Self {
        Self {
            applies: Mutex::new(Vec::new()),
            builds: Mutex::new(Vec::new()),
            fail_apply: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_apply: true,
            ..Self::new()
        }
    }

    fn applied(&self) -> Vec<String> {
        self.applies.lock().unwrap().clone()
    }

    fn built(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigDeployer for RecordingDeployer {
    async fn apply(&self, host: &HostConfig) -> Result<(), RolloutError> {
        self.applies.lock().unwrap().push(host.name.clone());
        if self.fail_apply {
            return Err(RolloutError::DeployFailed("activation failed".to_string()));
        }
        Ok(())
    }

    async fn build(&self, host: &HostConfig) -> Result<(), RolloutError> {
        self.builds.lock().unwrap().push(host.name.clone());
        Ok(())
    }
}

/// Cluster that always reports the same readiness
struct StaticCluster {
    ready: bool,
    queries: AtomicU32,
}

impl StaticCluster {
    fn ready() -> Self {
        Self {
            ready: true,
            queries: AtomicU32::new(0),
        }
    }

    fn never_ready() -> Self {
        Self {
            ready: false,
            queries: AtomicU32::new(0),
        }
    }

    fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterClient for StaticCluster {
    async fn node_ready(&self, _node: &str) -> Result<NodeReadiness, RolloutError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(NodeReadiness {
            ready: self.ready,
            status: if self.ready { "True" } else { "False" }.to_string(),
        })
    }
}

/// Clock whose sleeps return immediately
struct NullClock;

#[async_trait]
impl Clock for NullClock {
    async fn sleep(&self, _duration: Duration) {}
}

fn host(name: &str) -> HostConfig {
    HostConfig {
        name: name.to_string(),
        addr: format!("{name}.home.arpa"),
        flake_attr: name.to_string(),
        user: None,
    }
}

fn config(mode: RolloutMode, reboot_policy: RebootPolicy) -> RolloutConfig {
    RolloutConfig {
        mode,
        reboot_policy,
        timing: Timing::default(),
    }
}

fn orchestrator(
    hosts: Vec<HostConfig>,
    cfg: RolloutConfig,
    factory: PerHostFactory,
    deployer: Arc<RecordingDeployer>,
    cluster: Arc<StaticCluster>,
) -> FleetOrchestrator {
    FleetOrchestrator::new(
        hosts,
        cfg,
        Arc::new(factory),
        deployer,
        cluster,
        Arc::new(NullClock),
    )
}

#[tokio::test]
async fn test_fleet_stops_at_first_failure() {
    let hosts: Vec<HostConfig> = ["node-1", "node-2", "node-3", "node-4"]
        .iter()
        .map(|n| host(n))
        .collect();

    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), Arc::new(ScriptedRunner::new(steady_host)));
    runners.insert(
        "node-2".to_string(),
        Arc::new(ScriptedRunner::new(|_| conn_refused())),
    );
    runners.insert("node-3".to_string(), Arc::new(ScriptedRunner::new(steady_host)));
    runners.insert("node-4".to_string(), Arc::new(ScriptedRunner::new(steady_host)));
    let node3 = runners["node-3"].clone();

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        hosts,
        config(RolloutMode::Deploy, RebootPolicy::Auto),
        PerHostFactory { runners },
        deployer.clone(),
        cluster,
    )
    .run()
    .await;

    assert!(!summary.success());
    assert_eq!(summary.failed.as_deref(), Some("node-2"));
    assert_eq!(summary.outcomes.len(), 2);

    assert!(summary.outcomes[0].succeeded);
    assert_eq!(summary.outcomes[0].stage, RolloutStage::AwaitClusterHealth);

    assert!(!summary.outcomes[1].succeeded);
    assert_eq!(summary.outcomes[1].stage, RolloutStage::CheckReachable);

    // Hosts after the failure were never touched
    assert_eq!(deployer.applied(), vec!["node-1"]);
    assert!(node3.commands().is_empty());
}

#[tokio::test]
async fn test_dry_run_never_mutates() {
    let runner = Arc::new(ScriptedRunner::new(steady_host));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner.clone());

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::DryRun, RebootPolicy::Auto),
        PerHostFactory { runners },
        deployer.clone(),
        cluster.clone(),
    )
    .run()
    .await;

    assert!(summary.success());
    assert_eq!(summary.outcomes[0].stage, RolloutStage::BuildOnly);

    assert!(deployer.applied().is_empty());
    assert_eq!(deployer.built(), vec!["node-1"]);
    assert_eq!(cluster.query_count(), 1);
    assert!(!runner.saw_command("reboot"));
}

#[tokio::test]
async fn test_no_reboot_policy_suppresses_despite_kernel_change() {
    let runner = Arc::new(ScriptedRunner::new(kernel_update_host));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner.clone());

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::Deploy, RebootPolicy::Suppressed),
        PerHostFactory { runners },
        deployer,
        cluster,
    )
    .run()
    .await;

    assert!(summary.success());
    assert_eq!(summary.outcomes[0].stage, RolloutStage::AwaitClusterHealth);
    assert!(!runner.saw_command("reboot"));
    // Suppressed never consults the decision engine
    assert!(!runner.saw_command("uname -r"));
}

#[tokio::test]
async fn test_forced_reboot_without_kernel_change() {
    let runner = Arc::new(ScriptedRunner::new(steady_host));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner.clone());

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::Deploy, RebootPolicy::Forced),
        PerHostFactory { runners },
        deployer,
        cluster,
    )
    .run()
    .await;

    assert!(summary.success());
    assert!(runner.saw_command("systemctl reboot"));
    // Forced never consults the decision engine either
    assert!(!runner.saw_command("uname -r"));
}

#[tokio::test]
async fn test_reboot_connection_drop_is_tolerated() {
    // The reboot command drops the connection; probes keep answering
    let runner = Arc::new(ScriptedRunner::new(|cmd| {
        if cmd.contains("systemctl reboot") {
            conn_refused()
        } else {
            kernel_update_host(cmd)
        }
    }));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner.clone());

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::Deploy, RebootPolicy::Auto),
        PerHostFactory { runners },
        deployer,
        cluster,
    )
    .run()
    .await;

    assert!(summary.success());
    assert!(runner.saw_command("systemctl reboot"));
    assert_eq!(summary.outcomes[0].stage, RolloutStage::AwaitClusterHealth);
}

#[tokio::test]
async fn test_recovery_timeout_fails_host_at_reboot_stage() {
    // Once the reboot fires the host never answers again
    let down = Arc::new(AtomicBool::new(false));
    let down_flag = down.clone();
    let runner = Arc::new(ScriptedRunner::new(move |cmd| {
        if cmd.contains("systemctl reboot") {
            down_flag.store(true, Ordering::SeqCst);
            return conn_refused();
        }
        if down_flag.load(Ordering::SeqCst) {
            conn_refused()
        } else {
            steady_host(cmd)
        }
    }));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner.clone());

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::Deploy, RebootPolicy::Forced),
        PerHostFactory { runners },
        deployer,
        cluster.clone(),
    )
    .run()
    .await;

    assert!(!summary.success());
    let failed = summary.failed_outcome().unwrap();
    assert_eq!(failed.stage, RolloutStage::Reboot);
    assert!(failed.detail.as_ref().unwrap().contains("did not come back"));
    // Health polling never starts for a host that never recovered
    assert_eq!(cluster.query_count(), 0);
}

#[tokio::test]
async fn test_health_exhaustion_fails_host() {
    let runner = Arc::new(ScriptedRunner::new(steady_host));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner);

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::never_ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::Deploy, RebootPolicy::Auto),
        PerHostFactory { runners },
        deployer,
        cluster.clone(),
    )
    .run()
    .await;

    assert!(!summary.success());
    let failed = summary.failed_outcome().unwrap();
    assert_eq!(failed.stage, RolloutStage::AwaitClusterHealth);
    assert_eq!(cluster.query_count(), 12);
}

#[tokio::test]
async fn test_dry_run_unhealthy_node_fails_before_build() {
    let runner = Arc::new(ScriptedRunner::new(steady_host));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner);

    let deployer = Arc::new(RecordingDeployer::new());
    let cluster = Arc::new(StaticCluster::never_ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::DryRun, RebootPolicy::Auto),
        PerHostFactory { runners },
        deployer.clone(),
        cluster,
    )
    .run()
    .await;

    assert!(!summary.success());
    let failed = summary.failed_outcome().unwrap();
    assert_eq!(failed.stage, RolloutStage::AwaitClusterHealth);
    assert!(deployer.built().is_empty());
}

#[tokio::test]
async fn test_deploy_failure_stops_before_reboot_decision() {
    let runner = Arc::new(ScriptedRunner::new(kernel_update_host));
    let mut runners = HashMap::new();
    runners.insert("node-1".to_string(), runner.clone());

    let deployer = Arc::new(RecordingDeployer::failing());
    let cluster = Arc::new(StaticCluster::ready());

    let summary = orchestrator(
        vec![host("node-1")],
        config(RolloutMode::Deploy, RebootPolicy::Auto),
        PerHostFactory { runners },
        deployer,
        cluster,
    )
    .run()
    .await;

    assert!(!summary.success());
    let failed = summary.failed_outcome().unwrap();
    assert_eq!(failed.stage, RolloutStage::Deploy);
    // A failed deploy means the kernel comparison never runs
    assert!(!runner.saw_command("uname -r"));
}
