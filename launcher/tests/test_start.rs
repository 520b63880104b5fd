//! Start orchestration scenarios against in-memory collaborators

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cheup::app::options::StartOptions;
use cheup::app::state::Collaborators;
use cheup::cluster::{Endpoint, ObjectKind};
use cheup::deploy::orchestrator::{Orchestrator, StartOutcome, StartStatus};
use cheup::errors::DeployError;
use cheup::exec::CommandOutput;
use cheup::pipeline::reporter::SilentReporter;
use cheup::pipeline::TaskStatus;
use cheup::probe::{Attempt, ManualClock};
use cheup::testing::{FakeCluster, ScriptedCommands, ScriptedHealth};

const MINIKUBE_HOST: &str = "che-che.192.168.99.100.nip.io";
const MINISHIFT_HOST: &str = "che-che.192.168.42.7.nip.io";

struct Harness {
    commands: Arc<ScriptedCommands>,
    cluster: Arc<FakeCluster>,
    health: Arc<ScriptedHealth>,
    clock: Arc<ManualClock>,
    templates: tempfile::TempDir,
}

impl Harness {
    fn new(cluster: FakeCluster) -> Self {
        let clock = Arc::new(ManualClock::new());
        let templates = tempfile::tempdir().unwrap();
        for dir in ["kubernetes/helm/che", "che-operator/crds", "minishift-addon/che"] {
            std::fs::create_dir_all(templates.path().join(dir)).unwrap();
        }
        Self {
            commands: Arc::new(ScriptedCommands::new()),
            cluster: Arc::new(cluster),
            health: Arc::new(ScriptedHealth::new(clock.clone(), Duration::from_millis(10))),
            clock,
            templates,
        }
    }

    fn minikube(cluster: FakeCluster) -> Self {
        let harness = Self::new(cluster);
        let commands = &harness.commands;
        commands.on(
            "minikube status",
            CommandOutput::exited(0, "host: Running\nkubelet: Running", ""),
        );
        commands.on(
            "minikube addons list",
            CommandOutput::exited(0, "- dashboard: disabled\n- ingress: enabled\n", ""),
        );
        commands.on("minikube ip", CommandOutput::exited(0, "192.168.99.100\n", ""));
        harness
    }

    fn minishift(cluster: FakeCluster) -> Self {
        let harness = Self::new(cluster);
        let commands = &harness.commands;
        commands.on(
            "minishift status",
            CommandOutput::exited(0, "Minishift:  Running\nOpenShift:  Running", ""),
        );
        commands.on("minishift ip", CommandOutput::exited(0, "192.168.42.7", ""));
        harness
    }

    fn options(&self) -> StartOptions {
        StartOptions {
            templates: self.templates.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn orchestrator(&self, options: StartOptions) -> Orchestrator {
        let env = Collaborators {
            commands: self.commands.clone(),
            cluster: self.cluster.clone(),
            health: self.health.clone(),
            clock: self.clock.clone(),
        };
        Orchestrator::new(env, options, Arc::new(SilentReporter))
    }

    async fn start(&self, options: StartOptions) -> Result<StartOutcome, DeployError> {
        self.orchestrator(options).start().await
    }

    fn count(&self, prefix: &str) -> usize {
        self.commands.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn endpoint(host: &str) -> Endpoint {
    Endpoint {
        host: host.to_string(),
        tls: false,
    }
}

fn exposed_che() -> FakeCluster {
    FakeCluster::new()
        .with_ready_pods("app=che")
        .with_ingress("che-ingress", endpoint(MINIKUBE_HOST))
}

#[tokio::test]
async fn test_empty_namespace_installs_and_verifies() {
    let harness = Harness::minikube(exposed_che());
    harness.health.push(Attempt::Pending("status 404 Not Found".to_string()));
    harness.health.push(Attempt::Ready);

    let outcome = harness.start(harness.options()).await.unwrap();

    assert_eq!(outcome.status, StartStatus::Installed);
    assert_eq!(outcome.server_url, format!("http://{}", MINIKUBE_HOST));
    assert_eq!(outcome.context.domain.as_deref(), Some("192.168.99.100.nip.io"));

    let release = harness
        .commands
        .calls()
        .into_iter()
        .find(|c| c.starts_with("helm upgrade --install che"))
        .unwrap();
    assert!(release.contains("global.ingressDomain=192.168.99.100.nip.io"));
    let chart = Path::new("kubernetes").join("helm").join("che");
    assert!(release.contains(&chart.display().to_string()));

    let report = &outcome.report;
    assert_eq!(report.status_of("Enable minikube ingress addon"), Some(TaskStatus::Skipped));
    assert_eq!(report.status_of("Create Che Helm release"), Some(TaskStatus::Done));
    assert_eq!(report.status_of("PostgreSQL pod bootstrap: scheduling"), Some(TaskStatus::Skipped));
    assert_eq!(report.status_of("Che pod bootstrap: starting"), Some(TaskStatus::Done));
    assert_eq!(report.status_of("Che status check"), Some(TaskStatus::Done));
    assert!(report.skipped_phases.is_empty());

    assert_eq!(harness.health.calls(), 2);
    assert_eq!(
        harness.health.urls()[0],
        format!("http://{}/api/system/state", MINIKUBE_HOST)
    );
    assert!(harness.cluster.scaled().is_empty());
}

#[tokio::test]
async fn test_stopped_deployment_is_scaled_up_without_install() {
    let cluster = exposed_che()
        .with_object(ObjectKind::Deployment, "che", 0)
        .with_object(ObjectKind::Deployment, "postgres", 0)
        .with_ready_pods("app=postgres");
    let harness = Harness::minikube(cluster);
    harness.health.push(Attempt::Ready);

    let outcome = harness.start(harness.options()).await.unwrap();

    assert_eq!(outcome.status, StartStatus::Resumed);
    assert!(outcome.context.scaled_up);
    assert_eq!(
        harness.cluster.scaled(),
        vec![
            (ObjectKind::Deployment, "postgres".to_string(), 1),
            (ObjectKind::Deployment, "che".to_string(), 1),
        ]
    );
    assert_eq!(harness.count("helm"), 0);
    assert_eq!(outcome.report.skipped_phases.len(), 1);
    assert_eq!(
        outcome.report.status_of("PostgreSQL pod bootstrap: starting"),
        Some(TaskStatus::Done)
    );
    assert_eq!(
        outcome.report.status_of("Keycloak pod bootstrap: scheduling"),
        Some(TaskStatus::Skipped)
    );
    assert_eq!(outcome.report.status_of("Che status check"), Some(TaskStatus::Done));
}

#[tokio::test]
async fn test_second_run_only_reports_url() {
    let harness = Harness::minikube(exposed_che());
    let cluster = harness.cluster.clone();
    harness.commands.on_then(
        "helm upgrade --install",
        CommandOutput::exited(0, "Release \"che\" has been upgraded.", ""),
        move || cluster.put_object(ObjectKind::Deployment, "che", 1),
    );
    harness.health.push(Attempt::Ready);

    let first = harness.start(harness.options()).await.unwrap();
    assert_eq!(first.status, StartStatus::Installed);

    let second = harness.start(harness.options()).await.unwrap();
    assert_eq!(second.status, StartStatus::AlreadyRunning);
    assert_eq!(second.server_url, first.server_url);
    assert_eq!(harness.count("helm upgrade"), 1);
    assert_eq!(second.report.skipped_phases.len(), 2);
    assert!(second
        .report
        .tasks
        .iter()
        .all(|t| t.title != "Create Che Helm release"));
    assert_eq!(harness.health.calls(), 1);
}

#[tokio::test]
async fn test_stopped_deployment_config_on_minishift() {
    let cluster = FakeCluster::new()
        .with_object(ObjectKind::DeploymentConfig, "che", 0)
        .with_object(ObjectKind::DeploymentConfig, "keycloak", 0)
        .with_ready_pods("app=keycloak")
        .with_ready_pods("app=che")
        .with_route("che", endpoint(MINISHIFT_HOST));
    let harness = Harness::minishift(cluster);
    harness.health.push(Attempt::Ready);

    let options = StartOptions {
        platform: "minishift".to_string(),
        ..harness.options()
    };
    let outcome = harness.start(options).await.unwrap();

    assert_eq!(outcome.status, StartStatus::Resumed);
    assert!(outcome.context.deployment_config_exists());
    assert_eq!(outcome.server_url, format!("http://{}", MINISHIFT_HOST));
    assert_eq!(
        harness.cluster.scaled(),
        vec![
            (ObjectKind::DeploymentConfig, "keycloak".to_string(), 1),
            (ObjectKind::DeploymentConfig, "che".to_string(), 1),
        ]
    );
    assert_eq!(outcome.report.status_of("Scaling up Che Deployment"), Some(TaskStatus::Skipped));
    assert_eq!(outcome.report.status_of("Scaling up Che DeploymentConfig"), Some(TaskStatus::Done));
    assert_eq!(harness.count("minishift addons"), 0);
}

#[tokio::test]
async fn test_minishift_addon_install_forces_single_user() {
    let cluster = FakeCluster::new()
        .with_ready_pods("app=che")
        .with_route("che", endpoint(MINISHIFT_HOST));
    let harness = Harness::minishift(cluster);
    harness.commands.on(
        "minishift addons install",
        CommandOutput::exited(1, "", "Addon 'che' is already installed"),
    );
    harness.health.push(Attempt::Ready);

    let options = StartOptions {
        platform: "minishift".to_string(),
        installer: "minishift-addon".to_string(),
        multiuser: true,
        ..harness.options()
    };
    let outcome = harness.start(options).await.unwrap();

    assert!(!outcome.context.multiuser);
    assert_eq!(harness.count("minishift addons apply che"), 1);
    assert_eq!(
        outcome.report.status_of("Keycloak pod bootstrap: scheduling"),
        Some(TaskStatus::Skipped)
    );
}

#[tokio::test]
async fn test_operator_install_in_multiuser_mode() {
    let cluster = exposed_che()
        .with_ready_pods("app=postgres")
        .with_ready_pods("app=keycloak");
    let harness = Harness::minikube(cluster);
    harness.commands.on(
        "kubectl create namespace che",
        CommandOutput::exited(
            1,
            "",
            "Error from server (AlreadyExists): namespaces \"che\" already exists",
        ),
    );
    harness.health.push(Attempt::Ready);

    let options = StartOptions {
        multiuser: true,
        ..harness.options()
    };
    let outcome = harness.start(options).await.unwrap();

    assert_eq!(outcome.status, StartStatus::Installed);
    assert_eq!(harness.count("kubectl apply -f"), 6);
    assert_eq!(harness.count("kubectl patch checluster/eclipse-che"), 1);
    assert_eq!(
        outcome.report.status_of("PostgreSQL pod bootstrap: starting"),
        Some(TaskStatus::Done)
    );
    assert_eq!(
        outcome.report.status_of("Keycloak pod bootstrap: starting"),
        Some(TaskStatus::Done)
    );
}

#[tokio::test]
async fn test_missing_binary_aborts_before_any_command() {
    let harness = Harness::minikube(exposed_che());
    harness.commands.missing("minikube");

    let err = harness.start(harness.options()).await.unwrap_err();

    assert!(matches!(err, DeployError::MissingPrerequisite(ref p) if p == "minikube"));
    assert!(harness.commands.calls().is_empty());
}

#[tokio::test]
async fn test_stopped_minikube_is_not_ready() {
    let harness = Harness::new(exposed_che());
    harness.commands.on("minikube status", CommandOutput::exited(7, "host: Stopped", ""));

    let err = harness.start(harness.options()).await.unwrap_err();

    assert_eq!(err.code(), "E_PLATFORM_NOT_READY");
    assert!(err.to_string().contains("minikube start --memory=4096 --cpus=4 --disk-size=50g"));
    assert_eq!(harness.count("helm"), 0);
}

#[tokio::test]
async fn test_server_never_healthy_is_a_probe_timeout() {
    let harness = Harness::minikube(exposed_che());

    let options = StartOptions {
        server_boot_timeout: Duration::from_secs(2),
        ..harness.options()
    };
    let err = harness.start(options).await.unwrap_err();

    match err {
        DeployError::ProbeTimeout { url, timeout } => {
            assert_eq!(url, format!("http://{}/api/system/state", MINIKUBE_HOST));
            assert_eq!(timeout, Duration::from_secs(2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.clock.elapsed() >= Duration::from_secs(2));
    assert!(harness.clock.elapsed() <= Duration::from_millis(2010));
}

#[tokio::test]
async fn test_unscheduled_pods_time_out_after_install() {
    let cluster = FakeCluster::new().with_ingress("che-ingress", endpoint(MINIKUBE_HOST));
    let harness = Harness::minikube(cluster);

    let err = harness.start(harness.options()).await.unwrap_err();

    match err {
        DeployError::LifecycleTimeout { selector, stage, .. } => {
            assert_eq!(selector, "app=che");
            assert_eq!(stage, "Scheduled");
        }
        other => panic!("unexpected error: {other}"),
    }
    // nothing is rolled back
    assert_eq!(harness.count("helm upgrade"), 1);
    assert_eq!(harness.clock.elapsed(), Duration::from_secs(300));
}

#[tokio::test]
async fn test_unknown_installer_fails_before_mutation() {
    let harness = Harness::minikube(exposed_che());

    let options = StartOptions {
        installer: "kustomize".to_string(),
        ..harness.options()
    };
    let err = harness.start(options).await.unwrap_err();

    assert!(matches!(err, DeployError::UnsupportedConfiguration(_)));
    assert!(harness.commands.calls().is_empty());
}
