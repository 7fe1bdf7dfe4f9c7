#![cfg(unix)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process,
    sync::atomic::AtomicBool,
};

use iam_provision::{MapSource, ProvisionConfig, ProvisionError, Provisioner};
use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard};

// Spawning a script that another test thread has just written can fail with
// `ETXTBSY`, so the tests in this file run one at a time
static SERIAL: Mutex<()> = Mutex::const_new(());

/// A stand-in for `docker` that appends its arguments to a log file and exits
/// with a configurable code per subcommand
struct FakeTool {
    dir: TempDir,
    program: PathBuf,
    log: PathBuf,
}

impl FakeTool {
    fn new(build_code: i32, run_code: i32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("fake-docker");
        let log = dir.path().join("invocations.log");
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\ncase \"$1\" in\n  build) exit {build_code} \
             ;;\n  run) exit {run_code} ;;\nesac\nexit 0\n",
            log.display()
        );
        fs::write(&program, script).unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, program, log }
    }

    fn invocations(&self) -> Vec<String> {
        match fs::read_to_string(&self.log) {
            Ok(s) => s.lines().map(str::to_owned).collect(),
            Err(_) => vec![],
        }
    }

    fn provisioner(&self, config: ProvisionConfig) -> Provisioner {
        Provisioner::new(config).program(&self.program)
    }
}

fn source() -> MapSource {
    MapSource::new()
        .with("SERVER_IP", "127.0.0.1")
        .with("SERVER_PORT", "8080")
        .with("DOCKER_EXPOSED_PORT", "80")
}

async fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().await
}

#[tokio::test]
async fn missing_host_address_issues_no_commands() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    for source in [
        MapSource::new().with("SERVER_PORT", "8080"),
        source().with("SERVER_IP", ""),
    ] {
        let res = ProvisionConfig::from_source(&source).map(|config| tool.provisioner(config));
        assert!(matches!(res, Err(ProvisionError::Configuration { .. })));
    }
    assert!(tool.invocations().is_empty());
}

#[tokio::test]
async fn missing_host_port_issues_no_commands() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    for source in [
        MapSource::new().with("SERVER_IP", "127.0.0.1"),
        source().with("SERVER_PORT", ""),
    ] {
        let res = ProvisionConfig::from_source(&source).map(|config| tool.provisioner(config));
        assert!(matches!(res, Err(ProvisionError::Configuration { .. })));
    }
    assert!(tool.invocations().is_empty());
}

#[tokio::test]
async fn build_then_run() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    tool.provisioner(config).provision().await.unwrap();
    assert_eq!(tool.invocations(), [
        "build -t iam-secure .",
        "run -d -p 127.0.0.1:8080:80 iam-secure",
    ]);
}

#[tokio::test]
async fn failed_build_never_runs() {
    let _guard = serial().await;
    let tool = FakeTool::new(3, 0);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    match tool.provisioner(config).provision().await {
        Err(e @ ProvisionError::BuildFailure { .. }) => assert_eq!(e.exit_code(), 3),
        res => panic!("expected a build failure, got {res:?}"),
    }
    assert_eq!(tool.invocations(), ["build -t iam-secure ."]);
}

#[tokio::test]
async fn failed_run_leaves_build_in_place() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 125);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    match tool.provisioner(config).provision().await {
        Err(e @ ProvisionError::RunFailure { .. }) => assert_eq!(e.exit_code(), 125),
        res => panic!("expected a run failure, got {res:?}"),
    }
    // no cleanup commands are issued
    assert_eq!(tool.invocations().len(), 2);
}

#[tokio::test]
async fn provisioning_twice_repeats_both_steps() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    let provisioner = tool.provisioner(config);
    provisioner.provision().await.unwrap();
    provisioner.provision().await.unwrap();
    let invocations = tool.invocations();
    assert_eq!(invocations.len(), 4);
    assert_eq!(
        invocations.iter().filter(|i| i.starts_with("build")).count(),
        2
    );
    assert_eq!(invocations.iter().filter(|i| i.starts_with("run")).count(), 2);
}

#[tokio::test]
async fn absent_container_port_still_runs() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    let source = MapSource::new()
        .with("SERVER_IP", "0.0.0.0")
        .with("SERVER_PORT", "443");
    let config = ProvisionConfig::from_source(&source).unwrap();
    tool.provisioner(config).provision().await.unwrap();
    assert_eq!(tool.invocations()[1], "run -d -p 0.0.0.0:443: iam-secure");
}

#[tokio::test]
async fn interrupt_during_build_skips_run() {
    static INTERRUPT: AtomicBool = AtomicBool::new(true);
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    let res = tool
        .provisioner(config)
        .interrupt_flag(&INTERRUPT)
        .provision()
        .await;
    assert!(matches!(res, Err(ProvisionError::Interrupted)));
    assert_eq!(tool.invocations(), ["build -t iam-secure ."]);
}

#[tokio::test]
async fn missing_tool_is_a_command_error() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    let res = Provisioner::new(config)
        .program(tool.dir.path().join("nonexistent"))
        .provision()
        .await;
    match res {
        Err(e @ ProvisionError::Command(_)) => assert_eq!(e.exit_code(), 1),
        res => panic!("expected a command error, got {res:?}"),
    }
}

#[tokio::test]
async fn missing_working_directory_issues_no_commands() {
    let _guard = serial().await;
    let tool = FakeTool::new(0, 0);
    let config = ProvisionConfig::from_source(&source()).unwrap();
    let res = tool
        .provisioner(config)
        .cwd(tool.dir.path().join("missing"))
        .provision()
        .await;
    assert!(matches!(res, Err(ProvisionError::Command(_))));
    assert!(tool.invocations().is_empty());
}

/// Runs the binary with a clean provisioning environment
fn binary(tool: &FakeTool, env_file: &Path) -> process::Command {
    let mut cmd = process::Command::new(env!("CARGO_BIN_EXE_iam_provision"));
    cmd.arg("--env-file")
        .arg(env_file)
        .arg("--program")
        .arg(&tool.program)
        .arg("--dir")
        .arg(tool.dir.path())
        .env_remove("SERVER_IP")
        .env_remove("SERVER_PORT")
        .env_remove("DOCKER_EXPOSED_PORT")
        .env_remove("IAM_PROVISION_ENV_FILE");
    cmd
}

#[tokio::test]
async fn binary_exit_codes() {
    let _guard = serial().await;

    let tool = FakeTool::new(0, 0);
    let env_file = tool.dir.path().join(".env");
    fs::write(
        &env_file,
        "SERVER_IP=127.0.0.1\nSERVER_PORT=8080\nDOCKER_EXPOSED_PORT=80\n",
    )
    .unwrap();
    let output = binary(&tool, &env_file).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Building Docker image: "));
    assert!(stdout.contains(" build -t iam-secure ."));
    assert!(stdout.contains("Running Docker container: "));
    assert!(stdout.contains(" run -d -p 127.0.0.1:8080:80 iam-secure"));
    assert_eq!(tool.invocations().len(), 2);

    // configuration errors happen before anything runs
    let tool = FakeTool::new(0, 0);
    let env_file = tool.dir.path().join(".env");
    fs::write(&env_file, "SERVER_PORT=8080\n").unwrap();
    let output = binary(&tool, &env_file).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("SERVER_IP"));
    assert!(tool.invocations().is_empty());

    // explicit env file that does not exist
    let output = binary(&tool, &tool.dir.path().join("nonexistent.env"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(tool.invocations().is_empty());

    // subprocess exit codes pass through
    let tool = FakeTool::new(7, 0);
    let env_file = tool.dir.path().join(".env");
    fs::write(&env_file, "SERVER_IP=127.0.0.1\nSERVER_PORT=8080\n").unwrap();
    let output = binary(&tool, &env_file).output().unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert_eq!(tool.invocations(), ["build -t iam-secure ."]);
}
