//! The configuration-store adapter. Three transports share one trait;
//! the actual backing driver (in-process) or CLI protocol (subprocess) is
//! an external collaborator with a narrow contract, not implemented here.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

use archiver_utils::ArchiverError;
use camino::{Utf8Path, Utf8PathBuf};

use crate::process::{run_with_timeout, CommandSpec};

fn store_error(message: impl Into<String>, run: Option<u32>) -> ArchiverError {
    ArchiverError::ConfigurationStore { message: message.into(), stage: None, run, context: BTreeMap::new() }
}

pub trait ConfigStore: Send + Sync {
    fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError>;
    fn resolve_config_name(&self, run_number: u32) -> Result<String, ArchiverError>;
    fn insert(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError>;
    fn update(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError>;
    fn export(&self, run_number: u32, destination_dir: &Utf8Path) -> Result<(), ArchiverError>;

    /// `Some(1)` when the adapter can only serve one call at a time; the
    /// stage engine clamps its worker pool to this value.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }
}

/// The in-process driver contract. Out of scope per the pipeline's own
/// responsibilities; narrow and `&mut self` because a driver isn't
/// presumed thread-safe.
pub trait ConfigStoreDriver: Send {
    fn list_runs(&mut self) -> Result<BTreeSet<u32>, ArchiverError>;
    fn resolve_config_name(&mut self, run_number: u32) -> Result<String, ArchiverError>;
    fn insert(&mut self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError>;
    fn update(&mut self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError>;
    fn export(&mut self, run_number: u32, destination_dir: &Utf8Path) -> Result<(), ArchiverError>;
}

pub struct DriverConfigStore {
    driver: Mutex<Box<dyn ConfigStoreDriver>>,
}

impl DriverConfigStore {
    pub fn new(driver: Box<dyn ConfigStoreDriver>) -> Self {
        Self { driver: Mutex::new(driver) }
    }
}

impl ConfigStore for DriverConfigStore {
    fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError> {
        self.driver.lock().expect("driver mutex poisoned").list_runs()
    }

    fn resolve_config_name(&self, run_number: u32) -> Result<String, ArchiverError> {
        self.driver.lock().expect("driver mutex poisoned").resolve_config_name(run_number)
    }

    fn insert(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
        self.driver.lock().expect("driver mutex poisoned").insert(run_number, config_name, dir)
    }

    fn update(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
        self.driver.lock().expect("driver mutex poisoned").update(run_number, config_name, dir)
    }

    fn export(&self, run_number: u32, destination_dir: &Utf8Path) -> Result<(), ArchiverError> {
        self.driver.lock().expect("driver mutex poisoned").export(run_number, destination_dir)
    }

    fn max_concurrency(&self) -> Option<usize> {
        Some(1)
    }
}

/// Invokes an external CLI tool, argv-only, subcommand per operation.
/// Protocol: `list-runs` prints one run number per line to stdout;
/// `resolve-config-name <run>` prints the name or exits nonzero;
/// `insert`/`update <run> <config_name> <dir>`; `export <run> <dir>`.
pub struct CliConfigStore {
    tool: Utf8PathBuf,
    timeout: Duration,
}

impl CliConfigStore {
    pub fn new(tool: Utf8PathBuf, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    fn run(&self, args: &[&str], run: Option<u32>) -> Result<crate::process::ProcessOutput, ArchiverError> {
        let cmd = CommandSpec::new(self.tool.as_str()).args(args.iter().copied());
        let out = run_with_timeout(&cmd, self.timeout).map_err(|e| store_error(e.to_string(), run))?;
        if out.timed_out {
            return Err(store_error(format!("{} timed out after {:?}", self.tool, self.timeout), run));
        }
        Ok(out)
    }
}

impl ConfigStore for CliConfigStore {
    fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError> {
        let out = self.run(&["list-runs"], None)?;
        if !out.success() {
            return Err(store_error(format!("list-runs failed: {}", out.stderr_string()), None));
        }
        Ok(out.stdout_string().lines().filter_map(|l| l.trim().parse::<u32>().ok()).collect())
    }

    fn resolve_config_name(&self, run_number: u32) -> Result<String, ArchiverError> {
        let out = self.run(&["resolve-config-name", &run_number.to_string()], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("not-found: run {run_number}"), Some(run_number)));
        }
        Ok(out.stdout_string().trim().to_string())
    }

    fn insert(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
        let out = self.run(&["insert", &run_number.to_string(), config_name, dir.as_str()], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("insert failed: {}", out.stderr_string()), Some(run_number)));
        }
        Ok(())
    }

    fn update(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
        let out = self.run(&["update", &run_number.to_string(), config_name, dir.as_str()], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("not-found: run {run_number}: {}", out.stderr_string()), Some(run_number)));
        }
        Ok(())
    }

    fn export(&self, run_number: u32, destination_dir: &Utf8Path) -> Result<(), ArchiverError> {
        let out = self.run(&["export", &run_number.to_string(), destination_dir.as_str()], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("export failed: {}", out.stderr_string()), Some(run_number)));
        }
        Ok(())
    }
}

/// Wraps `CliConfigStore`'s protocol behind `ssh <host> -- <tool> ...`,
/// still argv-only: the remote command is one more argv element, never a
/// shell string built by concatenation.
pub struct RemoteConfigStore {
    host: String,
    tool: Utf8PathBuf,
    timeout: Duration,
}

impl RemoteConfigStore {
    pub fn new(host: impl Into<String>, tool: Utf8PathBuf, timeout: Duration) -> Self {
        Self { host: host.into(), tool, timeout }
    }

    fn run(&self, args: &[&str], run: Option<u32>) -> Result<crate::process::ProcessOutput, ArchiverError> {
        let mut remote_args = vec![self.tool.as_str().to_string()];
        remote_args.extend(args.iter().map(|a| a.to_string()));
        let cmd = CommandSpec::new("ssh").arg(&self.host).arg("--").args(remote_args);
        let out = run_with_timeout(&cmd, self.timeout).map_err(|e| store_error(e.to_string(), run))?;
        if out.timed_out {
            return Err(store_error(format!("ssh {} timed out after {:?}", self.host, self.timeout), run));
        }
        Ok(out)
    }
}

impl ConfigStore for RemoteConfigStore {
    fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError> {
        let out = self.run(&["list-runs"], None)?;
        if !out.success() {
            return Err(store_error(format!("list-runs failed: {}", out.stderr_string()), None));
        }
        Ok(out.stdout_string().lines().filter_map(|l| l.trim().parse::<u32>().ok()).collect())
    }

    fn resolve_config_name(&self, run_number: u32) -> Result<String, ArchiverError> {
        let out = self.run(&["resolve-config-name", &run_number.to_string()], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("not-found: run {run_number}"), Some(run_number)));
        }
        Ok(out.stdout_string().trim().to_string())
    }

    fn insert(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
        // The caller's `dir` is local; streaming it to a remote transient
        // directory via tar-over-ssh is the remote transport's job and is
        // delegated to the `tar`/`ssh` binaries, each invoked argv-only.
        let remote_tmp = format!("/tmp/archiver-{run_number}-insert");
        stream_dir_to_remote(dir, &self.host, &remote_tmp, self.timeout)?;
        let out = self.run(&["insert", &run_number.to_string(), config_name, &remote_tmp], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("insert failed: {}", out.stderr_string()), Some(run_number)));
        }
        Ok(())
    }

    fn update(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
        let remote_tmp = format!("/tmp/archiver-{run_number}-update");
        stream_dir_to_remote(dir, &self.host, &remote_tmp, self.timeout)?;
        let out = self.run(&["update", &run_number.to_string(), config_name, &remote_tmp], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("not-found: run {run_number}: {}", out.stderr_string()), Some(run_number)));
        }
        Ok(())
    }

    fn export(&self, run_number: u32, destination_dir: &Utf8Path) -> Result<(), ArchiverError> {
        let remote_tmp = format!("/tmp/archiver-{run_number}-export");
        let out = self.run(&["export", &run_number.to_string(), &remote_tmp], Some(run_number))?;
        if !out.success() {
            return Err(store_error(format!("export failed: {}", out.stderr_string()), Some(run_number)));
        }
        stream_dir_from_remote(&self.host, &remote_tmp, destination_dir, self.timeout)
    }
}

/// `tar -cf - <dir>` piped, argv-only, into `ssh <host> -- tar -xf - -C
/// <remote_dir>`. Each side is spawned as its own process; the pipe is
/// wired through an OS pipe, never a shell.
fn stream_dir_to_remote(dir: &Utf8Path, host: &str, remote_dir: &str, timeout: Duration) -> Result<(), ArchiverError> {
    let mkdir = CommandSpec::new("ssh").arg(host).arg("--").arg("mkdir").arg("-p").arg(remote_dir);
    let out = run_with_timeout(&mkdir, timeout).map_err(|e| store_error(e.to_string(), None))?;
    if !out.success() {
        return Err(store_error(format!("mkdir -p {remote_dir} on {host} failed: {}", out.stderr_string()), None));
    }
    pipe_two(
        CommandSpec::new("tar").arg("-cf").arg("-").arg("-C").arg(dir.as_str()).arg("."),
        CommandSpec::new("ssh").arg(host).arg("--").arg("tar").arg("-xf").arg("-").arg("-C").arg(remote_dir),
        timeout,
    )
}

fn stream_dir_from_remote(host: &str, remote_dir: &str, dest: &Utf8Path, timeout: Duration) -> Result<(), ArchiverError> {
    std::fs::create_dir_all(dest).map_err(|e| store_error(e.to_string(), None))?;
    pipe_two(
        CommandSpec::new("ssh").arg(host).arg("--").arg("tar").arg("-cf").arg("-").arg("-C").arg(remote_dir).arg("."),
        CommandSpec::new("tar").arg("-xf").arg("-").arg("-C").arg(dest.as_str()),
        timeout,
    )
}

fn pipe_two(producer: CommandSpec, consumer: CommandSpec, timeout: Duration) -> Result<(), ArchiverError> {
    use std::io::Read;
    use std::process::Stdio;

    let mut producer_child = producer
        .to_command()
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| store_error(format!("spawning {:?}: {e}", producer.program), None))?;
    let mut consumer_child = consumer
        .to_command()
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| store_error(format!("spawning {:?}: {e}", consumer.program), None))?;

    let mut producer_stdout = producer_child.stdout.take().expect("producer stdout is piped");
    let mut consumer_stdin = consumer_child.stdin.take().expect("consumer stdin is piped");

    let copier = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = producer_stdout.read_to_end(&mut buf);
        let _ = std::io::Write::write_all(&mut consumer_stdin, &buf);
    });

    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        let status = consumer_child.wait();
        let _ = tx.send(status);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(status)) => {
            let _ = copier.join();
            let _ = handle.join();
            let _ = producer_child.wait();
            if status.success() {
                Ok(())
            } else {
                Err(store_error(format!("remote transfer exited with {status}"), None))
            }
        }
        Ok(Err(e)) => Err(store_error(e.to_string(), None)),
        Err(_) => Err(store_error(format!("remote transfer timed out after {timeout:?}"), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct FakeDriver {
        runs: BTreeSet<u32>,
    }

    impl ConfigStoreDriver for FakeDriver {
        fn list_runs(&mut self) -> Result<BTreeSet<u32>, ArchiverError> {
            Ok(self.runs.clone())
        }
        fn resolve_config_name(&mut self, run_number: u32) -> Result<String, ArchiverError> {
            if self.runs.contains(&run_number) {
                Ok("standard".to_string())
            } else {
                Err(store_error("not-found", Some(run_number)))
            }
        }
        fn insert(&mut self, run_number: u32, _config_name: &str, _dir: &Utf8Path) -> Result<(), ArchiverError> {
            self.runs.insert(run_number);
            Ok(())
        }
        fn update(&mut self, _run_number: u32, _config_name: &str, _dir: &Utf8Path) -> Result<(), ArchiverError> {
            Ok(())
        }
        fn export(&mut self, _run_number: u32, _destination_dir: &Utf8Path) -> Result<(), ArchiverError> {
            Ok(())
        }
    }

    #[test]
    fn driver_store_reports_serialized_concurrency() {
        let store = DriverConfigStore::new(Box::new(FakeDriver { runs: BTreeSet::new() }));
        assert_eq!(store.max_concurrency(), Some(1));
    }

    #[test]
    fn driver_store_insert_then_list() {
        let store = DriverConfigStore::new(Box::new(FakeDriver { runs: BTreeSet::new() }));
        store.insert(10, "standard", Utf8Path::new("/tmp")).unwrap();
        assert!(store.list_runs().unwrap().contains(&10));
    }

    #[test]
    fn driver_store_resolve_config_name_not_found() {
        let store = DriverConfigStore::new(Box::new(FakeDriver { runs: BTreeSet::new() }));
        assert!(store.resolve_config_name(99).is_err());
    }

    #[test]
    fn cli_store_list_runs_parses_stdout_lines() {
        let store = CliConfigStore::new(Utf8PathBuf::from("echo"), Duration::from_secs(5));
        let out = store.run(&["1\n2\n3"], None).unwrap();
        let parsed: BTreeSet<u32> = out.stdout_string().lines().filter_map(|l| l.trim().parse().ok()).collect();
        assert_eq!(parsed, BTreeSet::from([1, 2, 3]));
    }
}
