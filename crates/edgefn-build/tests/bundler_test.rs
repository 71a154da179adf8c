use std::path::{Path, PathBuf};
use std::time::Duration;

use edgefn_build::{
    BundleError, BundleRequest, Bundler, CommandExecutor, CommandOutput, DockerBundler,
    EdgeBundler, ExecError, NativeBundler, RealExecutor,
};
use edgefn_core::{BundlerKind, EdgeRuntimeConfig, FunctionSlug};
use mockall::mock;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mock! {
    Executor {}

    impl CommandExecutor for Executor {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            cancel: &CancellationToken,
        ) -> Result<CommandOutput, ExecError>;
    }
}

fn request(source_dir: &Path, import_map: Option<PathBuf>) -> BundleRequest {
    BundleRequest {
        slug: FunctionSlug::parse("hello").unwrap(),
        entrypoint: source_dir.join("functions/hello/index.ts"),
        import_map,
    }
}

/// Host side of the `-v <host>:/root/eszips:rw` bind.
fn host_output_dir(args: &[String]) -> PathBuf {
    let bind = args
        .iter()
        .find(|a| a.ends_with(":/root/eszips:rw"))
        .expect("output bind");
    PathBuf::from(bind.trim_end_matches(":/root/eszips:rw"))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> &'a str {
    let idx = args.iter().position(|a| a == flag).expect("flag present");
    &args[idx + 1]
}

// ── Docker Bundler Tests ──

#[tokio::test]
async fn docker_bundle_reads_artifact_and_removes_output_dir() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();

    mock.expect_run()
        .withf(|program, args, _| program == "docker" && args.first().map(String::as_str) == Some("run"))
        .times(1)
        .returning(|_, args, _| {
            let dir = host_output_dir(args);
            std::fs::write(dir.join("output.eszip"), b"ESZIP2").unwrap();
            Ok(CommandOutput::default())
        });

    let bundler = DockerBundler::with_executor(mock, "edge-runtime:test", "cache_vol", source.path())
        .scratch_root(scratch.path());
    let bytes = bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(bytes, b"ESZIP2");
    assert!(!scratch.path().join(".output_hello").exists());
}

#[tokio::test]
async fn docker_bundle_mounts_cache_source_and_output() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let source_dir = source.path().to_string_lossy().into_owned();
    let mut mock = MockExecutor::new();

    mock.expect_run().times(1).returning(move |_, args, _| {
        assert!(args.contains(&"--rm".to_owned()));
        assert!(args.contains(&"cache_vol:/root/.cache/deno:rw".to_owned()));
        assert!(args.contains(&format!("{source_dir}:{source_dir}:ro")));
        assert_eq!(
            flag_value(args, "--entrypoint"),
            format!("{source_dir}/functions/hello/index.ts")
        );
        assert_eq!(flag_value(args, "--output"), "/root/eszips/output.eszip");
        assert!(args.contains(&"edge-runtime:test".to_owned()));
        assert!(args.contains(&"--verbose".to_owned()));
        assert!(!args.contains(&"--import-map".to_owned()));

        let dir = host_output_dir(args);
        std::fs::write(dir.join("output.eszip"), b"x").unwrap();
        Ok(CommandOutput::default())
    });

    let bundler = DockerBundler::with_executor(mock, "edge-runtime:test", "cache_vol", source.path())
        .scratch_root(scratch.path())
        .verbose(true);
    bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn docker_bundle_binds_external_import_map() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let import_map = elsewhere.path().join("import_map.json");
    let expected_bind = format!("{p}:{p}:ro", p = import_map.to_string_lossy());
    let expected_flag = import_map.to_string_lossy().into_owned();
    let mut mock = MockExecutor::new();

    mock.expect_run().times(1).returning(move |_, args, _| {
        assert!(args.contains(&expected_bind));
        assert_eq!(flag_value(args, "--import-map"), expected_flag);
        std::fs::write(host_output_dir(args).join("output.eszip"), b"x").unwrap();
        Ok(CommandOutput::default())
    });

    let bundler = DockerBundler::with_executor(mock, "img", "vol", source.path())
        .scratch_root(scratch.path());
    bundler
        .bundle(&request(source.path(), Some(import_map)), &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn docker_bundle_does_not_rebind_import_map_inside_source() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let import_map = source.path().join("functions/import_map.json");
    let mut mock = MockExecutor::new();

    mock.expect_run().times(1).returning(|_, args, _| {
        let ro_binds = args.iter().filter(|a| a.ends_with(":ro")).count();
        assert_eq!(ro_binds, 1);
        std::fs::write(host_output_dir(args).join("output.eszip"), b"x").unwrap();
        Ok(CommandOutput::default())
    });

    let bundler = DockerBundler::with_executor(mock, "img", "vol", source.path())
        .scratch_root(scratch.path());
    bundler
        .bundle(&request(source.path(), Some(import_map)), &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn docker_bundle_nonzero_exit_carries_diagnostics() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();

    mock.expect_run().times(1).returning(|program, args, _| {
        Err(ExecError::Failed {
            program: program.to_owned(),
            status: "exit status: 1".to_owned(),
            stdout: String::new(),
            stderr: format!("error: Module not found {}", args.len()),
        })
    });

    let bundler = DockerBundler::with_executor(mock, "img", "vol", source.path())
        .scratch_root(scratch.path());
    let result = bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(BundleError::Failed { ref diagnostics, .. }) if diagnostics.contains("Module not found")
    ));
    assert!(!scratch.path().join(".output_hello").exists());
}

#[tokio::test]
async fn docker_bundle_missing_artifact_is_an_error() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();

    mock.expect_run()
        .times(1)
        .returning(|_, _, _| Ok(CommandOutput::default()));

    let bundler = DockerBundler::with_executor(mock, "img", "vol", source.path())
        .scratch_root(scratch.path());
    let result = bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(BundleError::MissingOutput { .. })));
    assert!(!scratch.path().join(".output_hello").exists());
}

#[tokio::test]
async fn docker_bundle_cancellation_removes_container() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();

    mock.expect_run()
        .withf(|_, args, _| args.first().map(String::as_str) == Some("run"))
        .times(1)
        .returning(|program, _, _| {
            Err(ExecError::Cancelled {
                program: program.to_owned(),
            })
        });
    mock.expect_run()
        .withf(|program, args, _| {
            program == "docker"
                && args.len() == 3
                && args[0] == "rm"
                && args[1] == "-f"
                && args[2].starts_with("edgefn_bundle_hello_")
        })
        .times(1)
        .returning(|_, _, _| Ok(CommandOutput::default()));

    let bundler = DockerBundler::with_executor(mock, "img", "vol", source.path())
        .scratch_root(scratch.path());
    let result = bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(BundleError::Cancelled)));
    assert!(!scratch.path().join(".output_hello").exists());
}

// ── Native Bundler Tests ──

#[tokio::test]
async fn native_bundle_runs_binary_and_deletes_temp_file() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let import_map = source.path().join("functions/import_map.json");
    let expected_map = import_map.to_string_lossy().into_owned();
    let mut mock = MockExecutor::new();

    mock.expect_run()
        .withf(|program, _, _| program == "/usr/local/bin/edge-runtime")
        .times(1)
        .returning(move |_, args, _| {
            assert_eq!(args[0], "bundle");
            assert_eq!(flag_value(args, "--import-map"), expected_map);
            assert!(!args.contains(&"--verbose".to_owned()));
            std::fs::write(flag_value(args, "--output"), b"RAW").unwrap();
            Ok(CommandOutput::default())
        });

    let bundler = NativeBundler::with_executor(mock, "/usr/local/bin/edge-runtime")
        .scratch_root(scratch.path());
    let bytes = bundler
        .bundle(&request(source.path(), Some(import_map)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(bytes, b"RAW");
    assert!(!scratch.path().join("hello.eszip").exists());
}

#[tokio::test]
async fn native_bundle_failure_is_bundle_error() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();

    mock.expect_run().times(1).returning(|program, _, _| {
        Err(ExecError::Failed {
            program: program.to_owned(),
            status: "exit status: 2".to_owned(),
            stdout: "type error in index.ts".to_owned(),
            stderr: String::new(),
        })
    });

    let bundler = NativeBundler::with_executor(mock, "edge-runtime").scratch_root(scratch.path());
    let result = bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(BundleError::Failed { ref diagnostics, .. }) if diagnostics == "type error in index.ts"
    ));
}

#[tokio::test]
async fn native_bundle_missing_artifact_is_an_error() {
    let source = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();

    mock.expect_run()
        .times(1)
        .returning(|_, _, _| Ok(CommandOutput::default()));

    let bundler = NativeBundler::with_executor(mock, "edge-runtime").scratch_root(scratch.path());
    let result = bundler
        .bundle(&request(source.path(), None), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(BundleError::MissingOutput { .. })));
}

// ── Selection ──

#[test]
fn edge_bundler_follows_config() {
    let source = TempDir::new().unwrap();
    let mut config = EdgeRuntimeConfig::default();
    assert_eq!(
        EdgeBundler::from_config(&config, source.path(), false).kind(),
        BundlerKind::Docker
    );

    config.bundler = BundlerKind::Native;
    assert_eq!(
        EdgeBundler::from_config(&config, source.path(), false).kind(),
        BundlerKind::Native
    );
}

// ── Real Executor ──

#[cfg(unix)]
#[tokio::test]
async fn real_executor_captures_failure_output() {
    let args = vec!["-c".to_owned(), "echo oops >&2; exit 3".to_owned()];
    let result = RealExecutor.run("sh", &args, &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ExecError::Failed { ref stderr, .. }) if stderr.trim() == "oops"
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn real_executor_stops_on_cancel() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = RealExecutor.run("sleep", &["30".to_owned()], &cancel).await;

    assert!(matches!(result, Err(ExecError::Cancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn real_executor_reports_missing_program() {
    let result = RealExecutor
        .run("edgefn-definitely-not-installed", &[], &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ExecError::NotFound { .. })));
}
