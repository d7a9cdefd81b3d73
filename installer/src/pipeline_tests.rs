//! Tests for the end-to-end install pipeline.

use super::*;
use crate::error::InstallerError;
use crate::redirect::ArtifactKind;
use crate::test_utils::{FakePipExecutor, FakeSiteLocator};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    package: Utf8PathBuf,
    site: Utf8PathBuf,
    scratch: Utf8PathBuf,
}

impl Workspace {
    fn request(&self, suffix: &str, editable: bool, forwarded: &[&str]) -> PackageRequest {
        let raw = format!("{}{suffix}", self.package);
        let forwarded = forwarded.iter().map(|s| (*s).to_owned()).collect();
        PackageRequest::parse(&raw, editable, forwarded).expect("parse failed")
    }

    fn staging_entries(&self) -> usize {
        fs::read_dir(&self.scratch).expect("read scratch").count()
    }
}

#[fixture]
fn workspace() -> Workspace {
    let temp = TempDir::new().expect("failed to create temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("temp dir not UTF-8");
    let package = root.join("ro").join("mypkg");
    fs::create_dir_all(&package).expect("create package");
    fs::write(package.join("pyproject.toml"), "[project]\nname = \"mypkg\"\n")
        .expect("write pyproject");
    let site = root.join("site-packages");
    fs::create_dir_all(&site).expect("create site");
    let scratch = root.join("scratch");
    fs::create_dir_all(&scratch).expect("create scratch");

    Workspace {
        _temp: temp,
        package,
        site,
        scratch,
    }
}

fn modern_pip(site: &Utf8Path) -> FakePipExecutor {
    FakePipExecutor::new(site)
        .with_artifact("__editable__.mypkg-0.1.pth", "{staged}\n")
        .with_artifact(
            "mypkg-0.1.dist-info/direct_url.json",
            r#"{"dir_info": {"editable": true}, "url": "file://{staged}"}"#,
        )
        .with_artifact(
            "__editable___mypkg_0_1_finder.py",
            "MAPPING = {'mypkg': '{staged}/mypkg'}\n",
        )
        .with_artifact(
            "__pycache__/__editable___mypkg_0_1_finder.cpython-312.pyc",
            "{staged}",
        )
}

fn run(
    workspace: &Workspace,
    executor: &FakePipExecutor,
    locator: &FakeSiteLocator,
    request: &PackageRequest,
) -> (Result<InstallOutcome>, String) {
    let stager = Stager::with_base_dir(&workspace.scratch);
    let context = InstallContext {
        executor,
        site_locator: locator,
        stager: &stager,
        python: "python3",
    };
    let mut stderr = Vec::new();
    let result = run_install(&context, request, &mut stderr);
    (result, String::from_utf8(stderr).expect("stderr was not UTF-8"))
}

#[rstest]
fn editable_install_redirects_artifacts_to_original(workspace: Workspace) {
    let executor = modern_pip(&workspace.site);
    let locator = FakeSiteLocator::system(&workspace.site);
    let request = workspace.request("", true, &[]);

    let (result, stderr) = run(&workspace, &executor, &locator, &request);

    let InstallOutcome::Redirected(report) = result.expect("install failed") else {
        panic!("expected a redirected install");
    };
    assert_eq!(report.len(), 3);

    let args = executor.last_args().expect("pip was not invoked");
    let staged = args.last().expect("missing install target").clone();
    assert_eq!(
        args,
        vec![
            "-m".to_owned(),
            "pip".to_owned(),
            "install".to_owned(),
            "--editable".to_owned(),
            staged.clone(),
        ]
    );
    assert!(staged.ends_with("/mypkg"));

    let pth = fs::read_to_string(workspace.site.join("__editable__.mypkg-0.1.pth"))
        .expect("read pth");
    assert_eq!(pth, format!("{}\n", workspace.package));
    let finder = fs::read_to_string(workspace.site.join("__editable___mypkg_0_1_finder.py"))
        .expect("read finder");
    assert!(!finder.contains(&staged));
    assert!(finder.contains(&format!("'{}/mypkg'", workspace.package)));
    assert!(
        !workspace
            .site
            .join("__pycache__/__editable___mypkg_0_1_finder.cpython-312.pyc")
            .exists()
    );

    assert!(stderr.contains(&format!("SITE: {}", workspace.site)));
    assert!(stderr.contains(&format!("replacing {staged} with {}", workspace.package)));
    assert!(stderr.contains("Redirected 3 artifacts"));
    assert_eq!(workspace.staging_entries(), 0);
}

#[rstest]
fn extras_are_passed_to_pip_but_not_staged(workspace: Workspace) {
    let executor = modern_pip(&workspace.site);
    let locator = FakeSiteLocator::system(&workspace.site);
    let request = workspace.request("[dev]", true, &[]);

    let (result, _) = run(&workspace, &executor, &locator, &request);

    result.expect("install failed");
    let args = executor.last_args().expect("pip was not invoked");
    let target = args.last().expect("missing install target");
    assert!(target.ends_with("/mypkg[dev]"), "unexpected target {target}");
}

#[rstest]
fn non_editable_install_skips_redirection(workspace: Workspace) {
    let executor = FakePipExecutor::new(&workspace.site);
    let locator = FakeSiteLocator::system(&workspace.site);
    let request = workspace.request("", false, &[]);

    let (result, stderr) = run(&workspace, &executor, &locator, &request);

    assert_eq!(result.expect("install failed"), InstallOutcome::Installed);
    let args = executor.last_args().expect("pip was not invoked");
    assert!(!args.contains(&"--editable".to_owned()));
    assert!(locator.probes().is_empty());
    assert!(stderr.is_empty());
    assert_eq!(workspace.staging_entries(), 0);
}

#[rstest]
fn unexpected_layout_fails_with_nothing_patched(workspace: Workspace) {
    let executor = FakePipExecutor::new(&workspace.site)
        .with_artifact("mypkg-0.1.dist-info/direct_url.json", r#"{"url": "file:///elsewhere"}"#);
    let locator = FakeSiteLocator::system(&workspace.site);
    let request = workspace.request("", true, &[]);

    let (result, _) = run(&workspace, &executor, &locator, &request);

    assert!(matches!(result, Err(InstallerError::NothingPatched { .. })));
    assert_eq!(workspace.staging_entries(), 0);
}

#[rstest]
fn ambiguous_system_site_fails_before_patching(workspace: Workspace) {
    let executor = modern_pip(&workspace.site);
    let locator = FakeSiteLocator::ambiguous(vec![
        workspace.site.clone(),
        workspace.site.join("other"),
    ]);
    let request = workspace.request("", true, &[]);

    let (result, stderr) = run(&workspace, &executor, &locator, &request);

    assert!(matches!(
        result,
        Err(InstallerError::AmbiguousSiteDirectory { .. })
    ));
    let pth = fs::read_to_string(workspace.site.join("__editable__.mypkg-0.1.pth"))
        .expect("read pth");
    assert!(!pth.contains(workspace.package.as_str()));
    assert!(!stderr.contains("replacing"));
    assert_eq!(workspace.staging_entries(), 0);
}

#[rstest]
fn pip_failure_is_fatal_and_cleans_up(workspace: Workspace) {
    let executor = modern_pip(&workspace.site).with_exit_code(1);
    let locator = FakeSiteLocator::system(&workspace.site);
    let request = workspace.request("", true, &[]);

    let (result, _) = run(&workspace, &executor, &locator, &request);

    assert!(matches!(result, Err(InstallerError::InstallFailed { .. })));
    assert_eq!(executor.invocations().len(), 1);
    assert!(locator.probes().is_empty());
    assert_eq!(workspace.staging_entries(), 0);
}

#[rstest]
fn missing_source_fails_before_pip_runs(workspace: Workspace) {
    let executor = modern_pip(&workspace.site);
    let locator = FakeSiteLocator::system(&workspace.site);
    let request = workspace.request("-missing", true, &[]);

    let (result, _) = run(&workspace, &executor, &locator, &request);

    assert!(matches!(result, Err(InstallerError::SourceNotFound { .. })));
    assert!(executor.invocations().is_empty());
}

#[rstest]
fn user_flag_is_forwarded_to_site_probe(workspace: Workspace) {
    let executor = FakePipExecutor::new(&workspace.site)
        .with_artifact("mypkg.egg-link", "{staged}\n.\n");
    let locator = FakeSiteLocator::user(&workspace.site);
    let request = workspace.request("", true, &["--user"]);

    let (result, stderr) = run(&workspace, &executor, &locator, &request);

    let InstallOutcome::Redirected(report) = result.expect("install failed") else {
        panic!("expected a redirected install");
    };
    assert_eq!(locator.probes(), vec![true]);
    assert_eq!(
        report.patched.first().map(|artifact| artifact.kind),
        Some(ArtifactKind::EggLink)
    );
    assert!(stderr.contains("patched egg-link"));
}
