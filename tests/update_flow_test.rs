//! End-to-end update flow through the public API, with canned HTTP.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use tempfile::TempDir;
use updraft::config::UpdaterConfig;
use updraft::ui::MockUI;
use updraft::updates::mock::MockTransport;
use updraft::updates::{
    run_update, CancelToken, DownloadOutcome, HelperLauncher, InstallMethod, NoProgress,
    ScriptFlavor, UpdateFlow, UpdateOptions, UpdateSession, Version,
};

const LATEST: &str = "https://api.example.com/repos/acme/player/releases/latest";
const ASSET: &str = "https://downloads.example.com/v1.4.0/player-linux-x86_64";

#[derive(Clone, Default)]
struct ScriptCapture(Rc<RefCell<Vec<String>>>);

impl HelperLauncher for ScriptCapture {
    fn launch(&self, script: &Path, _: ScriptFlavor, _: &Path) -> updraft::Result<()> {
        self.0.borrow_mut().push(fs::read_to_string(script)?);
        Ok(())
    }
}

fn feed() -> String {
    format!(
        r#"{{
            "tag_name": "v1.4.0",
            "body": "Smoother playback",
            "assets": [
                {{"name": "player-windows-x86_64.exe", "browser_download_url": "https://downloads.example.com/v1.4.0/player.exe"}},
                {{"name": "player-linux-x86_64", "browser_download_url": "{}"}}
            ]
        }}"#,
        ASSET
    )
}

fn session(temp: &TempDir, transport: MockTransport) -> (UpdateSession, ScriptCapture) {
    let config = UpdaterConfig {
        repository: Some("acme/player".to_string()),
        api_base: "https://api.example.com".to_string(),
        staging_dir: Some(temp.path().join("updraft-update")),
        executable_name: Some("player".to_string()),
        asset_suffix: Some("-linux-x86_64".to_string()),
        relaunch_args: vec!["--updated".to_string()],
        ..Default::default()
    };
    let capture = ScriptCapture::default();
    let session =
        UpdateSession::with_transport(&config, Version::parse("1.3.9"), Arc::new(transport))
            .unwrap()
            .with_launcher(Box::new(capture.clone()))
            .with_target_executable(temp.path().join("bin").join("player"));
    (session, capture)
}

#[test]
fn check_download_and_hand_off() {
    let temp = TempDir::new().unwrap();
    let build = vec![0x7fu8; 10_000];
    let (mut session, capture) = session(
        &temp,
        MockTransport::new()
            .with_text(LATEST, 200, feed())
            .with_head(ASSET, 200, Some(build.len() as u64))
            .with_download(ASSET, build.clone(), 1024),
    );

    let check = session.check_configured();
    assert!(check.update_available());
    assert_eq!(check.download_url().unwrap().as_str(), ASSET);

    let url = check.download_url().unwrap().to_string();
    let outcome = session
        .download(&url, &mut NoProgress, &CancelToken::new())
        .unwrap();
    let DownloadOutcome::Completed { path, bytes, .. } = outcome else {
        panic!("download did not complete");
    };
    assert_eq!(bytes, 10_000);
    assert_eq!(fs::read(&path).unwrap(), build);

    let handoff = session.launch_replacement().unwrap();
    assert_eq!(handoff.target, temp.path().join("bin").join("player"));

    let scripts = capture.0.borrow();
    assert_eq!(scripts.len(), 1);
    if cfg!(unix) {
        assert!(scripts[0].contains("--updated"));
        assert!(scripts[0].contains(&path.display().to_string()));
    }
}

#[test]
fn failed_download_leaves_nothing_to_install() {
    let temp = TempDir::new().unwrap();
    let (mut session, capture) = session(
        &temp,
        MockTransport::new().with_broken_download(ASSET, 4096, 1000),
    );

    let outcome = session
        .download(ASSET, &mut NoProgress, &CancelToken::new())
        .unwrap();

    assert!(!outcome.is_success());
    assert!(session.staged_artifact_path().is_none());
    assert!(session.launch_replacement().is_err());
    assert!(capture.0.borrow().is_empty());
}

#[test]
fn interactive_flow_hands_off_after_confirmation() {
    let temp = TempDir::new().unwrap();
    let (mut session, capture) = session(
        &temp,
        MockTransport::new()
            .with_text(LATEST, 200, feed())
            .with_download(ASSET, b"new build".to_vec(), 3),
    );
    let mut ui = MockUI::new();
    ui.set_interactive(true);
    ui.set_prompt_response("apply_update", "yes");
    let method = InstallMethod::Manual {
        path: temp.path().join("bin").join("player"),
    };

    let flow = run_update(
        &mut session,
        &method,
        &mut ui,
        &UpdateOptions::default(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(matches!(flow, UpdateFlow::HandedOff(_)));
    assert_eq!(capture.0.borrow().len(), 1);
    assert!(ui.has_message("will restart"));
}

#[test]
fn cleanup_after_staging_removes_folder() {
    let temp = TempDir::new().unwrap();
    let (mut session, _) = session(
        &temp,
        MockTransport::new().with_download(ASSET, b"build".to_vec(), 2),
    );

    session
        .download(ASSET, &mut NoProgress, &CancelToken::new())
        .unwrap();
    assert!(session.staging().root().exists());

    session.cleanup();
    session.cleanup();
    assert!(!session.staging().root().exists());
}
