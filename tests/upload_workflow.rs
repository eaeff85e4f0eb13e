mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use support::{env::SonicVaultEnvGuard, wav::write_silent_wav};

use sonicvault::admin::{AdminEvent, AdminFlow, AdminStep, UploadForm};
use sonicvault::catalog::{AssetId, CatalogStore, Category, DEFAULT_MARKER, parse_catalog};
use sonicvault::remote::memory::{InMemoryRepository, RemoteCall};
use sonicvault::remote::{CredentialProvider, CredentialStore, RepoConfig};
use sonicvault::workflow::{CatalogLayout, CatalogUpdateWorkflow, UploadRequest, WorkflowError};

const CATALOG: &str = "import { Sound, SoundCategory } from './types';

export const SOUND_LIBRARY: Sound[] = [
  {
    id: '1',
    filename: 'click.mp3',
    title: 'Click',
    category: SoundCategory.UI,
    description: 'Short interface click',
    duration: '0:01'
  },
];
";

fn repository() -> InMemoryRepository {
    let repo = InMemoryRepository::new("octo", "vault", "ghp_secret");
    repo.seed_text("constants.ts", CATALOG);
    repo
}

#[test]
fn chime_upload_commits_asset_then_catalog() {
    let repo = repository();
    let config = repo.config();
    let layout = CatalogLayout::default();
    let request = UploadRequest {
        file_name: "chime.mp3".into(),
        bytes: b"ID3 chime bytes".to_vec(),
        title: "Magic Chime".into(),
        category: Category::UiEffects,
        description: "test".into(),
    };
    let outcome = CatalogUpdateWorkflow::new(&repo, &config, &layout)
        .run_with_id(&request, AssetId::new("1700000000000"), |_| {})
        .expect("upload succeeds");

    assert_eq!(
        repo.calls(),
        vec![
            RemoteCall::WriteNew("public/sounds/chime.mp3".into()),
            RemoteCall::Read("constants.ts".into()),
            RemoteCall::Update("constants.ts".into()),
        ]
    );
    assert_eq!(outcome.asset_path, "public/sounds/chime.mp3");

    let text = repo.text("constants.ts").unwrap();
    let expected_fragment = "\n  {\n    id: '1700000000000',\n    filename: 'chime.mp3',\n    title: 'Magic Chime',\n    category: SoundCategory.UI,\n    description: 'test',\n    duration: '0:00'\n  },";
    assert_eq!(
        text,
        CATALOG.replacen(DEFAULT_MARKER, &format!("{DEFAULT_MARKER}{expected_fragment}"), 1)
    );
    let store = CatalogStore::from_catalog_text(&text, DEFAULT_MARKER).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get(&AssetId::new("1700000000000")).unwrap().title,
        "Magic Chime"
    );
}

#[test]
fn wav_upload_records_probed_duration() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("Rain On Roof.wav");
    write_silent_wav(&path, 8_000, 2.4);

    let repo = repository();
    let config = repo.config();
    let layout = CatalogLayout::default();
    let request = UploadRequest::from_path(&path, "Rain", Category::Ambience, "Steady rain").unwrap();
    let outcome = CatalogUpdateWorkflow::new(&repo, &config, &layout)
        .run(&request, |_| {})
        .unwrap();
    assert_eq!(outcome.record.filename, "rain-on-roof.wav");
    assert_eq!(outcome.record.duration.as_deref(), Some("0:02"));
    assert!(repo.file("public/sounds/rain-on-roof.wav").is_some());
}

#[test]
fn catalog_without_marker_fails_before_any_catalog_write() {
    let repo = InMemoryRepository::new("octo", "vault", "ghp_secret");
    repo.seed_text("constants.ts", "export const SOUNDS = [];\n");
    let config = repo.config();
    let layout = CatalogLayout::default();
    let request = UploadRequest {
        file_name: "chime.mp3".into(),
        bytes: vec![1, 2, 3],
        title: "Magic Chime".into(),
        category: Category::UiEffects,
        description: String::new(),
    };
    let failure = CatalogUpdateWorkflow::new(&repo, &config, &layout)
        .run(&request, |_| {})
        .unwrap_err();
    assert!(matches!(failure.error, WorkflowError::MalformedCatalog { .. }));
    assert!(!repo.calls().iter().any(|call| matches!(call, RemoteCall::Update(_))));
    assert_eq!(repo.text("constants.ts").as_deref(), Some("export const SOUNDS = [];\n"));
}

#[test]
fn admin_flow_saves_verified_credentials_and_uploads() {
    let temp = tempfile::tempdir().unwrap();
    let _env = SonicVaultEnvGuard::set_config_home(temp.path().join("config"));
    let repo = Arc::new(repository());
    let store = CredentialStore::new().unwrap();
    let mut flow = AdminFlow::new(store.clone(), repo.clone(), CatalogLayout::default(), "sounds");
    flow.open();

    assert_eq!(flow.submit_password("sounds").unwrap(), AdminStep::Config);
    assert!(flow.submit_config(RepoConfig::new("ghp_wrong", "octo", "vault")).is_err());
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(flow.submit_config(repo.config()).unwrap(), AdminStep::Upload);
    assert_eq!(store.load().unwrap(), Some(repo.config()));

    let audio = temp.path().join("Door Slam.wav");
    write_silent_wav(&audio, 8_000, 1.0);
    flow.submit_upload(UploadForm {
        file: Some(audio),
        title: "Door Slam".into(),
        category: Category::GameFx,
        description: "Heavy wooden door".into(),
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut uploaded = None;
    while uploaded.is_none() {
        assert!(Instant::now() < deadline, "upload did not finish");
        for event in flow.poll() {
            match event {
                AdminEvent::Uploaded(record) => uploaded = Some(record),
                AdminEvent::Failed(message) => panic!("upload failed: {message}"),
                AdminEvent::Progress(_) => {}
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(flow.step(), AdminStep::Success);

    let records = parse_catalog(&repo.text("constants.ts").unwrap(), DEFAULT_MARKER).unwrap();
    assert_eq!(records[0].filename, "door-slam.wav");
    assert_eq!(records[0].category, Category::GameFx);
    assert_eq!(records[1].title, "Click");
}
