use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::admin::{AdminEvent, AdminFlow, AdminStep, UploadForm};
use crate::catalog::{AssetId, AssetRecord, CatalogStore, encode_record};
use crate::config::{self, AppSettings};
use crate::filter::{CatalogView, FilterQuery};
use crate::notify::{NotificationCenter, NotificationKind};
use crate::playback::{AudioOutput, CardState, PlaybackCoordinator};
use crate::remote::github::GitHubClient;
use crate::remote::memory::InMemoryRepository;
use crate::remote::{
    CredentialProvider, CredentialStore, MemoryCredentials, RepoConfig, RepositoryApi,
};
use crate::share::{self, AssetLinks, SystemClipboard};

use super::{CatalogSource, Command, SettingsUpdate, UploadOptions};

const ADMIN_PASSWORD_ENV: &str = "SONICVAULT_ADMIN_PASSWORD";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute one parsed command. Errors are user-facing messages.
pub fn run(command: Command) -> Result<(), String> {
    let settings = config::load_or_default().map_err(|err| err.to_string())?;
    match command {
        Command::List {
            query,
            category,
            source,
        } => list(&settings, &FilterQuery::new(query, category), &source),
        Command::Play { ids, source } => play(&settings, &ids, &source),
        Command::Link {
            id,
            copy,
            open,
            source,
        } => link(&settings, &id, copy, open, &source),
        Command::Download {
            id,
            out_dir,
            source,
        } => download(&settings, &id, &out_dir, &source),
        Command::Configure {
            owner,
            repo,
            token,
            password,
        } => configure(&settings, RepoConfig::new(token, owner, repo), password),
        Command::Check => check(&settings),
        Command::Upload(options) => upload(&settings, &options),
        Command::Settings(update) => update_settings(settings, update),
    }
}

fn list(settings: &AppSettings, query: &FilterQuery, source: &CatalogSource) -> Result<(), String> {
    let store = load_catalog(settings, source)?;
    let view = CatalogView::compute(Some(store.records()), query);
    let CatalogView::Ready(records) = view else {
        return Ok(());
    };
    if records.is_empty() {
        println!("No sounds found matching your criteria.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{:<15} {:<28} {:<14} {:>6}  {}",
            record.id,
            record.title,
            record.category.label(),
            record.duration.as_deref().unwrap_or("-"),
            record.filename
        );
    }
    println!("{} of {} sounds", records.len(), store.len());
    Ok(())
}

fn play(settings: &AppSettings, ids: &[AssetId], source: &CatalogSource) -> Result<(), String> {
    let store = load_catalog(settings, source)?;
    let links = AssetLinks::from_settings(&settings.site).map_err(|err| err.to_string())?;
    let output = AudioOutput::open_default().map_err(|err| err.to_string())?;
    let coordinator = PlaybackCoordinator::new().into_shared();
    for id in ids {
        let record = find(&store, id)?;
        let bytes = asset_bytes(settings, &links, record)?;
        let hint = Path::new(&record.filename)
            .extension()
            .and_then(|ext| ext.to_str());
        coordinator
            .borrow_mut()
            .register(id.clone(), Box::new(output.backend(Arc::from(bytes), hint)));
    }
    for id in ids {
        let record = find(&store, id)?;
        println!(
            "Playing {} ({})",
            record.title,
            record.duration.as_deref().unwrap_or("0:00")
        );
        if let Err(err) = coordinator.borrow_mut().play(id) {
            eprintln!("{err}");
            continue;
        }
        while coordinator.borrow().state(id) == Some(CardState::Playing) {
            thread::sleep(POLL_INTERVAL);
            coordinator.borrow_mut().poll_finished();
        }
        coordinator.borrow_mut().unregister(id);
    }
    Ok(())
}

fn link(
    settings: &AppSettings,
    id: &AssetId,
    copy: bool,
    open: bool,
    source: &CatalogSource,
) -> Result<(), String> {
    let store = load_catalog(settings, source)?;
    let record = find(&store, id)?;
    let links = AssetLinks::from_settings(&settings.site).map_err(|err| err.to_string())?;
    let url = links.asset_url(&record.filename).map_err(|err| err.to_string())?;
    println!("{url}");
    if copy {
        let mut notifications = NotificationCenter::new(settings.notifications.ttl());
        let copied = share::copy_link(&links, record, &mut SystemClipboard, &mut notifications);
        for notification in notifications.active(Instant::now()) {
            match notification.kind {
                NotificationKind::Error => eprintln!("{}", notification.text),
                _ => println!("{}", notification.text),
            }
        }
        copied.map_err(|err| err.to_string())?;
    }
    if open {
        share::open_in_browser(&url).map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn download(
    settings: &AppSettings,
    id: &AssetId,
    out_dir: &Path,
    source: &CatalogSource,
) -> Result<(), String> {
    let store = load_catalog(settings, source)?;
    let record = find(&store, id)?;
    let links = AssetLinks::from_settings(&settings.site).map_err(|err| err.to_string())?;
    let url = links.asset_url(&record.filename).map_err(|err| err.to_string())?;
    let path = share::download_asset(&url, out_dir, &record.filename).map_err(|err| err.to_string())?;
    println!("Saved {}", path.display());
    Ok(())
}

fn configure(
    settings: &AppSettings,
    config: RepoConfig,
    password: Option<String>,
) -> Result<(), String> {
    let credentials = CredentialStore::new().map_err(|err| err.to_string())?;
    let mut flow = AdminFlow::new(
        credentials,
        Arc::new(github_client(settings)?),
        settings.repository.layout(),
        &settings.admin.password,
    );
    flow.open();
    let step = flow
        .submit_password(&resolve_password(password)?)
        .map_err(|err| err.to_string())?;
    if step == AdminStep::Upload {
        flow.edit_config().map_err(|err| err.to_string())?;
    }
    let slug = config.slug();
    flow.submit_config(config).map_err(|err| err.to_string())?;
    println!("Saved credentials for {slug}.");
    Ok(())
}

fn check(settings: &AppSettings) -> Result<(), String> {
    let config = saved_credentials()?;
    if github_client(settings)?.check_access(&config) {
        println!("Repository {} is reachable.", config.slug());
        Ok(())
    } else {
        Err("Could not access repository. Check credentials.".to_string())
    }
}

fn upload(settings: &AppSettings, options: &UploadOptions) -> Result<(), String> {
    let password = resolve_password(options.password.clone())?;
    if !options.dry_run {
        let credentials = CredentialStore::new().map_err(|err| err.to_string())?;
        let mut flow = AdminFlow::new(
            credentials,
            Arc::new(github_client(settings)?),
            settings.repository.layout(),
            &settings.admin.password,
        );
        let record = drive_upload(&mut flow, options, &password)?;
        println!("Sound uploaded successfully! Site will update soon. (id {})", record.id);
        return Ok(());
    }

    let catalog_path = options
        .catalog
        .clone()
        .or_else(|| settings.library.catalog_path.clone())
        .ok_or_else(|| "--dry-run needs --catalog PATH or library.catalog_path".to_string())?;
    let text = std::fs::read_to_string(&catalog_path)
        .map_err(|err| format!("Failed to read {}: {err}", catalog_path.display()))?;
    let layout = settings.repository.layout();
    let repo = Arc::new(InMemoryRepository::new("dry-run", "catalog", "dry-run"));
    repo.seed_text(&layout.catalog_path, &text);
    let credentials = MemoryCredentials::with_config(repo.config());
    let mut flow = AdminFlow::new(credentials, repo.clone(), layout, &settings.admin.password);
    let record = drive_upload(&mut flow, options, &password)?;
    println!("Dry run: catalog entry that would be committed:{}", encode_record(&record));
    Ok(())
}

fn update_settings(mut settings: AppSettings, update: SettingsUpdate) -> Result<(), String> {
    if let Some(url) = update.site_url {
        settings.site.base_url = url;
    }
    if let Some(path) = update.sound_base_path {
        settings.site.sound_base_path = path;
    }
    if let Some(path) = update.catalog {
        settings.library.catalog_path = Some(path);
    }
    if let Some(dir) = update.sounds_dir {
        settings.library.sounds_dir = Some(dir);
    }
    if let Some(url) = update.api_base_url {
        settings.repository.api_base_url = url;
    }
    let settings = settings.normalized();
    AssetLinks::from_settings(&settings.site).map_err(|err| err.to_string())?;
    github_client(&settings)?;

    config::save(&settings).map_err(|err| err.to_string())?;
    let path = config::settings_path().map_err(|err| err.to_string())?;
    let text = toml::to_string_pretty(&settings).map_err(|err| err.to_string())?;
    println!("# {}\n{text}", path.display());
    Ok(())
}

fn drive_upload<C: CredentialProvider>(
    flow: &mut AdminFlow<C>,
    options: &UploadOptions,
    password: &str,
) -> Result<AssetRecord, String> {
    flow.open();
    let step = flow.submit_password(password).map_err(|err| err.to_string())?;
    if step == AdminStep::Config {
        return Err("No repository credentials saved; run `sonicvault configure` first.".into());
    }
    flow.submit_upload(UploadForm {
        file: Some(options.file.clone()),
        title: options.title.clone(),
        category: options.category,
        description: options.description.clone(),
    })
    .map_err(|err| err.to_string())?;

    let mut retried = false;
    loop {
        for event in flow.wait(POLL_INTERVAL) {
            match event {
                AdminEvent::Progress(stage) => eprintln!("[{}/5] {stage}", stage.number()),
                AdminEvent::Uploaded(record) => return Ok(record),
                AdminEvent::Failed(message) => {
                    if flow.pending().is_none() {
                        return Err(message);
                    }
                    if options.retry_register && !retried {
                        eprintln!("{message}\nRetrying catalog registration...");
                        retried = true;
                        flow.retry_registration().map_err(|err| err.to_string())?;
                    } else {
                        return Err(format!(
                            "{message}\nThe audio file is already in the repository; only its catalog entry is missing."
                        ));
                    }
                }
            }
        }
    }
}

fn load_catalog(settings: &AppSettings, source: &CatalogSource) -> Result<CatalogStore, String> {
    let marker = &settings.repository.marker;
    match source {
        CatalogSource::File(path) => {
            CatalogStore::load_file(path, marker).map_err(|err| err.to_string())
        }
        CatalogSource::Configured => {
            let path = configured_catalog(settings)?;
            CatalogStore::load_file(&path, marker).map_err(|err| err.to_string())
        }
        CatalogSource::Remote => {
            let config = saved_credentials()?;
            CatalogStore::fetch_remote(
                &github_client(settings)?,
                &config,
                &settings.repository.catalog_path,
                marker,
            )
            .map_err(|err| err.to_string())
        }
    }
}

fn configured_catalog(settings: &AppSettings) -> Result<PathBuf, String> {
    settings.library.catalog_path.clone().ok_or_else(|| {
        let location = config::settings_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| config::SETTINGS_FILE_NAME.to_string());
        format!("No local catalog configured. Run `sonicvault settings --catalog PATH` (settings live in {location}), or pass --catalog PATH or --remote.")
    })
}

fn find<'a>(store: &'a CatalogStore, id: &AssetId) -> Result<&'a AssetRecord, String> {
    store.get(id).ok_or_else(|| format!("No sound with id {id}"))
}

fn asset_bytes(settings: &AppSettings, links: &AssetLinks, record: &AssetRecord) -> Result<Vec<u8>, String> {
    if let Some(dir) = &settings.library.sounds_dir {
        let path = share::local_asset_path(dir, &record.filename).map_err(|err| err.to_string())?;
        return std::fs::read(&path).map_err(|err| format!("Failed to read {}: {err}", path.display()));
    }
    let url = links.asset_url(&record.filename).map_err(|err| err.to_string())?;
    share::fetch_asset(&url).map_err(|err| err.to_string())
}

fn github_client(settings: &AppSettings) -> Result<GitHubClient, String> {
    GitHubClient::with_base_url(&settings.repository.api_base_url)
        .map_err(|err| format!("Invalid api_base_url {}: {err}", settings.repository.api_base_url))
}

fn saved_credentials() -> Result<RepoConfig, String> {
    CredentialStore::new()
        .and_then(|store| store.load())
        .map_err(|err| err.to_string())?
        .filter(RepoConfig::is_complete)
        .ok_or_else(|| "No repository credentials saved; run `sonicvault configure` first.".to_string())
}

fn resolve_password(flag: Option<String>) -> Result<String, String> {
    flag.or_else(|| std::env::var(ADMIN_PASSWORD_ENV).ok())
        .ok_or_else(|| format!("--password is required (or set {ADMIN_PASSWORD_ENV})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_dirs::ConfigBaseGuard;
    use tempfile::tempdir;

    #[test]
    fn settings_command_persists_updates() {
        let dir = tempdir().unwrap();
        let _guard = ConfigBaseGuard::set(dir.path().to_path_buf());
        run(Command::Settings(SettingsUpdate {
            catalog: Some(PathBuf::from("site/constants.ts")),
            sound_base_path: Some("audio".into()),
            ..SettingsUpdate::default()
        }))
        .unwrap();
        run(Command::Settings(SettingsUpdate {
            site_url: Some("https://vault.example.com".into()),
            ..SettingsUpdate::default()
        }))
        .unwrap();

        let settings = config::load_or_default().unwrap();
        assert_eq!(settings.library.catalog_path, Some(PathBuf::from("site/constants.ts")));
        assert_eq!(settings.site.sound_base_path, "/audio/");
        assert_eq!(settings.site.base_url, "https://vault.example.com");
        assert!(config::settings_path().unwrap().is_file());
    }

    #[test]
    fn settings_command_rejects_bad_urls_without_writing() {
        let dir = tempdir().unwrap();
        let _guard = ConfigBaseGuard::set(dir.path().to_path_buf());
        let err = run(Command::Settings(SettingsUpdate {
            site_url: Some("not a url".into()),
            ..SettingsUpdate::default()
        }))
        .unwrap_err();
        assert!(err.contains("not a url"), "{err}");
        assert!(!config::settings_path().unwrap().exists());
    }
}
