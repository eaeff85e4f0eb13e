//! Command-line surface of the `sonicvault` binary.

mod commands;

use std::path::PathBuf;

pub use commands::run;

use crate::catalog::{AssetId, Category};
use crate::filter::CategoryFilter;
use crate::logging::ConsoleLevel;

/// Where `list`/`play`/`link`/`download` read the catalog from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CatalogSource {
    /// `library.catalog_path` from the settings.
    #[default]
    Configured,
    File(PathBuf),
    Remote,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    List {
        query: String,
        category: CategoryFilter,
        source: CatalogSource,
    },
    Play {
        ids: Vec<AssetId>,
        source: CatalogSource,
    },
    Link {
        id: AssetId,
        copy: bool,
        open: bool,
        source: CatalogSource,
    },
    Download {
        id: AssetId,
        out_dir: PathBuf,
        source: CatalogSource,
    },
    Configure {
        owner: String,
        repo: String,
        token: String,
        password: Option<String>,
    },
    Check,
    Upload(UploadOptions),
    Settings(SettingsUpdate),
}

impl Command {
    /// Subcommand name, used to label the run log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Play { .. } => "play",
            Self::Link { .. } => "link",
            Self::Download { .. } => "download",
            Self::Configure { .. } => "configure",
            Self::Check => "check",
            Self::Upload(_) => "upload",
            Self::Settings(_) => "settings",
        }
    }
}

/// Values `settings` writes into `settings.toml`; `None` keeps the current one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub site_url: Option<String>,
    pub sound_base_path: Option<String>,
    pub catalog: Option<PathBuf>,
    pub sounds_dir: Option<PathBuf>,
    pub api_base_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    pub file: PathBuf,
    pub title: String,
    pub category: Category,
    pub description: String,
    pub password: Option<String>,
    pub retry_register: bool,
    /// Run against an in-memory copy of the local catalog instead of the remote.
    pub dry_run: bool,
    pub catalog: Option<PathBuf>,
}

/// Strip global `-v/--verbose` and `-q/--quiet` flags given before the
/// command; the last one wins.
pub fn take_console_level(args: &mut Vec<String>) -> ConsoleLevel {
    let mut level = ConsoleLevel::Normal;
    let mut consumed = 0;
    for arg in args.iter() {
        level = match arg.as_str() {
            "-v" | "--verbose" => ConsoleLevel::Verbose,
            "-q" | "--quiet" => ConsoleLevel::Quiet,
            _ => break,
        };
        consumed += 1;
    }
    args.drain(..consumed);
    level
}

/// Parse arguments (without the program name). `Ok(None)` means help was printed.
pub fn parse_args(args: Vec<String>) -> Result<Option<Command>, String> {
    let Some((name, rest)) = args.split_first() else {
        return Err(help_text());
    };
    let mut parser = ArgParser::new(rest);
    let command = match name.as_str() {
        "-h" | "--help" | "help" => {
            println!("{}", help_text());
            return Ok(None);
        }
        "list" => {
            let mut query = String::new();
            let mut category = CategoryFilter::All;
            let mut source = CatalogSource::Configured;
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--query" | "-q" => query = parser.value(arg)?.to_string(),
                    "--category" | "-c" => {
                        category = parser
                            .value(arg)?
                            .parse::<CategoryFilter>()
                            .map_err(|err| err.to_string())?
                    }
                    "--catalog" => source = CatalogSource::File(PathBuf::from(parser.value(arg)?)),
                    "--remote" => source = CatalogSource::Remote,
                    other => return parser.unknown(other),
                }
            }
            Command::List {
                query,
                category,
                source,
            }
        }
        "play" => {
            let mut ids = Vec::new();
            let mut source = CatalogSource::Configured;
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--catalog" => source = CatalogSource::File(PathBuf::from(parser.value(arg)?)),
                    "--remote" => source = CatalogSource::Remote,
                    other if other.starts_with('-') => return parser.unknown(other),
                    id => ids.push(AssetId::new(id)),
                }
            }
            if ids.is_empty() {
                return Err("play requires at least one sound id".to_string());
            }
            Command::Play { ids, source }
        }
        "link" => {
            let mut id = None;
            let mut copy = false;
            let mut open = false;
            let mut source = CatalogSource::Configured;
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--copy" => copy = true,
                    "--open" => open = true,
                    "--catalog" => source = CatalogSource::File(PathBuf::from(parser.value(arg)?)),
                    "--remote" => source = CatalogSource::Remote,
                    other if other.starts_with('-') => return parser.unknown(other),
                    value => id = Some(AssetId::new(value)),
                }
            }
            Command::Link {
                id: id.ok_or_else(|| "link requires a sound id".to_string())?,
                copy,
                open,
                source,
            }
        }
        "download" => {
            let mut id = None;
            let mut out_dir = PathBuf::from(".");
            let mut source = CatalogSource::Configured;
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--out" | "-o" => out_dir = PathBuf::from(parser.value(arg)?),
                    "--catalog" => source = CatalogSource::File(PathBuf::from(parser.value(arg)?)),
                    "--remote" => source = CatalogSource::Remote,
                    other if other.starts_with('-') => return parser.unknown(other),
                    value => id = Some(AssetId::new(value)),
                }
            }
            Command::Download {
                id: id.ok_or_else(|| "download requires a sound id".to_string())?,
                out_dir,
                source,
            }
        }
        "configure" => {
            let (mut owner, mut repo, mut token, mut password) = (None, None, None, None);
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--owner" => owner = Some(parser.value(arg)?.to_string()),
                    "--repo" => repo = Some(parser.value(arg)?.to_string()),
                    "--token" => token = Some(parser.value(arg)?.to_string()),
                    "--password" => password = Some(parser.value(arg)?.to_string()),
                    other => return parser.unknown(other),
                }
            }
            Command::Configure {
                owner: owner.ok_or_else(|| "--owner is required".to_string())?,
                repo: repo.ok_or_else(|| "--repo is required".to_string())?,
                token: token.ok_or_else(|| "--token is required".to_string())?,
                password,
            }
        }
        "check" => {
            if let Some(other) = parser.next_arg() {
                return parser.unknown(other);
            }
            Command::Check
        }
        "upload" => {
            let mut file = None;
            let mut title = None;
            let mut category = None;
            let mut description = String::new();
            let mut password = None;
            let mut retry_register = false;
            let mut dry_run = false;
            let mut catalog = None;
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--file" | "-f" => file = Some(PathBuf::from(parser.value(arg)?)),
                    "--title" | "-t" => title = Some(parser.value(arg)?.to_string()),
                    "--category" | "-c" => {
                        category = Some(
                            parser
                                .value(arg)?
                                .parse::<Category>()
                                .map_err(|err| err.to_string())?,
                        )
                    }
                    "--description" | "-d" => description = parser.value(arg)?.to_string(),
                    "--password" => password = Some(parser.value(arg)?.to_string()),
                    "--retry-register" => retry_register = true,
                    "--dry-run" => dry_run = true,
                    "--catalog" => catalog = Some(PathBuf::from(parser.value(arg)?)),
                    other => return parser.unknown(other),
                }
            }
            Command::Upload(UploadOptions {
                file: file.ok_or_else(|| "--file is required".to_string())?,
                title: title.ok_or_else(|| "--title is required".to_string())?,
                category: category.ok_or_else(|| "--category is required".to_string())?,
                description,
                password,
                retry_register,
                dry_run,
                catalog,
            })
        }
        "settings" => {
            let mut update = SettingsUpdate::default();
            while let Some(arg) = parser.next_arg() {
                match arg {
                    "--site-url" => update.site_url = Some(parser.value(arg)?.to_string()),
                    "--sound-base-path" => {
                        update.sound_base_path = Some(parser.value(arg)?.to_string())
                    }
                    "--catalog" => update.catalog = Some(PathBuf::from(parser.value(arg)?)),
                    "--sounds-dir" => update.sounds_dir = Some(PathBuf::from(parser.value(arg)?)),
                    "--api-base-url" => update.api_base_url = Some(parser.value(arg)?.to_string()),
                    other => return parser.unknown(other),
                }
            }
            Command::Settings(update)
        }
        unknown => return Err(format!("Unknown command: {unknown}\n\n{}", help_text())),
    };
    Ok(Some(command))
}

pub fn help_text() -> String {
    let categories = Category::ALL
        .iter()
        .map(|category| category.label())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Usage: sonicvault [-v|-q] <command> [options]\n\n\
Commands:\n  \
list [--query Q] [--category C] [--catalog PATH] [--remote]\n      \
Show catalog entries matching the query and category.\n  \
play ID... [--catalog PATH] [--remote]\n      \
Play sounds one after another.\n  \
link ID [--copy] [--open]\n      \
Print the public URL of a sound, optionally copying or opening it.\n  \
download ID [--out DIR]\n      \
Save a sound into DIR (default: current directory).\n  \
configure --owner O --repo R --token T [--password P]\n      \
Verify and save repository credentials.\n  \
check\n      \
Verify the saved credentials can reach the repository.\n  \
upload --file F --title T --category C [--description D] [--password P]\n         \
[--retry-register] [--dry-run [--catalog PATH]]\n      \
Upload a sound and register it in the catalog.\n  \
settings [--site-url U] [--sound-base-path P] [--catalog PATH]\n           \
[--sounds-dir DIR] [--api-base-url U]\n      \
Update and print settings.toml (written with defaults on first use).\n\n\
Categories: All, {categories}\n\
The admin password may also be given via SONICVAULT_ADMIN_PASSWORD.\n\
-v/--verbose and -q/--quiet adjust console logging; RUST_LOG filters the run log\n\
written under the app data directory."
    )
}

struct ArgParser<'a> {
    args: &'a [String],
    idx: usize,
}

impl<'a> ArgParser<'a> {
    fn new(args: &'a [String]) -> Self {
        Self { args, idx: 0 }
    }

    fn next_arg(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.idx)?;
        self.idx += 1;
        Some(arg.as_str())
    }

    fn value(&mut self, flag: &str) -> Result<&'a str, String> {
        self.next_arg()
            .ok_or_else(|| format!("{flag} requires a value"))
    }

    fn unknown<T>(&self, arg: &str) -> Result<T, String> {
        Err(format!("Unknown argument: {arg}\n\n{}", help_text()))
    }
}
