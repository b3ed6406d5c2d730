use std::fmt;
use std::path::PathBuf;

use placement::{
    load_content, resolve_app_paths, BuildSession, ContentError, ReleasePolicy, SaveStore,
    SessionConfig, SessionSetupError, StartupError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const RELEASE_CELLS_ENV_VAR: &str = "PLACEMENT_RELEASE_CELLS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CliOptions {
    pub(crate) script: Option<PathBuf>,
    pub(crate) content: Option<PathBuf>,
    pub(crate) help: bool,
}

pub(crate) struct AppWiring {
    pub(crate) session: BuildSession,
    pub(crate) store: SaveStore,
}

#[derive(Debug)]
pub(crate) enum BootstrapError {
    Startup(StartupError),
    Content(ContentError),
    Session(SessionSetupError),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup(err) => write!(f, "{err}"),
            Self::Content(err) => write!(f, "{err}"),
            Self::Session(err) => write!(f, "invalid session configuration: {err}"),
        }
    }
}

impl std::error::Error for BootstrapError {}

pub(crate) fn usage_text() -> String {
    [
        "usage: builder [--script <path>] [--content <path>]",
        "",
        "Replays builder commands from <path>, or from stdin when no script is given.",
        "Environment:",
        "  PLACEMENT_ROOT           project root (assets/content.xml, saves/)",
        "  PLACEMENT_RELEASE_CELLS  set to 1 to free grid cells when objects leave their spot",
        "  RUST_LOG                 tracing filter, default 'info'",
    ]
    .join("\n")
}

pub(crate) fn parse_cli_args(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                options.help = true;
                index += 1;
            }
            "--script" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --script".to_string())?;
                options.script = Some(PathBuf::from(value));
                index += 2;
            }
            "--content" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --content".to_string())?;
                options.content = Some(PathBuf::from(value));
                index += 2;
            }
            other => {
                return Err(format!("unknown argument '{other}'\n{}", usage_text()));
            }
        }
    }
    Ok(options)
}

pub(crate) fn build_app(options: &CliOptions) -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Placement Builder Startup ===");

    let paths = resolve_app_paths().map_err(BootstrapError::Startup)?;
    let content_file = options
        .content
        .clone()
        .unwrap_or_else(|| paths.content_file.clone());
    let content = load_content(&content_file).map_err(BootstrapError::Content)?;

    let config = session_config_from_env();
    let prefab_count = content.catalog.len();
    let material_count = content.palette.len();
    let session = BuildSession::new(config, content.catalog, content.palette)
        .map_err(BootstrapError::Session)?;
    let store = paths.save_store();

    info!(
        root = %paths.root.display(),
        save_path = %store.path().display(),
        prefab_count,
        material_count,
        release_policy = ?config.release_policy,
        "builder_ready"
    );
    Ok(AppWiring { session, store })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn session_config_from_env() -> SessionConfig {
    SessionConfig {
        release_policy: parse_release_policy(std::env::var(RELEASE_CELLS_ENV_VAR).ok().as_deref()),
        ..SessionConfig::default()
    }
}

fn parse_release_policy(raw: Option<&str>) -> ReleasePolicy {
    if matches!(raw, Some("1")) {
        ReleasePolicy::Release
    } else {
        ReleasePolicy::Retain
    }
}
