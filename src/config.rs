use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use reqwest::Url;
use serde::de::Deserializer;
use serde::Deserialize;

use crate::api::DEFAULT_API_URL;
use crate::view::{FilterMode, SortDirection, SortMode, ViewState, DEFAULT_PAGE_SIZE};

const CONFIG_FILE_NAME: &str = "config.toml";
const SESSION_FILE_NAME: &str = "session.json";
const LOG_FILE_NAME: &str = "cbook.log";
const APP_NAME: &str = "cbook";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const API_URL_ENV: &str = "CBOOK_API_URL";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub api_url: String,
    pub session_file: PathBuf,
    pub log_file: PathBuf,
    pub timeout_secs: u64,
    pub view: ViewConfig,
    pub keys: Keys,
    pub ui: UiConfig,
    /// Problems worth reporting once logging is up (unknown keys and such).
    pub warnings: Vec<String>,
}

/// List preferences applied when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub page_size: usize,
    pub sort: SortMode,
    pub order: SortDirection,
    pub starred_only: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortMode::First,
            order: SortDirection::Asc,
            starred_only: false,
        }
    }
}

impl ViewConfig {
    pub fn initial_state(&self) -> ViewState {
        ViewState {
            sort: self.sort,
            direction: self.order,
            filter: if self.starred_only {
                FilterMode::Starred
            } else {
                FilterMode::All
            },
            page_size: self.page_size,
            ..ViewState::default()
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
    pub star: RgbColor,
    pub error: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// =============================================================================
// Key Bindings - Context-aware with multiple bindings per action
// =============================================================================

/// All key bindings organized by context
#[derive(Debug, Clone)]
pub struct Keys {
    /// Work everywhere except text entry
    pub global: GlobalKeys,
    /// Contact list navigation and actions
    pub list: ListKeys,
    /// Search box
    pub search: SearchKeys,
    /// Confirmation and merge prompts
    pub modal: ModalKeys,
    /// Add/edit form
    pub form: FormKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub help: Vec<String>,
    pub search: Vec<String>,
    pub refresh: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub page_next: Vec<String>,
    pub page_prev: Vec<String>,
    pub add: Vec<String>,
    pub edit: Vec<String>,
    pub delete: Vec<String>,
    pub star: Vec<String>,
    pub sort: Vec<String>,
    pub order: Vec<String>,
    pub starred: Vec<String>,
    pub import: Vec<String>,
    pub export: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModalKeys {
    pub confirm: Vec<String>,
    /// "Keep both" in the merge prompt; "no" elsewhere.
    pub keep: Vec<String>,
    pub cancel: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FormKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub save: Vec<String>,
    pub cancel: Vec<String>,
}

// =============================================================================
// Default implementations
// =============================================================================

fn keys(bindings: &[&str]) -> Vec<String> {
    bindings.iter().map(|b| b.to_string()).collect()
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            global: GlobalKeys::default(),
            list: ListKeys::default(),
            search: SearchKeys::default(),
            modal: ModalKeys::default(),
            form: FormKeys::default(),
        }
    }
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: keys(&["q"]),
            help: keys(&["?", "F1"]),
            search: keys(&["/"]),
            refresh: keys(&["F5"]),
        }
    }
}

impl Default for ListKeys {
    fn default() -> Self {
        Self {
            next: keys(&["j", "Down"]),
            prev: keys(&["k", "Up"]),
            page_next: keys(&["l", "Right", "PageDown"]),
            page_prev: keys(&["h", "Left", "PageUp"]),
            add: keys(&["a"]),
            edit: keys(&["e", "Enter"]),
            delete: keys(&["d", "Delete"]),
            star: keys(&["s"]),
            sort: keys(&["o"]),
            order: keys(&["O"]),
            starred: keys(&["f"]),
            import: keys(&["i"]),
            export: keys(&["x"]),
        }
    }
}

impl Default for SearchKeys {
    fn default() -> Self {
        Self {
            cancel: keys(&["Esc"]),
            confirm: keys(&["Enter"]),
        }
    }
}

impl Default for ModalKeys {
    fn default() -> Self {
        Self {
            confirm: keys(&["y", "Enter"]),
            keep: keys(&["n"]),
            cancel: keys(&["c", "Esc"]),
        }
    }
}

impl Default for FormKeys {
    fn default() -> Self {
        Self {
            next: keys(&["Tab", "Down"]),
            prev: keys(&["BackTab", "Up"]),
            save: keys(&["F2"]),
            cancel: keys(&["Esc"]),
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

/// Missing entries keep the default binding.
fn binding(file: Option<KeyBinding>, default: Vec<String>) -> Vec<String> {
    file.map(KeyBinding::into_vec).unwrap_or(default)
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    list: ListKeysFile,
    search: SearchKeysFile,
    modal: ModalKeysFile,
    form: FormKeysFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GlobalKeysFile {
    quit: Option<KeyBinding>,
    help: Option<KeyBinding>,
    search: Option<KeyBinding>,
    refresh: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListKeysFile {
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
    page_next: Option<KeyBinding>,
    page_prev: Option<KeyBinding>,
    add: Option<KeyBinding>,
    edit: Option<KeyBinding>,
    delete: Option<KeyBinding>,
    star: Option<KeyBinding>,
    sort: Option<KeyBinding>,
    order: Option<KeyBinding>,
    starred: Option<KeyBinding>,
    import: Option<KeyBinding>,
    export: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchKeysFile {
    cancel: Option<KeyBinding>,
    confirm: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ModalKeysFile {
    confirm: Option<KeyBinding>,
    keep: Option<KeyBinding>,
    cancel: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FormKeysFile {
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
    save: Option<KeyBinding>,
    cancel: Option<KeyBinding>,
}

// =============================================================================
// Conversion from file types to runtime types
// =============================================================================

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: file.global.into(),
            list: file.list.into(),
            search: file.search.into(),
            modal: file.modal.into(),
            form: file.form.into(),
        }
    }
}

impl From<GlobalKeysFile> for GlobalKeys {
    fn from(file: GlobalKeysFile) -> Self {
        let d = GlobalKeys::default();
        Self {
            quit: binding(file.quit, d.quit),
            help: binding(file.help, d.help),
            search: binding(file.search, d.search),
            refresh: binding(file.refresh, d.refresh),
        }
    }
}

impl From<ListKeysFile> for ListKeys {
    fn from(file: ListKeysFile) -> Self {
        let d = ListKeys::default();
        Self {
            next: binding(file.next, d.next),
            prev: binding(file.prev, d.prev),
            page_next: binding(file.page_next, d.page_next),
            page_prev: binding(file.page_prev, d.page_prev),
            add: binding(file.add, d.add),
            edit: binding(file.edit, d.edit),
            delete: binding(file.delete, d.delete),
            star: binding(file.star, d.star),
            sort: binding(file.sort, d.sort),
            order: binding(file.order, d.order),
            starred: binding(file.starred, d.starred),
            import: binding(file.import, d.import),
            export: binding(file.export, d.export),
        }
    }
}

impl From<SearchKeysFile> for SearchKeys {
    fn from(file: SearchKeysFile) -> Self {
        let d = SearchKeys::default();
        Self {
            cancel: binding(file.cancel, d.cancel),
            confirm: binding(file.confirm, d.confirm),
        }
    }
}

impl From<ModalKeysFile> for ModalKeys {
    fn from(file: ModalKeysFile) -> Self {
        let d = ModalKeys::default();
        Self {
            confirm: binding(file.confirm, d.confirm),
            keep: binding(file.keep, d.keep),
            cancel: binding(file.cancel, d.cancel),
        }
    }
}

impl From<FormKeysFile> for FormKeys {
    fn from(file: FormKeysFile) -> Self {
        let d = FormKeys::default();
        Self {
            next: binding(file.next, d.next),
            prev: binding(file.prev, d.prev),
            save: binding(file.save, d.save),
            cancel: binding(file.cancel, d.cancel),
        }
    }
}

// =============================================================================
// Key binding validation
// =============================================================================

/// Single characters keep their case ('O' is Shift+o); key names do not.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("help", &keys.global.help),
            ("search", &keys.global.search),
            ("refresh", &keys.global.refresh),
        ],
        "global",
    )?;

    // List keys are live together with the global ones.
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("help", &keys.global.help),
            ("search", &keys.global.search),
            ("refresh", &keys.global.refresh),
            ("next", &keys.list.next),
            ("prev", &keys.list.prev),
            ("page_next", &keys.list.page_next),
            ("page_prev", &keys.list.page_prev),
            ("add", &keys.list.add),
            ("edit", &keys.list.edit),
            ("delete", &keys.list.delete),
            ("star", &keys.list.star),
            ("sort", &keys.list.sort),
            ("order", &keys.list.order),
            ("starred", &keys.list.starred),
            ("import", &keys.list.import),
            ("export", &keys.list.export),
        ],
        "list",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.search.cancel),
            ("confirm", &keys.search.confirm),
        ],
        "search",
    )?;

    check_context_collisions(
        &[
            ("confirm", &keys.modal.confirm),
            ("keep", &keys.modal.keep),
            ("cancel", &keys.modal.cancel),
        ],
        "modal",
    )?;

    check_context_collisions(
        &[
            ("next", &keys.form.next),
            ("prev", &keys.form.prev),
            ("save", &keys.form.save),
            ("cancel", &keys.form.cancel),
        ],
        "form",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    session_file: Option<PathBuf>,
    log_file: Option<PathBuf>,
    timeout_secs: Option<u64>,
    view: ViewFile,
    keys: KeysFile,
    ui: UiFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ViewFile {
    page_size: Option<usize>,
    sort: Option<SortMode>,
    order: Option<SortDirection>,
    starred_only: Option<bool>,
}

impl ViewFile {
    fn into_config(self) -> Result<ViewConfig> {
        let defaults = ViewConfig::default();
        let page_size = self.page_size.unwrap_or(defaults.page_size);
        if page_size == 0 {
            bail!("view.page_size must be at least 1");
        }
        Ok(ViewConfig {
            page_size,
            sort: self.sort.unwrap_or(defaults.sort),
            order: self.order.unwrap_or(defaults.order),
            starred_only: self.starred_only.unwrap_or(defaults.starred_only),
        })
    }
}

fn data_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_local_dir().join(APP_NAME))
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

pub fn default_log_file() -> Result<PathBuf> {
    Ok(data_root()?.join(LOG_FILE_NAME))
}

/// `explicit` comes from `--config`; it must exist. The default location may
/// be absent, in which case every setting takes its default.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let env_api_url = std::env::var(API_URL_ENV).ok();
    let path = match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path
        }
        None => config_path()?,
    };

    let raw = if path.exists() {
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration file at {}", path.display()))?
    } else {
        String::new()
    };

    from_toml(&raw, path, env_api_url)
}

fn from_toml(raw: &str, path: PathBuf, env_api_url: Option<String>) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    let mut warnings = Vec::new();
    warn_unknown_keys(&value, &mut warnings);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let api_url = resolve_api_url(cfg_file.api_url, env_api_url)?;

    let session_file = match cfg_file.session_file {
        Some(path) => expand_tilde(&path),
        None => data_root()?.join(SESSION_FILE_NAME),
    };
    let log_file = match cfg_file.log_file {
        Some(path) => expand_tilde(&path),
        None => default_log_file()?,
    };

    let timeout_secs = cfg_file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        bail!("timeout_secs must be at least 1");
    }

    let view = cfg_file.view.into_config()?;

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    Ok(Config {
        config_path: path,
        api_url,
        session_file,
        log_file,
        timeout_secs,
        view,
        keys,
        ui: cfg_file.ui.into(),
        warnings,
    })
}

/// The environment wins over the file; both fall back to the local default.
fn resolve_api_url(file: Option<String>, env: Option<String>) -> Result<String> {
    let raw = env
        .filter(|value| !value.trim().is_empty())
        .or(file)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let trimmed = raw.trim().trim_end_matches('/').to_string();
    let url = Url::parse(&trimmed).with_context(|| format!("api_url is not a valid URL: {}", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api_url must use http or https: {}", raw);
    }
    Ok(trimmed)
}

/// Write a commented starter config. Refuses to replace an existing file
/// unless `force` is set.
pub fn write_default(path: Option<&Path>, api_url: Option<&str>, force: bool) -> Result<PathBuf> {
    let path = match path {
        Some(path) => expand_tilde(path),
        None => config_path()?,
    };
    if path.exists() && !force {
        bail!(
            "configuration file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let api_url = resolve_api_url(api_url.map(str::to_string), None)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
    }
    fs::write(&path, default_config_text(&api_url))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn default_config_text(api_url: &str) -> String {
    format!(
        r#"# cbook configuration

# Contacts API base URL ({env} overrides this)
api_url = "{api_url}"

# Request timeout in seconds
timeout_secs = {timeout}

# Where the login token is kept and where the terminal UI writes its log
# session_file = "~/.local/share/cbook/session.json"
# log_file = "~/.local/share/cbook/cbook.log"

[view]
page_size = {page_size}
sort = "first"      # "first" or "recent"
order = "asc"       # "asc" or "desc"
starred_only = false

# Colors are [r, g, b] or {{ r = .., g = .., b = .. }}
[ui.colors]
border = [255, 165, 0]
selection_bg = [255, 165, 0]
selection_fg = [0, 0, 0]

# Each action takes a key or a list of keys, e.g. next = ["j", "Down"]
[keys.global]
quit = "q"
help = ["?", "F1"]
search = "/"
refresh = "F5"
"#,
        env = API_URL_ENV,
        api_url = api_url,
        timeout = DEFAULT_TIMEOUT_SECS,
        page_size = DEFAULT_PAGE_SIZE,
    )
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value, warnings: &mut Vec<String>) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from([
        "api_url",
        "session_file",
        "log_file",
        "timeout_secs",
        "view",
        "keys",
        "ui",
    ]);

    for key in table.keys() {
        if !known.contains(key.as_str()) {
            warnings.push(format!("unknown configuration key `{}`", key));
        }
    }

    if let Some(view_val) = table.get("view") {
        warn_unknown_in_section(
            view_val,
            "view",
            &["page_size", "sort", "order", "starred_only"],
            warnings,
        );
    }

    if let Some(keys_val) = table.get("keys") {
        warn_unknown_keys_section(keys_val, warnings);
    }

    if let Some(ui_val) = table.get("ui") {
        warn_unknown_in_section(ui_val, "ui", &["colors"], warnings);
        if let Some(colors_val) = ui_val.get("colors") {
            warn_unknown_in_section(
                colors_val,
                "ui.colors",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "separator",
                    "status_fg",
                    "status_bg",
                    "star",
                    "error",
                ],
                warnings,
            );
        }
    }
}

fn warn_unknown_keys_section(value: &toml::Value, warnings: &mut Vec<String>) {
    let Some(table) = value.as_table() else {
        return;
    };

    let contexts: [(&str, &[&str]); 5] = [
        ("global", &["quit", "help", "search", "refresh"]),
        (
            "list",
            &[
                "next", "prev", "page_next", "page_prev", "add", "edit", "delete", "star", "sort",
                "order", "starred", "import", "export",
            ],
        ),
        ("search", &["cancel", "confirm"]),
        ("modal", &["confirm", "keep", "cancel"]),
        ("form", &["next", "prev", "save", "cancel"]),
    ];

    for key in table.keys() {
        if !contexts.iter().any(|(name, _)| *name == key.as_str()) {
            warnings.push(format!("unknown keys.* context `{}`", key));
        }
    }

    for (name, known) in contexts {
        if let Some(v) = table.get(name) {
            warn_unknown_in_section(v, &format!("keys.{}", name), known, warnings);
        }
    }
}

fn warn_unknown_in_section(
    value: &toml::Value,
    section: &str,
    known: &[&str],
    warnings: &mut Vec<String>,
) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            warnings.push(format!("unknown {}.* entry `{}`", section, key));
        }
    }
}

// =============================================================================
// UI config types
// =============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
    star: RgbColor,
    error: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
            star: RgbColor::new(255, 215, 0),
            error: RgbColor::new(230, 70, 70),
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        let c = file.colors;
        Self {
            colors: UiColors {
                border: c.border,
                selection_bg: c.selection_bg,
                selection_fg: c.selection_fg,
                separator: c.separator,
                status_fg: c.status_fg,
                status_bg: c.status_bg,
                star: c.star,
                error: c.error,
            },
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiFile::default().into()
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}
