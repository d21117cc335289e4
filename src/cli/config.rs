use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::autofill::orchestrator::TimingConfig;
use crate::browser::session::DriverConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "form-recall",
    version,
    about = "Save web forms once, fill and submit them on every later visit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Record file (overrides store.path from the config file)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Path to config file (default: form-recall.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

/// Where a page comes from: a saved snapshot file or a live browser.
#[derive(clap::Args, Debug, Clone, PartialEq)]
#[group(required = true, multiple = false)]
pub struct PageSource {
    /// Page snapshot JSON ({url, title, frames})
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Open this URL in the browser driver
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn enabled(self) -> bool {
        self == Switch::On
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture the fields of a page and save them as a new form
    Capture {
        #[command(flatten)]
        source: PageSource,

        /// Frame to capture (0 is the top document)
        #[arg(long, default_value_t = 0)]
        frame: usize,

        /// Title for the saved form (default: the page title)
        #[arg(long)]
        title: Option<String>,
    },

    /// List saved forms grouped by page
    List {
        /// Only forms saved for this page
        #[arg(long)]
        url: Option<String>,
    },

    /// Search titles, URLs and field labels
    Search { query: String },

    /// Show one saved form with its fields
    Show { id: String },

    /// Rename a saved form
    Rename { id: String, title: String },

    /// Turn unattended fill or submit on or off
    Toggle {
        id: String,

        #[arg(long, value_enum)]
        auto_fill: Option<Switch>,

        #[arg(long, value_enum)]
        auto_submit: Option<Switch>,
    },

    /// Change the stored value of one field
    SetField {
        id: String,
        /// Position of the field in the form's field list
        index: usize,
        value: String,
    },

    /// Fill a page: one form now (--id) or an unattended session
    Fill {
        #[command(flatten)]
        source: PageSource,

        /// Frame the session runs in (0 is the top document)
        #[arg(long, default_value_t = 0)]
        frame: usize,

        /// Fill this saved form immediately instead of running a session
        #[arg(long)]
        id: Option<String>,

        /// Write the recorded page mutations here (snapshot pages only)
        #[arg(short, long)]
        output: Option<String>,

        /// Append session events as JSON lines to this file
        #[arg(long)]
        trace: Option<String>,
    },

    /// Delete one saved form
    Delete { id: String },

    /// Delete every saved form
    DeleteAll {
        /// Required: confirms the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Export every saved form as a JSON array
    Export {
        /// Output file (default: autofill-backup-YYYY-MM-DD.json)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import forms from an exported JSON array
    Import { file: String },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `form-recall.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// Serde default helpers
fn default_store_path() -> String { "form-recall.json".to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("form-recall.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = config_path, error = %e, "ignoring malformed config file");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

/// CLI flag beats config file.
pub fn resolve_store_path(cli_store: Option<&str>, config: &AppConfig) -> String {
    cli_store
        .map(str::to_string)
        .unwrap_or_else(|| config.store.path.clone())
}
