//! Render and aggregation settings
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags
//! 2. Environment variables (`QUERYMAP_ENGINE`, `QUERYMAP_LAYOUT_TIMEOUT_SECS`,
//!    `QUERYMAP_MAX_PATHS`)
//! 3. The document's `style:` section
//! 4. Defaults

use std::time::Duration;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{QuerymapError, Result};
use crate::probability::{AggregateOptions, DEFAULT_MAX_PATHS};

/// Default layout engine binary
pub const DEFAULT_ENGINE: &str = "dot";

/// Default layout engine timeout
pub const DEFAULT_LAYOUT_TIMEOUT: Duration = Duration::from_secs(60);

/// Graphviz colour names are lowercase words (with optional digits), or #rrggbb
static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#[0-9a-fA-F]{6}|[a-z]+[0-9]*)$").unwrap());

/// Check a colour value
pub fn validate_color(color: &str, context: &str) -> Result<()> {
    if COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(QuerymapError::InvalidColor {
            color: color.to_string(),
            context: context.to_string(),
        })
    }
}

/// Layout direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPERCASE")]
pub enum RankDir {
    /// Left to right (default)
    #[default]
    LR,
    /// Top to bottom
    TB,
    /// Right to left
    RL,
    /// Bottom to top
    BT,
}

impl RankDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankDir::LR => "LR",
            RankDir::TB => "TB",
            RankDir::RL => "RL",
            RankDir::BT => "BT",
        }
    }
}

/// Image format produced by the layout engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }

    /// Guess from a file extension
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "svg" => Some(ImageFormat::Svg),
            "pdf" => Some(ImageFormat::Pdf),
            _ => None,
        }
    }
}

/// Node group with its fill colour (drives palette and legend)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStyle {
    pub name: String,
    pub color: String,
    /// Legend text (defaults to the group name)
    #[serde(default)]
    pub label: Option<String>,
}

/// Explicit legend entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

/// Probability band thresholds (inclusive lower bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            high: 0.05,
            medium: 0.03,
        }
    }
}

/// Fill colours used for probability bands and fallbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandColors {
    pub high: String,
    pub medium: String,
    pub low: String,
    /// Services in documents without probabilities
    pub service: String,
    /// Query nodes without a group
    pub default: String,
}

impl Default for BandColors {
    fn default() -> Self {
        Self {
            high: "red".to_string(),
            medium: "orange".to_string(),
            low: "yellow".to_string(),
            service: "red".to_string(),
            default: "white".to_string(),
        }
    }
}

/// The `style:` section of a graph document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub rankdir: Option<RankDir>,
    pub groups: Vec<GroupStyle>,
    pub bands: Option<BandThresholds>,
    pub colors: Option<BandColors>,
    pub label_precision: Option<usize>,
    pub edge_precision: Option<usize>,
    pub legend: Option<Vec<LegendEntry>>,
    pub show_legend: Option<bool>,
}

impl StyleConfig {
    /// Validate every colour in the section
    pub fn validate(&self) -> Result<()> {
        for group in &self.groups {
            validate_color(&group.color, &format!("group '{}'", group.name))?;
        }
        if let Some(ref colors) = self.colors {
            validate_color(&colors.high, "colors.high")?;
            validate_color(&colors.medium, "colors.medium")?;
            validate_color(&colors.low, "colors.low")?;
            validate_color(&colors.service, "colors.service")?;
            validate_color(&colors.default, "colors.default")?;
        }
        if let Some(ref legend) = self.legend {
            for entry in legend {
                validate_color(&entry.color, &format!("legend '{}'", entry.label))?;
            }
        }
        Ok(())
    }
}

/// Values read from the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub engine: Option<String>,
    pub layout_timeout: Option<Duration>,
    pub max_paths: Option<usize>,
}

impl EnvOverrides {
    /// Read from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through an arbitrary lookup (unparseable numbers are ignored with a warning)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_num = |name: &str| -> Option<u64> {
            let raw = lookup(name)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(variable = name, value = %raw, "ignoring non-numeric value");
                    None
                }
            }
        };

        Self {
            engine: lookup("QUERYMAP_ENGINE").filter(|s| !s.trim().is_empty()),
            layout_timeout: parse_num("QUERYMAP_LAYOUT_TIMEOUT_SECS").map(Duration::from_secs),
            max_paths: parse_num("QUERYMAP_MAX_PATHS").map(|v| v as usize),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub rankdir: Option<RankDir>,
    pub engine: Option<String>,
    pub label_precision: Option<usize>,
    pub no_legend: bool,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub rankdir: RankDir,
    pub groups: Vec<GroupStyle>,
    pub bands: BandThresholds,
    pub colors: BandColors,
    pub label_precision: usize,
    pub edge_precision: usize,
    pub legend: Option<Vec<LegendEntry>>,
    pub show_legend: bool,
    pub engine: String,
    pub layout_timeout: Duration,
    pub max_paths: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rankdir: RankDir::default(),
            groups: Vec::new(),
            bands: BandThresholds::default(),
            colors: BandColors::default(),
            label_precision: 1,
            edge_precision: 1,
            legend: None,
            show_legend: true,
            engine: DEFAULT_ENGINE.to_string(),
            layout_timeout: DEFAULT_LAYOUT_TIMEOUT,
            max_paths: DEFAULT_MAX_PATHS,
        }
    }
}

impl Settings {
    /// Layer defaults < style < environment < CLI
    pub fn resolve(style: &StyleConfig, env: &EnvOverrides, cli: &CliOverrides) -> Self {
        let defaults = Settings::default();
        Self {
            rankdir: cli.rankdir.or(style.rankdir).unwrap_or(defaults.rankdir),
            groups: style.groups.clone(),
            bands: style.bands.unwrap_or(defaults.bands),
            colors: style.colors.clone().unwrap_or(defaults.colors),
            label_precision: cli
                .label_precision
                .or(style.label_precision)
                .unwrap_or(defaults.label_precision),
            edge_precision: style.edge_precision.unwrap_or(defaults.edge_precision),
            legend: style.legend.clone(),
            show_legend: !cli.no_legend && style.show_legend.unwrap_or(defaults.show_legend),
            engine: cli
                .engine
                .clone()
                .or_else(|| env.engine.clone())
                .unwrap_or(defaults.engine),
            layout_timeout: env.layout_timeout.unwrap_or(defaults.layout_timeout),
            max_paths: env.max_paths.unwrap_or(defaults.max_paths),
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            max_paths: self.max_paths,
        }
    }

    /// Fill colour for a group name
    pub fn group_color(&self, group: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.color.as_str())
    }
}
