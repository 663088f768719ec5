use std::path::PathBuf;

use jira_rtl_config::SettingsError;
use jira_rtl_dom::DomError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule set contains no rules")]
    EmptyRuleSet,

    #[error("rule has no selectors")]
    EmptyPatterns,

    #[error("invalid selector: {0}")]
    InvalidSelector(#[from] DomError),

    #[error("rule {index}: {source}")]
    InRule {
        index: usize,
        #[source]
        source: Box<RuleError>,
    },

    #[error("failed to parse rule file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read rule file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("history entry points cannot be patched by this navigation source")]
    HistoryUnsupported,

    #[error(transparent)]
    Source(DomError),
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Rules(#[from] RuleError),
}
