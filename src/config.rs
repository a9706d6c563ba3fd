//! Validated run configuration.
//!
//! Configuration is produced from CLI arguments and validated before any
//! work starts: selectors must parse, the start URL must be absolute, and
//! auth parameters must be complete or absent. Invalid configuration is a
//! [`ConfigError`], never a mid-run surprise.

use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use thiserror::Error;
use url::Url;

/// Errors produced while building or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A selector expression failed to parse.
    #[error("invalid selector for {option}: {selector}")]
    InvalidSelector {
        /// The CLI option the selector came from.
        option: &'static str,
        /// The selector expression that failed to parse.
        selector: String,
    },

    /// The start or auth URL is not a valid absolute URL.
    #[error("invalid URL for {option}: {url}")]
    InvalidUrl {
        /// The CLI option the URL came from.
        option: &'static str,
        /// The URL string that failed to parse.
        url: String,
    },

    /// A `selector;value` pair is missing its separator.
    #[error("malformed field pair (expected \"selector;value\"): {value}")]
    MalformedFieldPair {
        /// The raw argument value.
        value: String,
    },

    /// Auth was partially configured; all four auth options are required together.
    #[error("incomplete auth configuration: missing {field}")]
    MissingAuthField {
        /// The missing auth option.
        field: &'static str,
    },
}

/// What to do when a derived filename already exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CollisionPolicy {
    /// Replace the existing file with the newly downloaded one.
    #[default]
    Overwrite,
    /// Pick the next free name by inserting a numeric suffix before the extension.
    Rename,
    /// Skip the download entirely and count the target as skipped.
    Ignore,
}

/// A form field to fill during login replay: a selector plus the value to type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFill {
    /// Selector locating the input element.
    pub selector: String,
    /// The value to fill in.
    pub value: String,
}

impl FromStr for FieldFill {
    type Err = ConfigError;

    /// Parses the CLI `selector;value` format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((selector, value)) = s.split_once(';') else {
            return Err(ConfigError::MalformedFieldPair {
                value: s.to_string(),
            });
        };
        if selector.is_empty() {
            return Err(ConfigError::MalformedFieldPair {
                value: s.to_string(),
            });
        }
        Ok(Self {
            selector: selector.to_string(),
            value: value.to_string(),
        })
    }
}

/// Parameters for the login replay applied once per created session.
#[derive(Clone)]
pub struct AuthParams {
    /// URL of the login page.
    pub url: Url,
    /// Login input selector and value.
    pub login: FieldFill,
    /// Password input selector and value.
    pub password: FieldFill,
    /// Selector of the submit element.
    pub submit_selector: String,
}

// Credential values must never reach the logs, so Debug only shows the
// selectors.
impl std::fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthParams")
            .field("url", &self.url.as_str())
            .field("login_selector", &self.login.selector)
            .field("password_selector", &self.password.selector)
            .field("submit_selector", &self.submit_selector)
            .finish()
    }
}

/// Fully validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Start URL for the outer pagination chain.
    pub root_url: Url,
    /// Selector for downloadable-resource links (read `href` and `src`).
    pub link_selector: String,
    /// Selector for container-page links on outer pages.
    pub container_selector: Option<String>,
    /// Next-page selector for the outer (container) chain.
    pub next_container_selector: Option<String>,
    /// Next-page selector for inner (leaf) chains. When absent, each
    /// container chain ends after its first page.
    pub next_links_selector: Option<String>,
    /// Fixed selector hops applied inside a container before pagination starts.
    pub container_path: Vec<String>,
    /// Directory downloaded files are written to.
    pub output_dir: PathBuf,
    /// Number of trailing URL path segments used to derive filenames.
    pub filename_segments: usize,
    /// Worker count: inner walk workers, download slots, and session pool capacity.
    pub threads: usize,
    /// Filename collision policy.
    pub policy: CollisionPolicy,
    /// Maximum fetch attempts per target before it counts as failed.
    pub max_attempts: u32,
    /// Optional login replay parameters.
    pub auth: Option<AuthParams>,
}

impl Config {
    /// Validates every selector expression in the configuration.
    ///
    /// Selector validity is checked up front so a typo surfaces as a
    /// [`ConfigError`] before any session is created, rather than as a
    /// silently-empty crawl.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSelector`] naming the offending option.
    pub fn validate_selectors(&self) -> Result<(), ConfigError> {
        validate_selector("--link", &self.link_selector)?;
        if let Some(s) = &self.container_selector {
            validate_selector("--container", s)?;
        }
        if let Some(s) = &self.next_container_selector {
            validate_selector("--next-container", s)?;
        }
        if let Some(s) = &self.next_links_selector {
            validate_selector("--next-links", s)?;
        }
        for s in &self.container_path {
            validate_selector("--container-path", s)?;
        }
        if let Some(auth) = &self.auth {
            validate_selector("--auth-login", &auth.login.selector)?;
            validate_selector("--auth-password", &auth.password.selector)?;
            validate_selector("--auth-submit", &auth.submit_selector)?;
        }
        Ok(())
    }
}

fn validate_selector(option: &'static str, selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        option,
        selector: selector.to_string(),
    })?;
    Ok(())
}

/// Assembles [`AuthParams`] from the four optional CLI values.
///
/// All four must be present together; any partial combination is a
/// configuration error naming the first missing option.
///
/// # Errors
///
/// Returns [`ConfigError::MissingAuthField`], [`ConfigError::InvalidUrl`],
/// or [`ConfigError::MalformedFieldPair`].
pub fn build_auth_params(
    auth_url: Option<&str>,
    auth_login: Option<&str>,
    auth_password: Option<&str>,
    auth_submit: Option<&str>,
) -> Result<Option<AuthParams>, ConfigError> {
    if auth_url.is_none() && auth_login.is_none() && auth_password.is_none() && auth_submit.is_none()
    {
        return Ok(None);
    }

    let url = auth_url.ok_or(ConfigError::MissingAuthField { field: "--auth-url" })?;
    let login = auth_login.ok_or(ConfigError::MissingAuthField {
        field: "--auth-login",
    })?;
    let password = auth_password.ok_or(ConfigError::MissingAuthField {
        field: "--auth-password",
    })?;
    let submit = auth_submit.ok_or(ConfigError::MissingAuthField {
        field: "--auth-submit",
    })?;

    let url = Url::parse(url).map_err(|_| ConfigError::InvalidUrl {
        option: "--auth-url",
        url: url.to_string(),
    })?;

    Ok(Some(AuthParams {
        url,
        login: login.parse()?,
        password: password.parse()?,
        submit_selector: submit.to_string(),
    }))
}
