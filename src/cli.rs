//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use content_downloader::config::{build_auth_params, Config, ConfigError};
use content_downloader::CollisionPolicy;

/// Crawl a paginated site hierarchy and download the linked resources.
///
/// The crawler walks the start URL's pagination chain, follows container
/// links into their own chains, and downloads every resource link it finds
/// into the output directory.
#[derive(Parser, Debug)]
#[command(name = "content-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Start URL
    #[arg(long)]
    pub url: String,

    /// Selector for links with files to be downloaded
    #[arg(long)]
    pub link: String,

    /// Selector for container links that lead to pages with more links
    #[arg(long)]
    pub container: Option<String>,

    /// Selector for reaching the next page of containers
    #[arg(long = "next-container")]
    pub next_container: Option<String>,

    /// Selector for reaching the next page of links inside a container
    #[arg(long = "next-links")]
    pub next_links: Option<String>,

    /// Selector hops to pass inside a container before finding links (repeatable)
    #[arg(long = "container-path")]
    pub container_path: Vec<String>,

    /// Count of URL segments used in output filenames
    #[arg(long = "names", default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub filename_segments: u8,

    /// Output directory
    #[arg(long, short)]
    pub output: PathBuf,

    /// Count of worker threads (inner walks and downloads)
    #[arg(long, short, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub threads: u8,

    /// What to do when a derived filename already exists
    #[arg(long, value_enum, default_value_t = CollisionPolicy::Overwrite)]
    pub policy: CollisionPolicy,

    /// Maximum fetch attempts per target before it counts as failed
    #[arg(long = "max-attempts", default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// URL of the auth page
    #[arg(long = "auth-url")]
    pub auth_url: Option<String>,

    /// Login selector and login in the format "selector;login"
    #[arg(long = "auth-login")]
    pub auth_login: Option<String>,

    /// Password selector and password in the format "selector;password"
    #[arg(long = "auth-password")]
    pub auth_password: Option<String>,

    /// Submit button selector
    #[arg(long = "auth-submit")]
    pub auth_submit: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output and the progress spinner
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Builds the validated run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the start URL is malformed, a selector
    /// does not parse, or auth options are incomplete or malformed.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let root_url = Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl {
            option: "--url",
            url: self.url.clone(),
        })?;

        let auth = build_auth_params(
            self.auth_url.as_deref(),
            self.auth_login.as_deref(),
            self.auth_password.as_deref(),
            self.auth_submit.as_deref(),
        )?;

        let config = Config {
            root_url,
            link_selector: self.link,
            container_selector: self.container,
            next_container_selector: self.next_container,
            next_links_selector: self.next_links,
            container_path: self.container_path,
            output_dir: self.output,
            filename_segments: usize::from(self.filename_segments),
            threads: usize::from(self.threads),
            policy: self.policy,
            max_attempts: u32::from(self.max_attempts),
            auth,
        };
        config.validate_selectors()?;
        Ok(config)
    }
}
