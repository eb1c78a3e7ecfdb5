//! INI configuration file.
//!
//! ```ini
//! [download]
//! chunk_size = 20MB
//! threads = 5
//! work_dir = tmp
//! timeout = 30
//! keep_parts = false
//! transfer_via_proxy = false
//!
//! [proxy]
//! enabled = true
//! file = proxies.txt
//! quota = 50
//! max_in_flight = 200
//! probe_url = https://api.myip.com
//! probe_timeout = 3
//! sources = https://a.example/list.txt, https://b.example/list.txt
//!
//! [retry]
//! max_attempts = 5
//! rate_limit_delay = 5
//! transient_delay = 2
//!
//! [link]
//! wait_ceiling = 60
//! max_challenge_attempts = 5
//!
//! [logging]
//! directory = /var/log/keepfetch
//! level = info
//! ```
//!
//! Every key is optional; absent keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{parse_size, ConfigError, SessionConfig};
use crate::link::AcquisitionConfig;
use crate::proxy::ValidationConfig;
use crate::transfer::RetryPolicy;

/// Default location of the configuration file.
///
/// Returns `None` when the platform has no configuration directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("keepfetch").join("config.ini"))
}

/// `[download]` section.
#[derive(Debug, Clone)]
pub struct DownloadSection {
    pub chunk_size: u64,
    pub threads: usize,
    pub work_dir: PathBuf,
    pub timeout: Duration,
    pub keep_parts: bool,
    pub transfer_via_proxy: bool,
}

/// `[proxy]` section.
#[derive(Debug, Clone)]
pub struct ProxySection {
    pub enabled: bool,
    pub file: PathBuf,
    pub sources: Vec<String>,
    pub validation: ValidationConfig,
}

/// `[retry]` section.
#[derive(Debug, Clone)]
pub struct RetrySection {
    pub policy: RetryPolicy,
}

/// `[link]` section.
#[derive(Debug, Clone)]
pub struct LinkSection {
    pub acquisition: AcquisitionConfig,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default)]
pub struct LoggingSection {
    pub directory: Option<PathBuf>,
    pub level: Option<String>,
}

/// Parsed configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub download: DownloadSection,
    pub proxy: ProxySection,
    pub retry: RetrySection,
    pub link: LinkSection,
    pub logging: LoggingSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            download: DownloadSection {
                chunk_size: session.chunk_size,
                threads: session.concurrency,
                work_dir: session.work_dir,
                timeout: session.request_timeout,
                keep_parts: session.keep_parts,
                transfer_via_proxy: session.transfer_via_bound_path,
            },
            proxy: ProxySection {
                enabled: session.use_proxies,
                file: session.proxy_file,
                sources: session.proxy_sources,
                validation: session.validation,
            },
            retry: RetrySection {
                policy: session.retry,
            },
            link: LinkSection {
                acquisition: session.acquisition,
            },
            logging: LoggingSection::default(),
        }
    }
}

impl ConfigFile {
    /// Load the configuration from the default location.
    ///
    /// A missing file (or missing config directory) yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the configuration from an explicit path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_ini(&ini)
    }

    /// Build the configuration from an already parsed INI document.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            let download = &mut config.download;
            if let Some(value) = section.get("chunk_size") {
                download.chunk_size = match parse_size(value)? {
                    0 => {
                        return Err(ConfigError::InvalidValue {
                            section: "download".to_string(),
                            key: "chunk_size".to_string(),
                            value: value.to_string(),
                        })
                    }
                    size => size,
                };
            }
            read_parsed(section, "download", "threads", &mut download.threads)?;
            if let Some(value) = section.get("work_dir") {
                download.work_dir = PathBuf::from(value);
            }
            read_secs(section, "download", "timeout", &mut download.timeout)?;
            read_bool(section, "download", "keep_parts", &mut download.keep_parts)?;
            read_bool(
                section,
                "download",
                "transfer_via_proxy",
                &mut download.transfer_via_proxy,
            )?;
        }

        if let Some(section) = ini.section(Some("proxy")) {
            let proxy = &mut config.proxy;
            read_bool(section, "proxy", "enabled", &mut proxy.enabled)?;
            if let Some(value) = section.get("file") {
                proxy.file = PathBuf::from(value);
            }
            if let Some(value) = section.get("sources") {
                proxy.sources = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            read_parsed(section, "proxy", "quota", &mut proxy.validation.quota)?;
            read_parsed(
                section,
                "proxy",
                "max_in_flight",
                &mut proxy.validation.max_in_flight,
            )?;
            if let Some(value) = section.get("probe_url") {
                proxy.validation.probe_endpoint = value.to_string();
            }
            read_secs(
                section,
                "proxy",
                "probe_timeout",
                &mut proxy.validation.probe_timeout,
            )?;
        }

        if let Some(section) = ini.section(Some("retry")) {
            let policy = &mut config.retry.policy;
            read_parsed(section, "retry", "max_attempts", &mut policy.max_attempts)?;
            read_secs(
                section,
                "retry",
                "rate_limit_delay",
                &mut policy.rate_limit_delay,
            )?;
            read_secs(
                section,
                "retry",
                "transient_delay",
                &mut policy.transient_delay,
            )?;
        }

        if let Some(section) = ini.section(Some("link")) {
            let acquisition = &mut config.link.acquisition;
            read_secs(section, "link", "wait_ceiling", &mut acquisition.wait_ceiling)?;
            read_parsed(
                section,
                "link",
                "max_challenge_attempts",
                &mut acquisition.max_challenge_attempts,
            )?;
        }

        if let Some(section) = ini.section(Some("logging")) {
            config.logging.directory = section.get("directory").map(PathBuf::from);
            config.logging.level = section.get("level").map(String::from);
        }

        Ok(config)
    }

    /// Translate the file into a session configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_chunk_size(self.download.chunk_size)
            .with_concurrency(self.download.threads)
            .with_work_dir(self.download.work_dir.clone())
            .with_request_timeout(self.download.timeout)
            .with_keep_parts(self.download.keep_parts)
            .with_transfer_via_bound_path(self.download.transfer_via_proxy)
            .with_proxies(self.proxy.enabled)
            .with_proxy_file(self.proxy.file.clone())
            .with_proxy_sources(self.proxy.sources.clone())
            .with_validation(self.proxy.validation.clone())
            .with_retry(self.retry.policy.clone())
            .with_acquisition(self.link.acquisition.clone())
    }
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn read_parsed<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = props.get(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| invalid(section, key, value))?;
    }
    Ok(())
}

fn read_secs(
    props: &Properties,
    section: &str,
    key: &str,
    target: &mut Duration,
) -> Result<(), ConfigError> {
    let mut secs = target.as_secs();
    read_parsed(props, section, key, &mut secs)?;
    *target = Duration::from_secs(secs);
    Ok(())
}

fn read_bool(
    props: &Properties,
    section: &str,
    key: &str,
    target: &mut bool,
) -> Result<(), ConfigError> {
    if let Some(value) = props.get(key) {
        *target = match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => return Err(invalid(section, key, value)),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();

        assert_eq!(config.download.chunk_size, 20 * 1024 * 1024);
        assert_eq!(config.download.threads, 5);
        assert!(config.proxy.enabled);
        assert_eq!(config.retry.policy.max_attempts, 5);
        assert_eq!(config.link.acquisition.wait_ceiling, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_are_applied() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[download]\n\
             chunk_size = 8MB\n\
             threads = 4\n\
             keep_parts = yes\n\
             [proxy]\n\
             enabled = false\n\
             quota = 10\n\
             sources = https://one.example/list, https://two.example/list\n\
             [retry]\n\
             max_attempts = 3\n\
             rate_limit_delay = 7\n\
             [link]\n\
             wait_ceiling = 90\n\
             max_challenge_attempts = 2\n\
             [logging]\n\
             level = debug\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.download.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.download.threads, 4);
        assert!(config.download.keep_parts);
        assert!(!config.proxy.enabled);
        assert_eq!(config.proxy.validation.quota, 10);
        assert_eq!(config.proxy.sources.len(), 2);
        assert_eq!(config.retry.policy.max_attempts, 3);
        assert_eq!(config.retry.policy.rate_limit_delay, Duration::from_secs(7));
        assert_eq!(config.link.acquisition.wait_ceiling, Duration::from_secs(90));
        assert_eq!(config.link.acquisition.max_challenge_attempts, 2);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));

        let session = config.to_session_config();
        assert_eq!(session.concurrency, 4);
        assert!(!session.use_proxies);
        assert_eq!(session.retry.max_attempts, 3);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let ini = Ini::load_from_str("[download]\nthreads = many\n").unwrap();
        let err = ConfigFile::from_ini(&ini).unwrap_err();

        match err {
            ConfigError::InvalidValue { section, key, value } => {
                assert_eq!(section, "download");
                assert_eq!(key, "threads");
                assert_eq!(value, "many");
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let ini = Ini::load_from_str("[download]\nchunk_size = 0MB\n").unwrap();

        match ConfigFile::from_ini(&ini).unwrap_err() {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "chunk_size");
                assert_eq!(value, "0MB");
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_bool_is_reported() {
        let ini = Ini::load_from_str("[proxy]\nenabled = maybe\n").unwrap();
        assert!(matches!(
            ConfigFile::from_ini(&ini),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
