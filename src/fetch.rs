use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    config::ImporterConfig,
    error::{ImportError, Result},
};

/// Existing files are used as-is; `http(s)` URLs are downloaded to the temp dir.
pub fn resolve_source(location: &str, config: &ImporterConfig) -> Result<PathBuf> {
    let path = Path::new(location);
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !is_url(location) {
        return Err(ImportError::SourceNotFound {
            location: location.to_string(),
        });
    }
    download(location, config)
}

pub fn is_url(location: &str) -> bool {
    let lowered = location.to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// The proxy to use for `url`, if any.
pub fn effective_proxy<'a>(url: &str, config: &'a ImporterConfig) -> Option<&'a str> {
    let proxy = config.proxy.as_deref().filter(|p| !p.trim().is_empty())?;
    if config
        .proxy_exceptions
        .iter()
        .any(|exception| !exception.is_empty() && url.contains(exception.as_str()))
    {
        None
    } else {
        Some(proxy)
    }
}

/// File name for a downloaded URL: its last path segment, without query.
pub fn download_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let path = after_scheme
        .split_once('/')
        .map(|(_, path)| path)
        .unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("source")
        .to_string()
}

fn download(url: &str, config: &ImporterConfig) -> Result<PathBuf> {
    let not_found = || ImportError::SourceNotFound {
        location: url.to_string(),
    };

    let mut builder = reqwest::blocking::Client::builder();
    match effective_proxy(url, config) {
        Some(proxy) => {
            debug!("Downloading {url} through proxy {proxy}");
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| ImportError::Config(format!("invalid proxy '{proxy}': {err}")))?;
            builder = builder.proxy(proxy);
        }
        None if config.proxy.is_some() => {
            debug!("Proxy disabled for {url} by exception list");
            builder = builder.no_proxy();
        }
        None => {}
    }
    if let Some(agent) = config.user_agent.as_deref().filter(|a| !a.is_empty()) {
        builder = builder.user_agent(agent.to_string());
    }
    let client = builder
        .build()
        .map_err(|err| ImportError::Config(format!("building HTTP client: {err}")))?;

    let response = client.get(url).send().map_err(|err| {
        debug!("Download of {url} failed: {err}");
        not_found()
    })?;
    if !response.status().is_success() {
        debug!("Download of {url} returned {}", response.status());
        return Err(not_found());
    }
    let body = response.bytes().map_err(|_| not_found())?;

    let destination = std::env::temp_dir().join(download_file_name(url));
    fs::write(&destination, &body).map_err(|err| ImportError::SourceFormat {
        file: download_file_name(url),
        reason: format!("writing download to {destination:?}: {err}"),
    })?;
    info!("Downloaded {} byte(s) from {url} to {:?}", body.len(), destination);
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_proxy() -> ImporterConfig {
        let mut config = ImporterConfig::new("db.sqlite", "t");
        config.proxy = Some("http://proxy.local:3128".to_string());
        config.proxy_exceptions = vec!["intranet.example".to_string()];
        config
    }

    #[test]
    fn existing_file_is_used_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "a\n1\n").unwrap();
        let config = ImporterConfig::new("db.sqlite", "t");
        let resolved = resolve_source(path.to_str().unwrap(), &config).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn missing_local_path_is_not_found() {
        let config = ImporterConfig::new("db.sqlite", "t");
        let err = resolve_source("/no/such/file.csv", &config).unwrap_err();
        assert!(matches!(err, ImportError::SourceNotFound { .. }));
        assert_eq!(err.to_string(), "Source data not found at /no/such/file.csv");
    }

    #[test]
    fn proxy_exceptions_disable_proxy() {
        let config = config_with_proxy();
        assert_eq!(
            effective_proxy("https://data.example/file.csv", &config),
            Some("http://proxy.local:3128")
        );
        assert_eq!(
            effective_proxy("https://intranet.example/file.csv", &config),
            None
        );
        assert_eq!(
            effective_proxy("https://x", &ImporterConfig::new("d", "t")),
            None
        );
    }

    #[test]
    fn download_names_come_from_last_segment() {
        assert_eq!(
            download_file_name("https://host/path/report.xlsx?token=1"),
            "report.xlsx"
        );
        assert_eq!(download_file_name("https://host/"), "source");
        assert!(is_url("HTTPS://host/a.csv"));
        assert!(!is_url("/tmp/a.csv"));
    }
}
