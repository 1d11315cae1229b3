use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Deserializer, de};
use url::Url;

/// What a scenario navigates to: an absolute URL, or a local path that is
/// turned into a `file://` URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Windows drive letters parse as a one-letter scheme without a host.
        match Url::parse(s) {
            Ok(url) if url.has_host() || url.scheme() == "file" => {
                return Ok(Target { url });
            }
            _ => {}
        }
        let path = std::path::absolute(s)
            .with_context(|| format!("invalid path {}", s))?;
        let url = Url::from_file_path(&path).map_err(|()| {
            anyhow!("cannot turn {} into a URL", path.display())
        })?;
        Ok(Target { url })
    }
}

/// Reads a URL the way the command line reads a target, so scenario files
/// may name a page by a path relative to the working directory.
pub fn deserialize_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<Target>()
        .map(|target| target.url)
        .map_err(|error| de::Error::custom(format!("{:#}", error)))
}
