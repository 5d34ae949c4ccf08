use std::fmt;

use lambda_http::tracing;
use url::Url;

use crate::error::ProxyError;

pub(crate) const API_KEY_VAR: &str = "AIRTABLE_API_KEY";
pub(crate) const BASE_ID_VAR: &str = "AIRTABLE_BASE_ID";
pub(crate) const API_URL_VAR: &str = "AIRTABLE_API_URL";

const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// Settings for one invocation, read from the function's environment.
#[derive(Clone)]
pub(crate) struct ProxyConfig {
    api_key: Option<String>,
    base_id: Option<String>,
    api_url: String,
}

/// Credentials that passed the presence check, ready to address tables.
pub(crate) struct Credentials<'a> {
    pub(crate) api_key: &'a str,
    base_url: Url,
}

pub(crate) const REDACTED: &str = "<redacted>";

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("base_id", &self.base_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &REDACTED)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ProxyConfig {
    #[cfg(test)]
    pub(crate) fn new(api_key: Option<&str>, base_id: Option<&str>) -> Self {
        Self::from_lookup(|key| match key {
            API_KEY_VAR => api_key.map(str::to_string),
            BASE_ID_VAR => base_id.map(str::to_string),
            _ => None,
        })
    }

    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values count as unset.
    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            api_key: non_empty(API_KEY_VAR),
            base_id: non_empty(BASE_ID_VAR),
            api_url: non_empty(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub(crate) fn credentials(&self) -> Result<Credentials<'_>, ProxyError> {
        tracing::debug!(
            api_key_present = self.api_key.is_some(),
            base_id_present = self.base_id.is_some(),
            base_id = self.base_id.as_deref().unwrap_or_default(),
            "checking credentials"
        );

        let (Some(api_key), Some(base_id)) = (self.api_key.as_deref(), self.base_id.as_deref())
        else {
            return Err(ProxyError::MissingCredentials);
        };

        let mut base_url = Url::parse(&self.api_url)?;
        base_url
            .path_segments_mut()
            .map_err(|_| ProxyError::InvalidApiUrl(self.api_url.clone()))?
            .pop_if_empty()
            .push(base_id);

        Ok(Credentials { api_key, base_url })
    }
}

impl Credentials<'_> {
    /// `<api root>/<base>/<table>[/<id>]`, each part encoded as one path segment.
    /// `.` and `..` are rejected since the url crate drops them instead of encoding.
    pub(crate) fn table_url(&self, table: &str, id: Option<&str>) -> Result<Url, ProxyError> {
        if std::iter::once(table)
            .chain(id)
            .any(|segment| segment == "." || segment == "..")
        {
            return Err(ProxyError::BadRequest("table and id cannot be '.' or '..'"));
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ProxyError::InvalidApiUrl(self.base_url.to_string()))?;
            segments.push(table);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}
