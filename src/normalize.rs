//! Hit normalization - query trimming, URL renames, subnet masking
//!
//! Rules are compiled once from configuration at startup; applying them is
//! a total function over any Hit, so the ingestion path has no failure
//! mode here.

use crate::config::NormalizeConfig;
use crate::error::TailgateError;
use crate::hit::Hit;
use once_cell::sync::Lazy;
use regex::Regex;

/// Dotted-quad IPv4 at the start of the client field. Deliberately not
/// anchored at the end: `re.match` semantics, so `1.2.3.4:8080` still
/// masks, while an already-masked `1.2.3.*` no longer matches.
#[allow(clippy::expect_used)]
static IPV4_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+").expect("ipv4 pattern is valid"));

/// One ordered URL substitution rule
#[derive(Debug, Clone)]
pub struct UrlRename {
    pattern: Regex,
    replacement: String,
}

impl UrlRename {
    /// Compile a rename rule. A bad pattern is a configuration error.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, TailgateError> {
        let compiled = Regex::new(pattern).map_err(|source| TailgateError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }
}

/// Compiled normalization rule set, shared by all workers that use it
#[derive(Debug, Clone)]
pub struct NormalizeRules {
    pub trim_query_strings: bool,
    pub ips_as_subnets: bool,
    pub url_renames: Vec<UrlRename>,
    pub keep_status_and_size: bool,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            trim_query_strings: true,
            ips_as_subnets: true,
            url_renames: Vec::new(),
            keep_status_and_size: true,
        }
    }
}

impl NormalizeRules {
    /// Compile rules from their configuration form.
    pub fn compile(config: &NormalizeConfig) -> Result<Self, TailgateError> {
        let url_renames = config
            .url_renames
            .iter()
            .map(|rule| UrlRename::new(&rule.pattern, &rule.replacement))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trim_query_strings: config.trim_query_strings,
            ips_as_subnets: config.ips_as_subnets,
            url_renames,
            keep_status_and_size: config.keep_status_and_size,
        })
    }

    /// Apply every enabled step to a parsed hit.
    ///
    /// Steps run in a fixed order: query trim, then the rename chain (each
    /// rule's output feeding the next), then subnet masking, then optional
    /// status/size stripping. Normalizing an already-normalized hit with
    /// the same rules is a no-op.
    pub fn normalize(&self, mut hit: Hit) -> Hit {
        if self.trim_query_strings
            && let Some(idx) = hit.url.find('?')
        {
            hit.url.truncate(idx);
        }

        for rename in &self.url_renames {
            hit.url = rename
                .pattern
                .replace_all(&hit.url, rename.replacement.as_str())
                .into_owned();
        }

        if self.ips_as_subnets
            && IPV4_PREFIX.is_match(&hit.client)
            && let Some(dot) = hit.client.rfind('.')
        {
            hit.client.truncate(dot);
            hit.client.push_str(".*");
        }

        if !self.keep_status_and_size {
            hit.status = None;
            hit.size = None;
        }

        hit
    }
}
