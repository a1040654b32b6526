//! Environment-driven tunables for the template engine.
//!
//! This module derives engine limits from the host process environment while
//! remaining embedder-agnostic: every limit has a production default, and an
//! unset or unparsable variable falls back to it rather than failing engine
//! construction.

use std::collections::HashMap;
use std::env;

/// Environment variable capping the number of conditions per template.
const ENV_MAX_CONDITIONS: &str = "RC_ENGINE_MAX_CONDITIONS";
/// Environment variable capping the number of parameters per template
/// (top-level and grouped combined).
const ENV_MAX_PARAMETERS: &str = "RC_ENGINE_MAX_PARAMETERS";
/// Environment variable capping version description length, in characters.
const ENV_MAX_DESCRIPTION_LENGTH: &str = "RC_ENGINE_MAX_DESCRIPTION_LENGTH";
/// Environment variable setting how many published versions are retained.
const ENV_VERSION_RETENTION: &str = "RC_ENGINE_VERSION_RETENTION";
/// Environment variable setting the default version-history page size.
const ENV_DEFAULT_PAGE_SIZE: &str = "RC_ENGINE_DEFAULT_PAGE_SIZE";
/// Environment variable setting the maximum version-history page size.
const ENV_MAX_PAGE_SIZE: &str = "RC_ENGINE_MAX_PAGE_SIZE";

/// Default cap on conditions per template.
const DEFAULT_MAX_CONDITIONS: usize = 500;
/// Default cap on parameters per template.
const DEFAULT_MAX_PARAMETERS: usize = 2000;
/// Default cap on version description length.
const DEFAULT_MAX_DESCRIPTION_LENGTH: usize = 500;
/// Default number of retained versions; older ones are pruned on publish.
const DEFAULT_VERSION_RETENTION: usize = 300;
/// Default page size when a listing request does not specify one.
const DEFAULT_PAGE_SIZE: usize = 10;
/// Largest page size a listing request may ask for; bigger requests clamp.
const DEFAULT_MAX_PAGE_SIZE: usize = 300;

/// Tunable limits applied by validation, the version store, and history
/// listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum number of conditions a template may declare.
    pub max_conditions: usize,
    /// Maximum number of parameters (top-level plus grouped).
    pub max_parameters: usize,
    /// Maximum version description length, in characters.
    pub max_description_length: usize,
    /// Number of published versions retained in the store.
    pub version_retention: usize,
    /// Page size used when a listing request does not specify one.
    pub default_page_size: usize,
    /// Upper bound on the page size; larger requests are clamped.
    pub max_page_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_conditions: DEFAULT_MAX_CONDITIONS,
            max_parameters: DEFAULT_MAX_PARAMETERS,
            max_description_length: DEFAULT_MAX_DESCRIPTION_LENGTH,
            version_retention: DEFAULT_VERSION_RETENTION,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl EngineLimits {
    /// Builds limits from the current process environment.
    ///
    /// Side-effect free apart from reading `std::env::vars`.
    pub fn from_os_env() -> Self {
        Self::from_env_iter(env::vars())
    }

    /// Builds limits from an iterator of key/value pairs (typically for
    /// tests).
    pub fn from_env_iter<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let defaults = Self::default();
        Self {
            max_conditions: parse_limit(map.get(ENV_MAX_CONDITIONS), defaults.max_conditions),
            max_parameters: parse_limit(map.get(ENV_MAX_PARAMETERS), defaults.max_parameters),
            max_description_length: parse_limit(
                map.get(ENV_MAX_DESCRIPTION_LENGTH),
                defaults.max_description_length,
            ),
            version_retention: parse_limit(
                map.get(ENV_VERSION_RETENTION),
                defaults.version_retention,
            ),
            default_page_size: parse_limit(
                map.get(ENV_DEFAULT_PAGE_SIZE),
                defaults.default_page_size,
            ),
            max_page_size: parse_limit(map.get(ENV_MAX_PAGE_SIZE), defaults.max_page_size),
        }
    }
}

/// Parses a positive integer limit, falling back to the default for unset,
/// empty, zero, or unparsable values.
fn parse_limit(raw: Option<&String>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&value| value > 0)
        .unwrap_or(default)
}
