//! Domain registry.
//!
//! Maps a domain identifier to the monomorphized entry points of one
//! [`Domain`]: its step model (through the validity checker) and its property
//! library, so callers holding only a domain name and NDJSON text can reach
//! either. Adding a domain means implementing [`Domain`] and calling
//! [`Registry::register`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::warn;

use crate::codec::from_ndjson;
use crate::config::CheckConfig;
use crate::domain::Domain;
use crate::domains::{BoundedQueue, LruCache, RateLimiter};
use crate::engine::{check, TraceVerdict};
use crate::error::{CheckError, IngestError};
use crate::property::PropertyResult;
use crate::validity::{is_valid_execution, ExecutionValidity};

/// Type-erased entry points of one registered domain.
#[derive(Clone, Copy)]
struct DomainEntry {
    /// Step model applied to every transition of a decoded trace.
    validate: fn(&str, &CheckConfig) -> Result<ExecutionValidity, CheckError>,
    /// Property library evaluated on a decoded trace.
    properties: fn(&str, &CheckConfig) -> Result<Vec<PropertyResult>, CheckError>,
    check: fn(&str, &CheckConfig) -> Result<TraceVerdict, CheckError>,
}

impl DomainEntry {
    fn of<D: Domain>() -> Self {
        Self {
            validate: validate_text::<D>,
            properties: properties_text::<D>,
            check: check_text::<D>,
        }
    }
}

/// Table of known domains.
#[derive(Clone, Default)]
pub struct Registry {
    domains: BTreeMap<&'static str, DomainEntry>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.domains.keys()).finish()
    }
}

impl Registry {
    /// Registry with no domains.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the bounded queue, LRU cache and rate limiter.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register::<BoundedQueue>()
            .register::<LruCache>()
            .register::<RateLimiter>();
        registry
    }

    /// Shared registry of the built-in domains.
    pub fn builtin() -> &'static Registry {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(Registry::with_builtin)
    }

    /// Add `D` under `D::ID`, replacing any previous entry.
    pub fn register<D: Domain>(&mut self) -> &mut Self {
        self.domains.insert(D::ID, DomainEntry::of::<D>());
        self
    }

    #[must_use]
    pub fn contains(&self, domain_id: &str) -> bool {
        self.domains.contains_key(domain_id)
    }

    /// Registered identifiers, sorted.
    pub fn domain_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.domains.keys().copied()
    }

    /// Decode `ndjson` as a trace of `domain_id` and check it.
    pub fn check(
        &self,
        domain_id: &str,
        ndjson: &str,
        config: &CheckConfig,
    ) -> Result<TraceVerdict, CheckError> {
        (self.entry(domain_id)?.check)(ndjson, config)
    }

    /// Decode `ndjson` and run only the step model's validity check.
    pub fn validate(
        &self,
        domain_id: &str,
        ndjson: &str,
        config: &CheckConfig,
    ) -> Result<ExecutionValidity, CheckError> {
        (self.entry(domain_id)?.validate)(ndjson, config)
    }

    /// Decode `ndjson` and evaluate only the property library.
    pub fn properties(
        &self,
        domain_id: &str,
        ndjson: &str,
        config: &CheckConfig,
    ) -> Result<Vec<PropertyResult>, CheckError> {
        (self.entry(domain_id)?.properties)(ndjson, config)
    }

    fn entry(&self, domain_id: &str) -> Result<&DomainEntry, CheckError> {
        self.domains.get(domain_id).ok_or_else(|| {
            warn!(domain = domain_id, "unknown domain");
            IngestError::UnknownDomain(domain_id.to_string()).into()
        })
    }
}

fn validate_text<D: Domain>(ndjson: &str, config: &CheckConfig) -> Result<ExecutionValidity, CheckError> {
    let trace = from_ndjson::<D>(ndjson, config.max_entries)?;
    Ok(is_valid_execution(&trace, &D::model_for(&trace))?)
}

fn properties_text<D: Domain>(
    ndjson: &str,
    config: &CheckConfig,
) -> Result<Vec<PropertyResult>, CheckError> {
    let trace = from_ndjson::<D>(ndjson, config.max_entries)?;
    Ok(D::check_properties(&trace, config)?)
}

fn check_text<D: Domain>(ndjson: &str, config: &CheckConfig) -> Result<TraceVerdict, CheckError> {
    let trace = from_ndjson::<D>(ndjson, config.max_entries)?;
    check::<D>(&trace, config)
}
