//! Verification entry points.
//!
//! A check runs the validity checker (unless disabled) and then every
//! property of the domain. Failed properties are part of the verdict; only
//! ingestion problems and plug-in contract violations are errors.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CheckConfig;
use crate::domain::{Domain, DomainTrace};
use crate::error::{CheckError, IngestError, PluginError};
use crate::property::{safety_holds, PropertyResult};
use crate::validity::{is_valid_execution, ExecutionValidity};

/// Everything learned about one trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceVerdict {
    pub domain: &'static str,
    pub entries_count: usize,
    /// `None` when the validity check was disabled.
    pub validity: Option<ExecutionValidity>,
    pub results: Vec<PropertyResult>,
}

impl TraceVerdict {
    /// Whether the trace is consistent with the step model (or unchecked).
    #[must_use]
    pub fn valid(&self) -> bool {
        self.validity.as_ref().map_or(true, |v| v.valid)
    }

    /// Conjunction of the safety properties.
    #[must_use]
    pub fn safe(&self) -> bool {
        safety_holds(&self.results)
    }

    /// Valid and every property holds.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.valid() && self.results.iter().all(|r| r.holds)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PropertyResult> {
        self.results.iter().filter(|r| !r.holds)
    }

    /// Result for the property called `name`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Tag every counterexample with the seed that generated the trace.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        for result in &mut self.results {
            result.counterexample = result.counterexample.take().map(|ce| ce.with_seed(seed));
        }
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary with the first failure's diagram.
    #[must_use]
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("Trace Verdict ({})\n", self.domain));
        report.push_str("====================\n\n");

        match &self.validity {
            Some(v) if v.valid => report.push_str("[PASS] ValidExecution\n"),
            Some(v) => report.push_str(&format!(
                "[FAIL] ValidExecution: entry {} is unreachable from entry {}\n",
                v.first_violation.unwrap_or_default(),
                v.first_violation.unwrap_or_default().saturating_sub(1)
            )),
            None => report.push_str("[SKIP] ValidExecution\n"),
        }

        for result in &self.results {
            report.push_str(&result.format_status());
            report.push('\n');
        }

        report.push_str(&format!(
            "\nTotal: {} passed, {} failed ({} entries)\n",
            self.results.iter().filter(|r| r.holds).count(),
            self.failures().count(),
            self.entries_count
        ));

        if let Some(failure) = self.failures().next() {
            report.push_str(&format!("\nFirst failure: {}\n", failure.name));
            if let Some(ref ce) = failure.counterexample {
                report.push_str("\nCounterexample:\n");
                report.push_str(&ce.render_diagram());
            }
        }

        report
    }
}

/// Check `trace` against domain `D`.
pub fn check<D: Domain>(trace: &DomainTrace<D>, config: &CheckConfig) -> Result<TraceVerdict, CheckError> {
    if trace.len() > config.max_entries {
        return Err(IngestError::TooLong {
            count: trace.len(),
            max: config.max_entries,
        }
        .into());
    }

    let validity = if config.check_validity {
        let model = D::model_for(trace);
        Some(is_valid_execution(trace, &model).map_err(|e| contract_violation(D::ID, e))?)
    } else {
        None
    };

    let results = D::check_properties(trace, config).map_err(|e| contract_violation(D::ID, e))?;
    for result in &results {
        debug!(
            domain = D::ID,
            property = result.name,
            holds = result.holds,
            "property evaluated"
        );
    }

    let verdict = TraceVerdict {
        domain: D::ID,
        entries_count: trace.len(),
        validity,
        results,
    };
    info!(
        domain = D::ID,
        entries = verdict.entries_count,
        valid = verdict.valid(),
        passed = verdict.results.iter().filter(|r| r.holds).count(),
        failed = verdict.failures().count(),
        "trace checked"
    );
    Ok(verdict)
}

/// Conjunction of the safety properties of `D` on `trace`.
pub fn safe<D: Domain>(trace: &DomainTrace<D>) -> Result<bool, PluginError> {
    let results = D::check_properties(trace, &CheckConfig::default())
        .map_err(|e| contract_violation(D::ID, e))?;
    Ok(safety_holds(&results))
}

fn contract_violation(domain: &'static str, error: PluginError) -> PluginError {
    warn!(domain, error = %error, "plug-in contract violation");
    error
}
