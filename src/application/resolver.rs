use crate::domain::ports::ViolationStore;
use crate::domain::reference::{
    alphanumeric_key, extract_reference, extract_violation_id, longest_common_substring,
};
use crate::domain::violation::{Violation, ViolationId};
use crate::error::{ReconError, Result};
use std::cmp::Reverse;
use tracing::{debug, warn};

/// Identifiers a caller supplied for a violation, as received.
#[derive(Debug, Clone, Default)]
pub struct ResolutionHints {
    pub violation_id: Option<String>,
    pub reference: Option<String>,
    pub driver_name: Option<String>,
}

impl ResolutionHints {
    fn violation_id(&self) -> Option<&str> {
        non_blank(self.violation_id.as_deref())
    }

    fn reference(&self) -> Option<&str> {
        non_blank(self.reference.as_deref())
    }

    fn driver_name(&self) -> Option<&str> {
        non_blank(self.driver_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One way of turning hints into a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Internal identifier extracted from the id hint.
    InternalId,
    /// Canonical reference number extracted from the reference hint.
    ExactReference,
    /// Open violations of the named driver, ranked by reference similarity
    /// and then recency.
    DriverNameFuzzy,
}

/// Precedence contract: id, then exact reference, then fuzzy name match.
pub const DEFAULT_STRATEGIES: [Strategy; 3] = [
    Strategy::InternalId,
    Strategy::ExactReference,
    Strategy::DriverNameFuzzy,
];

/// Store lookup derived from hints by a single strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Id(ViolationId),
    Reference(String),
    Driver { name: String, reference_key: String },
}

impl Strategy {
    /// Pure step: what this strategy would look up, if anything.
    pub fn lookup_key(self, hints: &ResolutionHints) -> Option<LookupKey> {
        match self {
            Strategy::InternalId => hints
                .violation_id()
                .and_then(extract_violation_id)
                .map(LookupKey::Id),
            Strategy::ExactReference => hints
                .reference()
                .and_then(extract_reference)
                .map(LookupKey::Reference),
            // Ranking needs a partial reference; a name alone never picks a violation.
            Strategy::DriverNameFuzzy => {
                let reference_key = alphanumeric_key(hints.reference()?);
                if reference_key.is_empty() {
                    return None;
                }
                hints.driver_name().map(|name| LookupKey::Driver {
                    name: name.to_string(),
                    reference_key,
                })
            }
        }
    }
}

/// A resolved violation and the strategy that found it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub violation: Violation,
    pub strategy: Strategy,
}

/// Resolves noisy client identifiers to exactly one violation.
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    strategies: Vec<Strategy>,
}

impl Default for IdentifierResolver {
    fn default() -> Self {
        Self {
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }
}

impl IdentifierResolver {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Runs the strategies in order; the first hit wins.
    ///
    /// Returns `NotFound` listing what was attempted. Driver names never appear
    /// in that list.
    pub async fn resolve<S>(&self, store: &S, hints: &ResolutionHints) -> Result<Resolution>
    where
        S: ViolationStore + ?Sized,
    {
        if hints.violation_id().is_none() && hints.reference().is_none() {
            return Err(ReconError::ValidationError(
                "a violation id or reference number is required".to_string(),
            ));
        }

        let mut attempted = Vec::new();
        if hints.violation_id().is_some()
            && Strategy::InternalId.lookup_key(hints).is_none()
            && self.strategies.contains(&Strategy::InternalId)
        {
            attempted.push("violation_id=<unparseable>".to_string());
        }

        for &strategy in &self.strategies {
            let Some(key) = strategy.lookup_key(hints) else {
                continue;
            };

            let found = match &key {
                LookupKey::Id(id) => {
                    attempted.push(format!("violation_id={id}"));
                    store.get_violation(*id).await?
                }
                LookupKey::Reference(reference) => {
                    attempted.push(format!("reference={reference}"));
                    store.find_violation_by_reference(reference).await?
                }
                LookupKey::Driver {
                    name,
                    reference_key,
                } => {
                    attempted.push("driver_name=<redacted>".to_string());
                    let candidates = store.find_open_violations_by_driver(name).await?;
                    best_fuzzy_match(candidates, reference_key)
                }
            };

            if let Some(violation) = found {
                match strategy {
                    Strategy::InternalId => log_reference_mismatch(&violation, hints),
                    Strategy::DriverNameFuzzy => warn!(
                        violation_id = %violation.id,
                        reference = %violation.reference,
                        "violation resolved by fuzzy driver-name match"
                    ),
                    Strategy::ExactReference => {}
                }
                debug!(violation_id = %violation.id, ?strategy, "violation resolved");
                return Ok(Resolution {
                    violation,
                    strategy,
                });
            }
        }

        Err(ReconError::NotFound {
            attempted: if attempted.is_empty() {
                "no usable identifier".to_string()
            } else {
                attempted.join(", ")
            },
        })
    }
}

/// Highest reference overlap first, then most recently created.
fn best_fuzzy_match(mut candidates: Vec<Violation>, reference_key: &str) -> Option<Violation> {
    candidates.retain(|v| v.status.is_open());
    candidates.sort_by_cached_key(|v| {
        let score = longest_common_substring(reference_key, &alphanumeric_key(&v.reference));
        (Reverse(score), Reverse(v.created_at), v.reference.clone())
    });
    candidates.into_iter().next()
}

/// The id is authoritative; a disagreeing reference is only recorded.
fn log_reference_mismatch(violation: &Violation, hints: &ResolutionHints) {
    let Some(supplied) = hints.reference() else {
        return;
    };
    let matches = match extract_reference(supplied) {
        Some(canonical) => canonical.eq_ignore_ascii_case(&violation.reference),
        None => alphanumeric_key(supplied) == alphanumeric_key(&violation.reference),
    };
    if !matches {
        warn!(
            violation_id = %violation.id,
            stored_reference = %violation.reference,
            supplied_reference = %supplied,
            "reference does not match violation resolved by id; trusting id"
        );
    }
}
