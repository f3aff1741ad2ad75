//! The compatibility engine pipeline.
//!
//! One request flows: resolved input -> slot construction -> candidate
//! generation -> per-configuration junction evaluation (parallel tasks)
//! -> analyzer rollup -> decision routing -> optional subset search ->
//! normalization -> result envelope. Discovery queries branch off after
//! slot inspection and search the category instead of generating.
//!
//! The engine owns no mutable state: it takes one immutable catalog
//! snapshot per request, so evaluation needs no locks and the same input
//! always produces the same envelope.

pub mod analyzer;
pub mod decision;
pub mod discovery;
pub mod envelope;
pub mod generator;
pub mod input;
pub mod junction;
pub mod normalizer;

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogAccessor, CatalogSnapshot, Device};
use crate::category::resolve_category;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

use analyzer::{evaluate_configuration, subset_search, summarize, ConfigurationResult};
use decision::{is_discovery_query, route, Framing, Outcome, RoutedAction};
use envelope::{degraded_confidence, ResultEnvelope, ResultType, Status};
use generator::{generate, slot_labels, ConfigurationSlot};
use input::{EngineInput, QueryMode};
use normalizer::normalize;

// ============================================================================
// Engine
// ============================================================================

pub struct CompatibilityEngine {
    config: EngineConfig,
    cancel: CancellationToken,
}

impl CompatibilityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(config: EngineConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Evaluate one request against one catalog snapshot.
    ///
    /// Input-validation and invariant errors come back as `Err`; every
    /// data-level problem is captured inside the envelope as failure
    /// codes, clarification status, or exclusion notes.
    pub async fn run(
        &self,
        input: &EngineInput,
        catalog: &dyn CatalogAccessor,
    ) -> EngineResult<ResultEnvelope> {
        let snapshot = catalog.snapshot().await?;
        info!(
            devices = input.devices.len(),
            categories = input.categories.len(),
            generics = input.generic_specs.len(),
            catalog = snapshot.len(),
            "engine request"
        );

        if self.cancel.is_cancelled() {
            warn!("request cancelled before generation");
            return Ok(ResultEnvelope::empty(
                Status::Error,
                self.result_type(input),
                "cancelled before generation",
            ));
        }

        if is_discovery_query(input) {
            return self.run_discovery(input, &snapshot).await;
        }
        self.run_generation(input, &snapshot).await
    }

    fn result_type(&self, input: &EngineInput) -> ResultType {
        if is_discovery_query(input) {
            ResultType::DeviceDiscovery
        } else if input.classification.mode == QueryMode::StackValidation {
            ResultType::StackValidation
        } else {
            ResultType::CompatibilityCheck
        }
    }

    fn check_length(&self, input: &EngineInput) -> bool {
        input.check_length.unwrap_or(self.config.check_length_default)
    }

    // ------------------------------------------------------------------
    // Slot construction
    // ------------------------------------------------------------------

    /// Resolve catalog ids for the named devices. Several ids behind one
    /// display name expand branch-wise, exactly like a small category.
    fn resolved_device_slots(
        &self,
        input: &EngineInput,
        snapshot: &CatalogSnapshot,
    ) -> EngineResult<Vec<ConfigurationSlot>> {
        let mut slots = Vec::new();
        for (name, device_ref) in &input.devices {
            if device_ref.catalog_ids.is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "device '{name}' resolved to no catalog ids"
                )));
            }
            let mut members = device_ref
                .catalog_ids
                .iter()
                .map(|id| {
                    snapshot.get(id).ok_or_else(|| {
                        EngineError::InvalidInput(format!(
                            "unknown catalog id '{id}' for device '{name}'"
                        ))
                    })
                })
                .collect::<EngineResult<Vec<Arc<Device>>>>()?;
            slots.push(if members.len() == 1 {
                ConfigurationSlot::Fixed(members.remove(0))
            } else {
                ConfigurationSlot::Branch {
                    label: name.clone(),
                    members,
                }
            });
        }
        Ok(slots)
    }

    fn build_slots(
        &self,
        input: &EngineInput,
        snapshot: &CatalogSnapshot,
    ) -> EngineResult<Vec<ConfigurationSlot>> {
        let mut slots = self.resolved_device_slots(input, snapshot)?;

        for token in &input.categories {
            slots.push(ConfigurationSlot::Branch {
                label: token.clone(),
                members: resolve_category(token, snapshot)?,
            });
        }

        for (i, spec) in input.generic_specs.iter().enumerate() {
            let level = spec.conical_level.ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "generic specification {} carries no conical level",
                    i + 1
                ))
            })?;
            slots.push(ConfigurationSlot::Fixed(Arc::new(spec.synthesize(i, level))));
        }

        // A prior filtering step's device list behaves as one category
        // slot with pre-resolved members.
        if !input.prior_device_ids.is_empty() {
            let members = input
                .prior_device_ids
                .iter()
                .map(|id| {
                    snapshot.get(id).ok_or_else(|| {
                        EngineError::InvalidInput(format!(
                            "unknown catalog id '{id}' in prior results"
                        ))
                    })
                })
                .collect::<EngineResult<Vec<Arc<Device>>>>()?;
            slots.push(ConfigurationSlot::Branch {
                label: "prior-results".to_string(),
                members,
            });
        }

        Ok(slots)
    }

    // ------------------------------------------------------------------
    // Generation path
    // ------------------------------------------------------------------

    async fn run_generation(
        &self,
        input: &EngineInput,
        snapshot: &CatalogSnapshot,
    ) -> EngineResult<ResultEnvelope> {
        let result_type = self.result_type(input);
        let slots = match self.build_slots(input, snapshot) {
            Ok(slots) => slots,
            Err(EngineError::UnknownCategory(token)) => {
                // Data error, not input validation: the caller narrows or
                // rephrases instead of failing hard.
                return Ok(ResultEnvelope::empty(
                    Status::NeedsClarification,
                    result_type,
                    format!("no catalog devices match category '{token}'"),
                ));
            }
            Err(e) => return Err(e),
        };

        let check_length = self.check_length(input);
        let generated = generate(&slots, self.config.max_candidates)?;
        let placed = slot_labels(&slots);
        debug!(
            candidates = generated.configurations.len(),
            truncated = generated.truncated,
            "generation finished"
        );

        // One task per candidate; junction evaluation is pure, the
        // snapshot is immutable, so tasks share nothing mutable.
        let tasks: Vec<_> = generated
            .configurations
            .iter()
            .cloned()
            .map(|configuration| {
                let config = self.config.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(evaluate_configuration(&configuration, check_length, &config))
                })
            })
            .collect();

        let mut results: Vec<ConfigurationResult> = Vec::with_capacity(tasks.len());
        for joined in join_all(tasks).await {
            let result = joined
                .map_err(|e| EngineError::InvariantViolation(format!("evaluation task failed: {e}")))?;
            match result {
                Some(r) => results.push(r),
                None => {
                    warn!("request cancelled during evaluation");
                    return Ok(ResultEnvelope::empty(
                        Status::Error,
                        result_type,
                        "cancelled during evaluation",
                    ));
                }
            }
        }

        let summary = summarize(&results);
        let outcome = Outcome::from_summary(&summary);
        let framing = Framing::from_classification(&input.classification);
        let action = route(outcome, slots.len(), framing)?;
        info!(
            outcome = outcome.as_str(),
            framing = framing.as_str(),
            ?action,
            passing = summary.passing,
            failing = summary.failing,
            "decision routed"
        );

        if action == RoutedAction::RunSubsetSearch {
            for result in results.iter_mut().filter(|r| !r.passed) {
                let configuration = &generated.configurations[result.index];
                if configuration.devices.len() >= 3 {
                    let outcome = subset_search(configuration, result, check_length, &self.config);
                    result.subset = Some(outcome);
                }
            }
        }

        let normalized = normalize(&results, &placed, &generated.excluded_labels)?;
        let warnings_present = results.iter().any(|r| r.warning);
        let status = if generated.truncated {
            Status::Partial
        } else {
            Status::Complete
        };
        let note = generated.truncated.then(|| {
            format!(
                "{} candidate configurations dropped past the cap of {}",
                generated.dropped_candidates, self.config.max_candidates
            )
        });

        Ok(ResultEnvelope {
            status,
            result_type,
            configurations: results,
            discovery: None,
            discovery_category: None,
            candidates_considered: 0,
            confidence: degraded_confidence(
                input.classification.confidence,
                generated.truncated,
                warnings_present,
                &self.config,
            ),
            action: Some(action),
            gentle_correction: action == RoutedAction::FlagGentleCorrection,
            dropped_candidates: generated.dropped_candidates,
            unreachable: normalized.unreachable,
            warnings_present,
            records: normalized.records,
            summary,
            note,
        })
    }

    // ------------------------------------------------------------------
    // Discovery path
    // ------------------------------------------------------------------

    async fn run_discovery(
        &self,
        input: &EngineInput,
        snapshot: &CatalogSnapshot,
    ) -> EngineResult<ResultEnvelope> {
        let category = &input.categories[0];

        let mut anchors: Vec<Arc<Device>> = Vec::new();
        for slot in self.resolved_device_slots(input, snapshot)? {
            match slot {
                ConfigurationSlot::Fixed(d) => anchors.push(d),
                ConfigurationSlot::Branch { mut members, .. } => anchors.append(&mut members),
            }
        }
        for (i, spec) in input.generic_specs.iter().enumerate() {
            if let Some(level) = spec.conical_level {
                anchors.push(Arc::new(spec.synthesize(i, level)));
            }
        }
        // A prior filtering step's devices are already part of the stack
        // being completed, so they anchor the search too.
        for id in &input.prior_device_ids {
            let device = snapshot.get(id).ok_or_else(|| {
                EngineError::InvalidInput(format!("unknown catalog id '{id}' in prior results"))
            })?;
            anchors.push(device);
        }

        if anchors.is_empty() {
            return Ok(ResultEnvelope::empty(
                Status::NeedsClarification,
                ResultType::DeviceDiscovery,
                "discovery needs at least one resolved anchor device",
            ));
        }

        let result = match discovery::discover(
            category,
            &anchors,
            &input.discovery_filters,
            snapshot,
            self.check_length(input),
            &self.config,
        ) {
            Ok(result) => result,
            Err(EngineError::UnknownCategory(token)) => {
                return Ok(ResultEnvelope::empty(
                    Status::NeedsClarification,
                    ResultType::DeviceDiscovery,
                    format!("no catalog devices match category '{token}'"),
                ));
            }
            Err(e) => return Err(e),
        };
        info!(
            category = %result.category,
            matched = result.matches.len(),
            considered = result.candidates_considered,
            "discovery routed"
        );

        Ok(ResultEnvelope {
            status: Status::Complete,
            result_type: ResultType::DeviceDiscovery,
            configurations: Vec::new(),
            discovery: Some(result.matches),
            discovery_category: Some(result.category),
            candidates_considered: result.candidates_considered,
            confidence: degraded_confidence(
                input.classification.confidence,
                false,
                false,
                &self.config,
            ),
            action: Some(RoutedAction::RunDiscovery),
            gentle_correction: false,
            dropped_candidates: 0,
            unreachable: Vec::new(),
            warnings_present: false,
            records: Vec::new(),
            summary: Default::default(),
            note: None,
        })
    }
}
