//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order, keeping the
//! tracked state map in step with every operation that succeeds. This is where
//! side effects actually occur.

use std::collections::HashMap;

use log::{info, warn};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Read succeeded
    Read { state: State },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete then create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Result of refreshing tracked state against the remote side
#[derive(Debug, Default)]
pub struct RefreshResult {
    /// Resources that disappeared remotely and were dropped from state
    pub drifted: Vec<ResourceId>,
    pub errors: Vec<ProviderError>,
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    ///
    /// `states` is updated as each managed resource changes; data source reads
    /// are reported in the outcomes only.
    pub async fn apply(&self, plan: &Plan, states: &mut HashMap<ResourceId, State>) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect, states).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(e) => {
                    failure_count += 1;
                    warn!("{} {} failed: {}", effect.kind(), effect.resource_id(), e);
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        states: &mut HashMap<ResourceId, State>,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Read(resource) => {
                let state = self.provider.read_data_source(resource).await?;
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let state = self.provider.create(resource).await?;
                states.insert(state.id.clone(), state.clone());
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { from, to } => {
                let state = self.provider.update(from, to).await?;
                states.insert(state.id.clone(), state.clone());
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { from, to } => {
                self.provider.delete(from).await?;
                states.remove(&from.id);
                let state = self.provider.create(to).await?;
                states.insert(state.id.clone(), state.clone());
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete(current) => {
                self.provider.delete(current).await?;
                states.remove(&current.id);
                Ok(EffectOutcome::Deleted {
                    id: current.id.clone(),
                })
            }
        }
    }

    /// Re-read every tracked resource
    ///
    /// A resource the Provider reports as not found is removed from `states`.
    /// Read failures leave the previous state untouched.
    pub async fn refresh(&self, states: &mut HashMap<ResourceId, State>) -> RefreshResult {
        let mut result = RefreshResult::default();

        let mut ids: Vec<ResourceId> = states.keys().cloned().collect();
        ids.sort_by_key(|id| id.to_string());

        for id in ids {
            let Some(current) = states.get(&id) else {
                continue;
            };
            match self.provider.read(current).await {
                Ok(state) if state.exists => {
                    states.insert(id, state);
                }
                Ok(_) => {
                    info!("{} no longer exists remotely, removing it from state", id);
                    states.remove(&id);
                    result.drifted.push(id);
                }
                Err(e) => result.errors.push(e),
            }
        }

        result
    }

    /// Import an existing remote object and read its full state
    pub async fn import(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        let seeded = self.provider.import(id, import_id).await?;
        let state = self.provider.read(&seeded).await?;
        if !state.exists {
            return Err(ProviderError::configuration(
                "Cannot import non-existent remote object",
                format!("no object found for import identifier {:?}", import_id),
            )
            .for_resource(id.clone()));
        }
        info!("{} imported", id);
        Ok(state)
    }
}
