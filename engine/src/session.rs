//! Shopping session orchestration
//!
//! Wires the stages of one session together:
//!
//! 1. load remembered preferences (failures degrade to none)
//! 2. run the interview until the shopper confirms
//! 3. research and rank
//! 4. optionally summarize the interview and remember it
//!
//! Errors that leave a session are tagged with the stage they came from.
//! Credentials are checked by [`preflight`] before any of this starts.

use crate::clarifier::{Clarifier, ClarifierSettings, Prompt};
use crate::config::Config;
use crate::db::Database;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::memory::{self, PreferenceMemory};
use crate::ranking::RankingEngine;
use crate::research::{ResearchAgent, ResearchOutcome, ResearchSettings};
use crate::search::tavily::TavilyProvider;
use crate::search::SearchClient;
use crate::secrets::{SecretCache, ANTHROPIC_API_KEY, OPENAI_API_KEY, TAVILY_API_KEY};
use sdk::errors::{EngineError, Stage, StageError};
use sdk::requirements::RequirementSet;
use sdk::types::PreferenceRecord;
use serde::Serialize;
use std::sync::Arc;

/// Credential key required by a language model provider, if any
pub fn provider_key(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some(OPENAI_API_KEY),
        "anthropic" => Some(ANTHROPIC_API_KEY),
        _ => None,
    }
}

/// Check that every Port the session needs is usable.
///
/// # Errors
/// `EngineError::Configuration` naming the first missing credential.
pub fn preflight(config: &Config, secrets: &SecretCache) -> Result<(), EngineError> {
    if let Some(key) = provider_key(&config.llm.default_provider) {
        secrets.get_secret(key)?;
    }
    secrets.get_secret(TAVILY_API_KEY)?;
    tracing::debug!("Preflight passed for provider '{}'", config.llm.default_provider);
    Ok(())
}

/// Terminal (or scripted) side of a session
pub trait Conversation {
    /// Show a prompt and return the shopper's raw reply.
    /// An error (closed input) is read as `done`.
    fn ask(&mut self, prompt: &Prompt) -> anyhow::Result<String>;

    fn show_outcome(&mut self, outcome: &ResearchOutcome);

    /// Whether the shopper wants this session's preferences remembered
    fn confirm_remember(&mut self) -> bool;
}

/// What a completed session produced
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub requirements: RequirementSet,
    pub outcome: ResearchOutcome,
    /// Number of preference records written
    pub remembered: usize,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct ShoppingSession {
    llm: Arc<dyn LLMProvider>,
    research: ResearchAgent,
    memory: Option<PreferenceMemory>,
    settings: ClarifierSettings,
    clock: fn() -> i64,
}

impl ShoppingSession {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        research: ResearchAgent,
        memory: Option<PreferenceMemory>,
        settings: ClarifierSettings,
    ) -> Self {
        Self {
            llm,
            research,
            memory,
            settings,
            clock: now,
        }
    }

    /// Use a fixed clock for preference timestamps
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Build every stage from configuration.
    ///
    /// The preference database is opened only when memory is enabled; a
    /// database that cannot be opened disables memory for this session.
    pub async fn from_config(config: &Config, secrets: Arc<SecretCache>) -> Self {
        let llm: Arc<dyn LLMProvider> =
            Arc::new(LLMRouter::from_config(&config.llm, Arc::clone(&secrets)));
        let search = SearchClient::from_config(
            Arc::new(TavilyProvider::new(&config.search, Arc::clone(&secrets))),
            &config.search,
        );
        let ranking = RankingEngine::from_config(Arc::clone(&llm), &config.assistant);
        let research = ResearchAgent::new(
            Arc::clone(&llm),
            search,
            ranking,
            ResearchSettings::from(config),
        );

        let memory = if config.memory.enabled {
            match Database::new(&config.database_path()).await {
                Ok(db) => Some(PreferenceMemory::from_config(db.preferences(), &config.memory)),
                Err(e) => {
                    tracing::warn!("Preference memory unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::new(llm, research, memory, ClarifierSettings::from(&config.assistant))
    }

    async fn load_seed(&self, session_id: &str) -> Vec<PreferenceRecord> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        match memory.load(session_id, (self.clock)()).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not load preferences, starting fresh: {}", e);
                Vec::new()
            }
        }
    }

    /// Drive the interview to `DONE`
    async fn interview(
        &self,
        conversation: &mut dyn Conversation,
        topic: &str,
        seed: &[PreferenceRecord],
    ) -> Result<RequirementSet, StageError> {
        let mut clarifier = Clarifier::new(Arc::clone(&self.llm), self.settings.clone());
        clarifier.start(topic, seed);

        loop {
            let prompt = clarifier.next_prompt().await;
            if matches!(prompt, Prompt::Finished) {
                break;
            }
            let reply = match conversation.ask(&prompt) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!("Input closed ({}), ending interview", e);
                    "done".to_string()
                }
            };
            let transition = clarifier.ingest(&reply).await;
            tracing::debug!("Interview transition: {:?}", transition);
        }

        let turns = clarifier.requirements().turn();
        let requirements = clarifier.finish().ok_or_else(|| {
            StageError::new(
                Stage::Clarification,
                EngineError::GenerationFormat("interview ended without confirmation".to_string()),
            )
        })?;
        tracing::info!("Interview finished after {} turns", turns);
        Ok(requirements)
    }

    /// Summarize and save if the shopper agrees. Never fails.
    async fn remember(
        &self,
        conversation: &mut dyn Conversation,
        session_id: &str,
        requirements: &RequirementSet,
    ) -> usize {
        let Some(memory) = &self.memory else {
            return 0;
        };
        if !conversation.confirm_remember() {
            return 0;
        }

        let now = (self.clock)();
        let records = memory::summarize(self.llm.as_ref(), requirements, now).await;
        match memory.save(session_id, &records, now).await {
            Ok(()) => records.len(),
            Err(e) => {
                tracing::warn!("Could not save preferences: {}", e);
                0
            }
        }
    }

    /// Run one session end to end.
    ///
    /// # Errors
    /// A `research`-tagged `SearchUnavailable` when search failed after
    /// retry. Interview answers are remembered first if the shopper agrees.
    pub async fn run(
        &self,
        conversation: &mut dyn Conversation,
        session_id: &str,
        topic: &str,
    ) -> Result<SessionReport, StageError> {
        tracing::info!("Session '{}' started for '{}'", session_id, topic);

        let seed = self.load_seed(session_id).await;
        let requirements = self.interview(conversation, topic, &seed).await?;

        let outcome = match self.research.recommend(requirements.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Research failed: {}", e);
                self.remember(conversation, session_id, &requirements).await;
                return Err(StageError::new(Stage::Research, e));
            }
        };

        conversation.show_outcome(&outcome);
        let remembered = self.remember(conversation, session_id, &requirements).await;

        tracing::info!(
            "Session '{}' finished with {} recommendations",
            session_id,
            outcome.recommendations.len()
        );

        Ok(SessionReport {
            session_id: session_id.to_string(),
            requirements,
            outcome,
            remembered,
        })
    }
}
