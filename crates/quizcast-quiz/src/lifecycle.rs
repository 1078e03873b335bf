//! Lifecycle controller: selection, submission, tabulation and the catalog.
//!
//! The state mutex is only ever held for in-memory reads and writes; every
//! source, store, probe and delivery call happens with it released.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use quizcast_core::config::{LabelConfig, QuizConfig, RecipientConfig};
use quizcast_core::error::Result;
use quizcast_core::traits::{Deliverer, ImageProbe, ProblemSource, QuizStore, Template};
use quizcast_core::types::{Answer, CatalogEntry, EditorialCard, Problem, ProblemCard, UserFields};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::fanout::{DeliveryReport, fan_out};
use crate::probe::aspect_ratio;
use crate::state::{CycleSnapshot, Phase, QuizState};
use crate::tabulate;

/// External systems the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ProblemSource>,
    pub store: Arc<dyn QuizStore>,
    pub deliverer: Arc<dyn Deliverer>,
    pub probe: Arc<dyn ImageProbe>,
}

/// What one broadcast (problem or editorial) did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub problem_id: String,
    pub deliveries: Vec<DeliveryReport>,
}

/// Raises the in-flight flag for one selection and lowers it when dropped,
/// including when a deadline cancels the selection mid-await.
struct BroadcastingGuard<'a>(&'a AtomicBool);

impl<'a> BroadcastingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BroadcastingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct QuizController {
    state: Mutex<QuizState>,
    broadcasting: AtomicBool,
    deps: Collaborators,
    recipients: Vec<RecipientConfig>,
    labels: LabelConfig,
    liff_url: String,
    delivery_concurrency: usize,
    rng: StdMutex<StdRng>,
}

impl QuizController {
    pub fn new(deps: Collaborators, config: &QuizConfig) -> Self {
        Self {
            state: Mutex::new(QuizState::new()),
            broadcasting: AtomicBool::new(false),
            deps,
            recipients: config.recipients.clone(),
            labels: config.labels.clone(),
            liff_url: config.server.liff_url.clone(),
            delivery_concurrency: config.http.delivery_concurrency,
            rng: StdMutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source (deterministic tests).
    pub fn with_rng(self, rng: StdRng) -> Self {
        Self {
            rng: StdMutex::new(rng),
            ..self
        }
    }

    pub fn recipients(&self) -> &[RecipientConfig] {
        &self.recipients
    }

    pub fn recipient(&self, name: &str) -> Option<&RecipientConfig> {
        self.recipients.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn deliverer(&self) -> &dyn Deliverer {
        self.deps.deliverer.as_ref()
    }

    /// Run `f` with the RNG. Never held across an await.
    fn with_rng_mut<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut rng)
    }

    /// Pick an eligible problem, persist it, mark it at the source, make it
    /// active and push the problem card. `None` when nothing is eligible.
    pub async fn select_and_broadcast(&self) -> Result<Option<CycleReport>> {
        let eligible = self.deps.source.read_eligible_problems().await?;
        if eligible.is_empty() {
            tracing::info!("📭 No eligible problems left, nothing to broadcast");
            return Ok(None);
        }
        let mut problem = self.with_rng_mut(|rng| eligible[rng.gen_range(0..eligible.len())].clone());

        let _broadcasting = BroadcastingGuard::enter(&self.broadcasting);
        let id = match self.deps.store.create_problem_record(&problem).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("❌ Persisting problem {} failed: {e}", problem.index);
                return Err(e);
            }
        };
        problem.id = id.clone();

        if let Err(e) = self.deps.source.mark_broadcast(problem.index).await {
            tracing::warn!("⚠️ Marking problem {} broadcast at source failed: {e}", problem.index);
        }
        self.state.lock().await.activate(problem.clone());
        tracing::info!("🎯 Problem {} selected as {id}", problem.index);

        let card = ProblemCard {
            problem_id: id.clone(),
            image_url: problem.original_image_url.clone(),
            image_aspect_ratio: aspect_ratio(self.deps.probe.as_ref(), &problem.original_image_url).await,
            text: problem.text.clone(),
            setter: problem.setter.clone(),
            difficulty: problem.difficulty,
            options: problem.options.clone(),
            liff_url: self.liff_url.clone(),
        };
        let args = serde_json::to_value(&card)?;
        let deliveries = fan_out(
            self.deps.deliverer.as_ref(),
            &self.recipients,
            Template::Problem,
            &args,
            self.delivery_concurrency,
        )
        .await;

        Ok(Some(CycleReport {
            problem_id: id,
            deliveries,
        }))
    }

    /// Accept an answer for the active problem. Stale answers are dropped
    /// without error; returns whether it was recorded.
    pub async fn submit_answer(&self, answer: Answer) -> Result<bool> {
        if self.state.lock().await.active_id() != Some(answer.problem_id.as_str()) {
            tracing::debug!("Discarding answer from {} for stale problem '{}'", answer.user_id, answer.problem_id);
            return Ok(false);
        }

        let fields = UserFields {
            name: answer.user_name.clone(),
            group_id: answer.user_group_id.clone(),
        };
        if let Err(e) = self.deps.store.upsert_user(&answer.user_id, &fields, true).await {
            tracing::warn!("⚠️ Upserting user {} failed: {e}", answer.user_id);
        }

        // The active problem may have changed while the store was busy.
        Ok(self.state.lock().await.record_answer(answer))
    }

    /// Close the cycle, persist its new answers and push the editorial card.
    ///
    /// `None` when no problem has been broadcast yet, or when the cycle was
    /// already tabulated and no answer arrived or changed since.
    pub async fn tabulate_and_broadcast(&self) -> Result<Option<CycleReport>> {
        let Some(snapshot) = self.state.lock().await.close_cycle() else {
            tracing::info!("📭 No active problem, skipping editorial");
            return Ok(None);
        };
        let CycleSnapshot {
            problem,
            answers,
            unsaved,
            retabulated,
        } = snapshot;
        if retabulated && unsaved.is_empty() {
            tracing::info!("🔁 Problem {} already tabulated with no new answers, skipping editorial", problem.id);
            return Ok(None);
        }

        let hidden = self.hidden_users(&answers).await;

        let mut saved = Vec::with_capacity(unsaved.len());
        for answer in unsaved {
            match self.deps.store.create_answer_record(&answer).await {
                Ok(_) => saved.push(answer),
                Err(e) => tracing::warn!("⚠️ Persisting answer of {} failed: {e}", answer.user_id),
            }
        }
        self.state.lock().await.mark_persisted(&problem.id, saved);

        let results = self.with_rng_mut(|rng| tabulate::tabulate(&problem, &answers, &hidden, &self.labels, rng));
        let comments = tabulate::comments(&answers, problem.options.len(), &hidden, &self.labels);
        let total = results.iter().map(|r| r.count).sum();
        tracing::info!("🧮 Problem {} tabulated: {total} answers", problem.id);

        let card = EditorialCard {
            problem_id: problem.id.clone(),
            image_url: problem.editorial_image_url.clone(),
            image_aspect_ratio: aspect_ratio(self.deps.probe.as_ref(), &problem.editorial_image_url).await,
            text: problem.text.clone(),
            editorial: problem.editorial.clone(),
            total,
            results,
            comments,
        };
        let args = serde_json::to_value(&card)?;
        let deliveries = fan_out(
            self.deps.deliverer.as_ref(),
            &self.recipients,
            Template::Editorial,
            &args,
            self.delivery_concurrency,
        )
        .await;

        Ok(Some(CycleReport {
            problem_id: problem.id,
            deliveries,
        }))
    }

    /// Users who asked not to be named. Lookup failures count as hidden.
    async fn hidden_users(&self, answers: &[Answer]) -> HashSet<String> {
        let mut hidden = HashSet::new();
        for answer in answers {
            match self.deps.store.get_user(&answer.user_id).await {
                Ok(Some(user)) if !user.is_hidden => {}
                Ok(None) => {}
                Ok(Some(_)) => {
                    hidden.insert(answer.user_id.clone());
                }
                Err(e) => {
                    tracing::warn!("⚠️ Looking up user {} failed, hiding name: {e}", answer.user_id);
                    hidden.insert(answer.user_id.clone());
                }
            }
        }
        hidden
    }

    /// Reload the map catalog. On error the cached catalog stays as it was.
    pub async fn refresh_catalog(&self) -> Result<usize> {
        let catalog = self.deps.source.read_catalog().await?;
        let count = catalog.len();
        self.state.lock().await.replace_catalog(catalog);
        tracing::info!("🗺️ Catalog refreshed: {count} entries");
        Ok(count)
    }

    /// A random catalog entry whose event contains `tag` (any entry when empty).
    pub async fn catalog_lookup(&self, tag: &str) -> Option<CatalogEntry> {
        let matching: Vec<CatalogEntry> = self
            .state
            .lock()
            .await
            .catalog()
            .iter()
            .filter(|e| e.matches_tag(tag))
            .cloned()
            .collect();
        self.with_rng_mut(|rng| matching.choose(rng).cloned())
    }

    /// Flip the user's "hide my name" flag. Returns the new value.
    pub async fn toggle_privacy(&self, user_id: &str) -> Result<bool> {
        let hidden = self
            .deps
            .store
            .get_user(user_id)
            .await?
            .map(|u| u.is_hidden)
            .unwrap_or(false);
        self.deps.store.set_user_hidden(user_id, !hidden).await?;
        tracing::info!("🙈 User {user_id} hidden = {}", !hidden);
        Ok(!hidden)
    }

    pub async fn active_problem(&self) -> Option<Problem> {
        self.state.lock().await.active().cloned()
    }

    pub async fn problem_by_id(&self, id: &str) -> Option<Problem> {
        self.state.lock().await.problem_by_id(id).cloned()
    }

    pub async fn phase(&self) -> Phase {
        if self.broadcasting.load(Ordering::SeqCst) {
            return Phase::Broadcasting;
        }
        self.state.lock().await.phase()
    }

    pub async fn answer_count(&self) -> usize {
        self.state.lock().await.answer_count()
    }
}
