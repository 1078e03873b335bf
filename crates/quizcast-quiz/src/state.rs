//! In-memory quiz state. One instance per process, guarded by the controller.

use std::collections::HashMap;

use quizcast_core::types::{Answer, CatalogEntry, Problem};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// Reported by the controller while a selection is in flight; never stored.
    Broadcasting,
    CollectingAnswers,
    Tabulated,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Broadcasting => "broadcasting",
            Phase::CollectingAnswers => "collecting_answers",
            Phase::Tabulated => "tabulated",
        };
        f.write_str(name)
    }
}

/// What a tabulation run works from.
#[derive(Debug, Clone)]
pub struct CycleSnapshot {
    pub problem: Problem,
    /// Every answer of the cycle, in first-submission order.
    pub answers: Vec<Answer>,
    /// Answers not yet handed to the durable store in their current form.
    pub unsaved: Vec<Answer>,
    /// The cycle had been tabulated before this run.
    pub retabulated: bool,
}

#[derive(Debug)]
pub struct QuizState {
    phase: Phase,
    active: Option<Problem>,
    /// Current cycle's answers by user ID.
    answers: HashMap<String, Answer>,
    /// User IDs in first-submission order.
    order: Vec<String>,
    /// Last version of each answer written to the store.
    persisted: HashMap<String, Answer>,
    /// Every problem broadcast since start, by ID.
    broadcast: HashMap<String, Problem>,
    catalog: Vec<CatalogEntry>,
}

impl Default for QuizState {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            active: None,
            answers: HashMap::new(),
            order: Vec::new(),
            persisted: HashMap::new(),
            broadcast: HashMap::new(),
            catalog: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active(&self) -> Option<&Problem> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|p| p.id.as_str())
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Install a freshly persisted problem and open a new, empty cycle.
    pub fn activate(&mut self, problem: Problem) {
        self.broadcast.insert(problem.id.clone(), problem.clone());
        self.active = Some(problem);
        self.answers.clear();
        self.order.clear();
        self.persisted.clear();
        self.phase = Phase::CollectingAnswers;
    }

    /// Store `answer` if it targets the active problem. Last write per user
    /// wins; the user keeps their original place in the order.
    ///
    /// Answers arriving after tabulation are still stored. They miss the
    /// snapshot already taken and only show up if the cycle is tabulated again.
    pub fn record_answer(&mut self, answer: Answer) -> bool {
        match self.active_id() {
            Some(id) if id == answer.problem_id => {
                if !self.answers.contains_key(&answer.user_id) {
                    self.order.push(answer.user_id.clone());
                }
                self.answers.insert(answer.user_id.clone(), answer);
                true
            }
            _ => false,
        }
    }

    /// Mark the cycle tabulated and hand back what to summarize and persist.
    pub fn close_cycle(&mut self) -> Option<CycleSnapshot> {
        let problem = self.active.clone()?;
        let retabulated = self.phase == Phase::Tabulated;
        self.phase = Phase::Tabulated;

        let answers: Vec<Answer> = self
            .order
            .iter()
            .filter_map(|user_id| self.answers.get(user_id))
            .cloned()
            .collect();
        let unsaved = answers
            .iter()
            .filter(|a| self.persisted.get(&a.user_id) != Some(*a))
            .cloned()
            .collect();
        Some(CycleSnapshot {
            problem,
            answers,
            unsaved,
            retabulated,
        })
    }

    /// Record answers the store accepted. Ignored if the cycle has moved on.
    pub fn mark_persisted(&mut self, problem_id: &str, saved: Vec<Answer>) {
        if self.active_id() != Some(problem_id) {
            return;
        }
        for answer in saved {
            self.persisted.insert(answer.user_id.clone(), answer);
        }
    }

    pub fn problem_by_id(&self, id: &str) -> Option<&Problem> {
        self.broadcast.get(id)
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn replace_catalog(&mut self, catalog: Vec<CatalogEntry>) {
        self.catalog = catalog;
    }
}
