//! Answer tabulation for the editorial card.

use std::collections::HashSet;

use quizcast_core::config::LabelConfig;
use quizcast_core::types::{Answer, CommentLine, OptionResult, Problem};
use rand::Rng;
use rand::seq::SliceRandom;

/// Names shown per option before the "and N more" suffix.
pub const MAX_NAMES: usize = 10;

/// Per-option counts, integer percentages, majority flags and respondent lines.
///
/// Answers pointing past the last option are dropped before counting, so the
/// counts always sum to the total the rates are computed against. Every option
/// tied at the maximum count is a majority, including the all-zero case.
pub fn tabulate<R: Rng + ?Sized>(
    problem: &Problem,
    answers: &[Answer],
    hidden: &HashSet<String>,
    labels: &LabelConfig,
    rng: &mut R,
) -> Vec<OptionResult> {
    let n = problem.options.len();
    let valid: Vec<&Answer> = answers.iter().filter(|a| a.option < n).collect();
    if valid.len() < answers.len() {
        tracing::warn!(
            "⚠️ Ignoring {} answers with out-of-range options for problem {}",
            answers.len() - valid.len(),
            problem.id
        );
    }
    let total = valid.len();

    let mut counts = vec![0usize; n];
    let mut names: Vec<Vec<String>> = vec![Vec::new(); n];
    for answer in &valid {
        counts[answer.option] += 1;
        if !hidden.contains(&answer.user_id) {
            names[answer.option].push(answer.user_name.clone());
        }
    }
    let max = counts.iter().copied().max().unwrap_or(0);

    problem
        .options
        .iter()
        .zip(counts)
        .zip(names)
        .map(|((option, count), visible)| OptionResult {
            option: option.clone(),
            count,
            rate: if total == 0 { 0 } else { count * 100 / total },
            is_majority: count == max,
            respondents: who_answered(visible, count, labels, rng),
        })
        .collect()
}

/// "a、b、c ほか2人": shuffled visible names, at most [`MAX_NAMES`], with the
/// rest (over the cap or hidden) summarized as a count.
pub fn who_answered<R: Rng + ?Sized>(
    mut visible: Vec<String>,
    total: usize,
    labels: &LabelConfig,
    rng: &mut R,
) -> String {
    if total == 0 {
        return labels.no_respondents.clone();
    }
    visible.shuffle(rng);
    visible.truncate(MAX_NAMES);

    let remainder = total.saturating_sub(visible.len());
    let mut line = visible.join(&labels.name_separator);
    if remainder > 0 {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&labels.more_suffix.replace("{n}", &remainder.to_string()));
    }
    line
}

/// Comments left with answers. Hidden users appear under the anonymous label.
pub fn comments(answers: &[Answer], option_count: usize, hidden: &HashSet<String>, labels: &LabelConfig) -> Vec<CommentLine> {
    answers
        .iter()
        .filter(|a| a.option < option_count && a.has_comment())
        .map(|a| CommentLine {
            user_name: if hidden.contains(&a.user_id) {
                labels.anonymous.clone()
            } else {
                a.user_name.clone()
            },
            text: a.comment.trim().to_string(),
        })
        .collect()
}
