//! What the robot says.

use robovox_core::error::PlanningError;
use robovox_core::plan::{ExecutionResult, ExecutionStatus};
use robovox_core::skill::SkillStatus;

pub const DONE: &str = "Done.";
pub const TRANSCRIPT_APOLOGY: &str = "Sorry, I didn't catch that. Could you say it again?";

/// Sentence for a planning failure.
pub fn planning_failure(error: &PlanningError) -> String {
    match error {
        PlanningError::Timeout(_) | PlanningError::Transport(_) => {
            "I can't reach my planning service right now. Please try again in a moment.".into()
        }
        PlanningError::Malformed(_) => {
            "I didn't get a usable plan for that. Please try again.".into()
        }
        PlanningError::Validation(_) => {
            "I can't do that. The plan I came up with used something I don't support.".into()
        }
        PlanningError::Cancelled => String::new(),
    }
}

/// Sentence summarising a plan run. Empty for cancelled runs, which are
/// never spoken.
pub fn execution_summary(result: &ExecutionResult) -> String {
    let total = result.results.len();
    let failed = result.count(SkillStatus::Failed);
    let culprit = result.first_failure().map(|r| {
        let detail = r
            .error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or("unknown error");
        (spoken_skill(&r.skill), detail)
    });

    match (result.status, culprit) {
        (ExecutionStatus::Ok, _) => DONE.into(),
        (ExecutionStatus::Cancelled, _) => String::new(),
        (_, Some(_)) if result.fatal => fault_notice(result).unwrap_or_default(),
        (ExecutionStatus::Aborted, Some((skill, detail))) => {
            let skipped = result.count(SkillStatus::Skipped);
            format!("I stopped after {skill} failed, {detail}. I skipped the remaining {skipped} steps.")
        }
        (_, Some((skill, detail))) => format!(
            "I finished, but {failed} of {total} steps failed. The first was {skill}, {detail}."
        ),
        (_, None) => DONE.into(),
    }
}

/// Sentence telling the user a fatal hardware fault stopped the robot.
/// Spoken even when the run itself was cancelled by a barge-in.
pub fn fault_notice(result: &ExecutionResult) -> Option<String> {
    if !result.fatal {
        return None;
    }
    let skill = result
        .results
        .iter()
        .find(|r| r.is_fatal())
        .or_else(|| result.first_failure())
        .map(|r| spoken_skill(&r.skill))?;
    Some(format!(
        "I stopped because of a hardware fault during {skill}. Please check the robot before we continue."
    ))
}

/// `move_to` reads better as "move to".
fn spoken_skill(name: &str) -> String {
    name.replace('_', " ")
}

/// Strip everything a speech engine would stumble over: markdown, emoji
/// and symbols. Letters in any script, digits, whitespace and basic
/// punctuation survive; runs of whitespace collapse to one space.
pub fn clean_for_speech(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | ',' | '!' | '?' | '=' | '\'' | '-') {
                c
            } else if c.is_whitespace() || c == '_' {
                ' '
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
