use std::fmt::Write as _;

use services::{AttemptListItem, Notice, SessionEvent, TerminalOutcome};

/// Seconds left at which the countdown starts being printed.
const COUNTDOWN_WARN_SECS: u32 = 3;

pub const PROMPT_HELP: &str = "answer with 1-9, <enter> for next, q to give up";

/// Terminal text for a session event, or `None` when nothing should be printed.
#[must_use]
pub fn event_line(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::QuestionShown {
            question_index,
            total,
            question,
            selected,
            time_left_secs,
        } => {
            let mut out = format!(
                "\nQuestion {}/{total} ({time_left_secs}s)\n{}\n",
                question_index + 1,
                question.prompt()
            );
            for (index, option) in question.options().iter().enumerate() {
                let marker = if *selected == Some(index) { '*' } else { ' ' };
                let _ = writeln!(out, " {marker} {}) {option}", index + 1);
            }
            Some(out)
        }
        SessionEvent::Ticked { time_left_secs } if *time_left_secs <= COUNTDOWN_WARN_SECS => {
            Some(format!("  {time_left_secs}s left"))
        }
        SessionEvent::Ticked { .. } => None,
        SessionEvent::Selected { index } => Some(format!("  selected {}", index + 1)),
        SessionEvent::TimedOut { question_index } => {
            Some(format!("  time is up for question {}", question_index + 1))
        }
        SessionEvent::Notice(notice) => Some(notice_line(notice)),
        SessionEvent::Rejected(reason) => Some(format!("  ignored: {reason}")),
        SessionEvent::Finished(outcome) => Some(outcome_line(outcome)),
    }
}

fn notice_line(notice: &Notice) -> String {
    match notice {
        Notice::Resumed { question_index } => {
            format!("Resuming saved progress at question {}", question_index + 1)
        }
        Notice::DiscardedResume { reason } => {
            format!("Saved progress could not be used ({reason}); starting over")
        }
        Notice::SubmissionFailed { message } => {
            format!("Submission failed: {message}. Press <enter> to retry.")
        }
        Notice::Submitted { message } if message.is_empty() => "Answers submitted".to_owned(),
        Notice::Submitted { message } => format!("Answers submitted: {message}"),
        Notice::PersistFailed { message } => format!("warning: progress not saved ({message})"),
    }
}

#[must_use]
pub fn outcome_line(outcome: &TerminalOutcome) -> String {
    match outcome {
        TerminalOutcome::Success { summary, .. } => format!(
            "\nDone: {} answered, {} unanswered, {}s total",
            summary.answered(),
            summary.unanswered(),
            summary.total_time_taken_secs()
        ),
        TerminalOutcome::Failure { reason } => format!("\nQuiz ended: {reason}"),
    }
}

#[must_use]
pub fn history_line(item: &AttemptListItem) -> String {
    format!(
        "#{:<4} {}  {} (level {})  {}/{} answered  {}s",
        item.id,
        item.completed_at.format("%Y-%m-%d %H:%M"),
        item.title,
        item.level,
        item.answered,
        item.total,
        item.total_time_taken_secs
    )
}
