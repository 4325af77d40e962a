use std::time::Duration;

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use tubetalk_core::{
    ConversationState, Message, Origin, Rejection, Status, format::origin_label, format_clock,
    format_message, format_transcript,
};

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Terminal side of the session: prints turns and shows the loading and
/// typing signals as a spinner.
pub struct Renderer {
    styled: bool,
    spinner: Option<ProgressBar>,
    seen: Vec<Message>,
    status: Option<Status>,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            styled: Term::stdout().is_term(),
            spinner: None,
            seen: Vec::new(),
            status: None,
        }
    }

    pub fn banner(&self, backend: &str) {
        println!(
            "\n{}  {}  {}\n",
            style("tubetalk").cyan().bold(),
            style("YouTube Video Assistant").dim(),
            style(backend).dim()
        );
        println!("{}", style("─".repeat(60)).dim());
    }

    fn print(&self, line: String) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }

    pub fn message(&mut self, message: Message) {
        let line = if self.styled {
            let clock = style(format!("[{}]", format_clock(message.timestamp()))).dim();
            let label = origin_label(message.origin());
            match (message.origin(), message.notice()) {
                (Origin::User, _) => {
                    format!("{} {} {}", clock, style(label).cyan().bold(), message.text())
                }
                (Origin::Assistant, Some(notice)) if notice.is_failure() => format!(
                    "{} {} {}",
                    clock,
                    style(label).magenta().bold(),
                    style(message.text()).red()
                ),
                (Origin::Assistant, Some(_)) => format!(
                    "{} {} {}",
                    clock,
                    style(label).magenta().bold(),
                    style(message.text()).yellow()
                ),
                (Origin::Assistant, None) => format!(
                    "{} {} {}",
                    clock,
                    style(label).magenta().bold(),
                    message.text()
                ),
            }
        } else {
            format_message(&message)
        };
        self.print(line);
        self.seen.push(message);
    }

    pub fn status_changed(&mut self, status: Status) {
        let wanted = if status.loading {
            Some("Loading video transcript...")
        } else if status.typing {
            Some("Assistant is typing...")
        } else {
            None
        };

        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(msg) = wanted.filter(|_| self.styled) {
            self.spinner = Some(create_spinner(msg));
        }
        self.status = Some(status);
    }

    pub fn rejected(&self, rejection: Rejection) {
        // The invalid-reference notice already explains itself.
        if rejection == Rejection::MalformedReference {
            return;
        }
        self.print(format!("{} {}", style("!").yellow().bold(), style(rejection).dim()));
    }

    pub fn history(&self) {
        self.print(format_transcript(&self.seen));
    }

    pub fn status(&self) {
        let Some(status) = &self.status else {
            return;
        };
        let state = match status.state {
            ConversationState::Idle => "loading a video",
            ConversationState::AwaitingVideo => "waiting for a video",
            ConversationState::Ready => "ready for questions",
            ConversationState::AwaitingAnswer => "waiting for an answer",
        };
        let video = status
            .video_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());
        self.print(format!(
            "{} {}  {} {}",
            style("State:").dim(),
            style(state).cyan(),
            style("Video:").dim(),
            style(video).cyan()
        ));
        if let Some(failure) = status.last_failure {
            self.print(format!("{} {}", style("Last error:").dim(), style(failure.text()).red()));
        }
    }

    pub fn info(&self, text: &str) {
        self.print(style(text).dim().to_string());
    }

    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
