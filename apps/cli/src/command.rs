/// One line of terminal input.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Load(String),
    Ask(String),
    History,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "load" | "l" => Command::Load(arg.to_string()),
        "history" | "h" => Command::History,
        "status" | "s" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

pub const HELP: &str = "\
/load <url>   load a YouTube video's transcript
/history      print the conversation so far
/status       show what the session is doing
/quit         leave
anything else is sent as a question";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_line("  What is this about? "),
            Command::Ask("What is this about?".into())
        );
        assert_eq!(parse_line("   "), Command::Empty);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(
            parse_line("/load https://youtube.com/watch?v=abc123"),
            Command::Load("https://youtube.com/watch?v=abc123".into())
        );
        assert_eq!(parse_line("/load"), Command::Load(String::new()));
        assert_eq!(parse_line("/q"), Command::Quit);
        assert_eq!(parse_line("/history"), Command::History);
        assert_eq!(parse_line("/status"), Command::Status);
        assert_eq!(parse_line("/frobnicate now"), Command::Unknown("frobnicate".into()));
    }
}
