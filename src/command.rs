//! Command parsing for the interactive session.
//!
//! A line of operator input either ends the session, or starts with zero or more keyword
//! commands followed by a residual prompt for the engine.  Each keyword consumes at most one
//! argument token:
//!
//! ```text
//! lim 1024 model opus Explain this file
//! ^^^^^^^^ ^^^^^^^^^^ residual prompt
//! ```
//!
//! Parsing is pure ([`parse_line`]); executing the parsed commands against a session is the
//! job of [`CommandInterpreter`].

use std::collections::VecDeque;
use std::num::IntErrorKind;

use crate::error::{Error, Result};
use crate::observability::{COMMAND_ERRORS, COMMANDS};
use crate::render::Renderer;
use crate::session::{AttachedKind, ConversationSession};

/// Whole lines that end the session.  Matched exactly, including case.
pub const QUIT_PHRASES: [&str; 4] = ["exit", "quit", "thanks", "thank you"];

/// A recognized command keyword.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Keyword {
    /// `import <path>[,<path>...]`
    Import,
    /// `model <key>`
    Model,
    /// `lim <n>`
    Lim,
    /// `help`
    Help,
}

impl Keyword {
    /// Recognize `token` as a keyword.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "import" => Some(Keyword::Import),
            "model" => Some(Keyword::Model),
            "lim" => Some(Keyword::Lim),
            "help" => Some(Keyword::Help),
            _ => None,
        }
    }

    /// The keyword as typed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Import => "import",
            Keyword::Model => "model",
            Keyword::Lim => "lim",
            Keyword::Help => "help",
        }
    }
}

/// A parsed command.
#[derive(Debug, Clone)]
pub enum Command {
    /// Attach the listed files.
    Import(Vec<String>),
    /// Switch to the model with this key.
    Model(String),
    /// Set the response limit.
    Limit(u32),
    /// Print usage text.
    Help,
    /// A keyword whose argument was missing or malformed.
    Invalid(Error),
}

impl Command {
    /// Build the command for `keyword` from its (optional) argument token.
    pub fn parse(keyword: Keyword, argument: Option<&str>) -> Self {
        if keyword == Keyword::Help {
            return Command::Help;
        }
        let Some(argument) = argument.filter(|arg| !arg.is_empty()) else {
            return Command::Invalid(Error::invalid_argument(
                "missing argument",
                Some(keyword.as_str().to_string()),
            ));
        };
        match keyword {
            Keyword::Import => {
                let paths: Vec<String> = argument
                    .split(',')
                    .filter(|path| !path.is_empty())
                    .map(String::from)
                    .collect();
                if paths.is_empty() {
                    Command::Invalid(Error::invalid_argument(
                        format!("no paths in '{argument}'"),
                        Some(keyword.as_str().to_string()),
                    ))
                } else {
                    Command::Import(paths)
                }
            }
            Keyword::Model => Command::Model(argument.to_string()),
            Keyword::Lim => match parse_limit(argument) {
                Ok(limit) => Command::Limit(limit),
                Err(err) => Command::Invalid(err),
            },
            Keyword::Help => Command::Help,
        }
    }
}

/// The parse of one input line.
#[derive(Debug, Clone)]
pub enum ParsedLine {
    /// The line was a quit phrase.
    Quit,
    /// Leading commands and whatever text is left for the engine.
    Commands {
        /// Commands in the order they appeared.
        commands: Vec<Command>,
        /// The prompt for the engine; empty when there is nothing to send.
        residual: String,
    },
}

/// Parse one line of operator input without touching any state.
pub fn parse_line(line: &str) -> ParsedLine {
    if QUIT_PHRASES.contains(&line) {
        return ParsedLine::Quit;
    }
    let mut tokens: VecDeque<&str> = line.split_whitespace().collect();
    let starts_with_keyword = tokens
        .front()
        .is_some_and(|token| Keyword::from_token(token).is_some());
    if !starts_with_keyword {
        let residual = if tokens.is_empty() {
            String::new()
        } else {
            line.to_string()
        };
        return ParsedLine::Commands {
            commands: Vec::new(),
            residual,
        };
    }
    let mut commands = Vec::new();
    while let Some(keyword) = tokens.front().and_then(|token| Keyword::from_token(token)) {
        tokens.pop_front();
        let argument = tokens.pop_front();
        commands.push(Command::parse(keyword, argument));
    }
    let residual = Vec::from(tokens).join(" ");
    ParsedLine::Commands { commands, residual }
}

/// Parse a response limit: a non-negative integer.
pub fn parse_limit(argument: &str) -> Result<u32> {
    argument.parse::<u32>().map_err(|err| {
        let message = match err.kind() {
            IntErrorKind::PosOverflow => {
                format!("'{argument}' is out of range, the maximum is {}", u32::MAX)
            }
            _ => format!("expected a non-negative integer, got '{argument}'"),
        };
        Error::invalid_argument(message, Some(Keyword::Lim.as_str().to_string()))
    })
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Commands go at the start of a line and may be chained before a prompt:
  import <path>[,<path>...]   Attach files (text, PDF, or image) to the conversation
  model <key>                 Switch model (e.g., model opus)
  lim <n>                     Set the maximum response length
  help                        Show this help message
  exit | quit | thanks | thank you
                              End the session and save the conversation log
Example: lim 1024 model sonnet Summarize the file I imported"#
}

/// What the caller should do after a line has been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Send this prompt to the engine, unless it is empty.
    Prompt(String),
    /// End the session.
    Quit,
}

impl Interpretation {
    /// The prompt to send, if there is one.
    pub fn prompt(&self) -> Option<&str> {
        match self {
            Interpretation::Prompt(prompt) if !prompt.is_empty() => Some(prompt),
            _ => None,
        }
    }
}

/// Applies parsed commands to a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandInterpreter;

impl CommandInterpreter {
    /// Create a new interpreter.
    pub fn new() -> Self {
        Self
    }

    /// Interpret one line of operator input.
    ///
    /// Commands are executed in order.  A command that fails is reported through `renderer` and
    /// the remaining commands still run; the residual prompt is returned either way.
    pub fn interpret(
        &self,
        session: &mut ConversationSession,
        line: &str,
        renderer: &mut dyn Renderer,
    ) -> Interpretation {
        match parse_line(line) {
            ParsedLine::Quit => Interpretation::Quit,
            ParsedLine::Commands { commands, residual } => {
                for command in commands {
                    COMMANDS.click();
                    if let Err(err) = self.execute(session, command, renderer) {
                        COMMAND_ERRORS.click();
                        tracing::warn!(error = %err, "command failed");
                        renderer.print_error(&err.to_string());
                    }
                }
                Interpretation::Prompt(residual)
            }
        }
    }

    /// Execute a single command.
    ///
    /// `import` never fails as a whole: each path is reported on its own.
    pub fn execute(
        &self,
        session: &mut ConversationSession,
        command: Command,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        match command {
            Command::Import(paths) => {
                for outcome in session.attach(&paths) {
                    match outcome.result {
                        Ok(kind) => {
                            let kind = match kind {
                                AttachedKind::Text => "text",
                                AttachedKind::Image => "image",
                            };
                            renderer.print_info(&format!(
                                "Attached {} ({kind})",
                                outcome.path.display()
                            ));
                        }
                        Err(err) => renderer.print_error(&err.to_string()),
                    }
                }
                Ok(())
            }
            Command::Model(key) => {
                let model_id = session.set_model(&key)?;
                renderer.print_info(&format!("Model set to {model_id}"));
                Ok(())
            }
            Command::Limit(limit) => {
                session.set_limit(limit);
                renderer.print_info(&format!("Response limit set to {limit}"));
                Ok(())
            }
            Command::Help => {
                for line in help_text().lines() {
                    renderer.print_info(&format!("    {line}"));
                }
                Ok(())
            }
            Command::Invalid(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::engine::ModelRegistry;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingRenderer {
        info: Vec<String>,
        errors: Vec<String>,
    }

    impl Renderer for RecordingRenderer {
        fn print_text(&mut self, _: &str) {}

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_info(&mut self, info: &str) {
            self.info.push(info.to_string());
        }

        fn print_saved(&mut self, _: &str, _: &Path) {}

        fn finish_response(&mut self) {}
    }

    fn session(dir: &Path) -> ConversationSession {
        let config = SessionConfig::new().with_log_dir(dir);
        ConversationSession::new(&config, ModelRegistry::default()).unwrap()
    }

    fn commands(line: &str) -> (Vec<Command>, String) {
        match parse_line(line) {
            ParsedLine::Commands { commands, residual } => (commands, residual),
            ParsedLine::Quit => panic!("unexpected quit for {line:?}"),
        }
    }

    #[test]
    fn parse_quit_phrases() {
        for phrase in QUIT_PHRASES {
            assert!(matches!(parse_line(phrase), ParsedLine::Quit));
        }
    }

    #[test]
    fn quit_is_case_sensitive_and_whole_line() {
        assert!(matches!(parse_line("Quit"), ParsedLine::Commands { .. }));
        assert!(matches!(parse_line("EXIT"), ParsedLine::Commands { .. }));
        let (cmds, residual) = commands("thanks for the help");
        assert!(cmds.is_empty());
        assert_eq!(residual, "thanks for the help");
    }

    #[test]
    fn non_keyword_line_is_verbatim() {
        let line = "  Explain   monads,\tplease  ";
        let (cmds, residual) = commands(line);
        assert!(cmds.is_empty());
        assert_eq!(residual, line);

        // A keyword later in the line is not a command.
        let (cmds, residual) = commands("please model this");
        assert!(cmds.is_empty());
        assert_eq!(residual, "please model this");
    }

    #[test]
    fn empty_line() {
        let (cmds, residual) = commands("");
        assert!(cmds.is_empty());
        assert_eq!(residual, "");

        let (_, residual) = commands("   \t ");
        assert_eq!(residual, "");
    }

    #[test]
    fn chained_commands_with_residual() {
        let (cmds, residual) = commands("lim 1024 model opus   Explain  this");
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[0], Command::Limit(1024)));
        assert!(matches!(&cmds[1], Command::Model(key) if key == "opus"));
        assert_eq!(residual, "Explain this");
    }

    #[test]
    fn commands_without_residual() {
        let (cmds, residual) = commands("import a.txt,b.png");
        assert_eq!(residual, "");
        match &cmds[..] {
            [Command::Import(paths)] => assert_eq!(paths, &["a.txt", "b.png"]),
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn help_consumes_one_token() {
        let (cmds, residual) = commands("help me please");
        assert!(matches!(cmds[..], [Command::Help]));
        assert_eq!(residual, "please");
    }

    #[test]
    fn missing_argument_is_invalid() {
        for line in ["model", "lim", "import"] {
            let (cmds, residual) = commands(line);
            assert_eq!(residual, "");
            match &cmds[..] {
                [Command::Invalid(err)] => assert!(err.is_invalid_argument(), "{line}"),
                other => panic!("unexpected commands for {line}: {other:?}"),
            }
        }
    }

    #[test]
    fn import_of_only_commas_is_invalid() {
        let (cmds, _) = commands("import ,,");
        assert!(matches!(&cmds[..], [Command::Invalid(err)] if err.is_invalid_argument()));
    }

    #[test]
    fn long_command_chain() {
        let line = "lim 1 ".repeat(100_000) + "done";
        let (cmds, residual) = commands(&line);
        assert_eq!(cmds.len(), 100_000);
        assert_eq!(residual, "done");
    }

    #[test]
    fn parse_limit_values() {
        assert_eq!(parse_limit("0").unwrap(), 0);
        assert_eq!(parse_limit("4096").unwrap(), 4096);
        let err = parse_limit("abc").unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(
            err.to_string(),
            "Invalid argument: expected a non-negative integer, got 'abc' (command: lim)"
        );
        assert!(parse_limit("-1").is_err());
        assert_eq!(parse_limit("4294967295").unwrap(), u32::MAX);
    }

    #[test]
    fn parse_limit_reports_overflow_range() {
        let err = parse_limit("99999999999").unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(
            err.to_string(),
            "Invalid argument: '99999999999' is out of range, the maximum is 4294967295 \
             (command: lim)"
        );
    }

    #[test]
    fn interpret_lim_abc_leaves_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let mut renderer = RecordingRenderer::default();
        let interpretation =
            CommandInterpreter::new().interpret(&mut session, "lim abc", &mut renderer);
        assert_eq!(interpretation, Interpretation::Prompt(String::new()));
        assert_eq!(interpretation.prompt(), None);
        assert_eq!(session.response_limit(), 512);
        assert_eq!(renderer.errors.len(), 1);
        assert!(renderer.errors[0].contains("abc"));
    }

    #[test]
    fn interpret_bad_model_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let mut renderer = RecordingRenderer::default();
        let interpretation = CommandInterpreter::new().interpret(
            &mut session,
            "model bogus lim 100 hello there",
            &mut renderer,
        );
        assert_eq!(interpretation.prompt(), Some("hello there"));
        assert_eq!(session.model_id(), "claude-3-haiku-20240307");
        assert_eq!(session.response_limit(), 100);
        assert_eq!(renderer.errors, vec!["Invalid model key: bogus".to_string()]);
    }

    #[test]
    fn execute_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let mut renderer = RecordingRenderer::default();
        let interpreter = CommandInterpreter::new();
        let err = interpreter
            .execute(
                &mut session,
                Command::parse(Keyword::Lim, Some("abc")),
                &mut renderer,
            )
            .unwrap_err();
        assert!(err.is_invalid_argument());
        let err = interpreter
            .execute(&mut session, Command::Model("bogus".to_string()), &mut renderer)
            .unwrap_err();
        assert!(err.is_invalid_model_key());
    }

    #[test]
    fn interpret_import_reports_each_path() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("notes.txt");
        std::fs::write(&good, "some notes").unwrap();
        let missing = dir.path().join("missing.txt");
        let line = format!("import {},{} summarize", missing.display(), good.display());

        let mut session = session(dir.path());
        let mut renderer = RecordingRenderer::default();
        let interpretation =
            CommandInterpreter::new().interpret(&mut session, &line, &mut renderer);
        assert_eq!(interpretation.prompt(), Some("summarize"));
        assert_eq!(session.message_count(), 2);
        assert_eq!(renderer.errors.len(), 1);
        assert!(renderer.errors[0].contains("missing.txt"));
        assert!(renderer.info.iter().any(|info| info.contains("notes.txt")));
    }

    #[test]
    fn interpret_help_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let mut renderer = RecordingRenderer::default();
        let interpretation =
            CommandInterpreter::new().interpret(&mut session, "help", &mut renderer);
        assert_eq!(interpretation.prompt(), None);
        assert_eq!(session.message_count(), 0);
        assert!(renderer.info.iter().any(|line| line.contains("import")));
    }

    #[test]
    fn interpret_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let mut renderer = RecordingRenderer::default();
        assert_eq!(
            CommandInterpreter::new().interpret(&mut session, "thank you", &mut renderer),
            Interpretation::Quit
        );
    }

    #[test]
    fn help_text_mentions_keywords() {
        let help = help_text();
        for keyword in ["import", "model", "lim", "help", "quit"] {
            assert!(help.contains(keyword), "{keyword}");
        }
    }
}
