//! End-to-end behavior of a session driven by a scripted engine.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{StreamExt, stream};

use colloquy::{
    ArtifactExtractor, CommandInterpreter, CompletionEngine, ContentBlock, ConversationSession,
    Error, FragmentStream, Interpretation, Message, MessageContent, ModelRegistry, Renderer,
    Result, Role, SessionConfig, StreamingResponseCollector, parse_line,
};

/// Streams a fixed list of fragments, optionally failing after the first `fail_after`.
struct ScriptedEngine {
    models: ModelRegistry,
    fragments: Vec<&'static str>,
    fail_after: Option<usize>,
    requests: AtomicUsize,
}

impl ScriptedEngine {
    fn new(fragments: Vec<&'static str>) -> Self {
        Self {
            models: ModelRegistry::default(),
            fragments,
            fail_after: None,
            requests: AtomicUsize::new(0),
        }
    }

    fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

#[async_trait::async_trait]
impl CompletionEngine for ScriptedEngine {
    fn models(&self) -> &ModelRegistry {
        &self.models
    }

    async fn complete_once(&self, _: &[Message], _: &str, _: u32) -> Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.fragments.concat())
    }

    async fn complete_streaming(&self, _: &[Message], _: &str, _: u32) -> Result<FragmentStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<Result<String>> =
            self.fragments.iter().map(|f| Ok(f.to_string())).collect();
        if let Some(count) = self.fail_after {
            items.truncate(count);
            items.push(Err(Error::completion_engine(
                "connection reset by peer",
                None,
                None,
            )));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

#[derive(Default)]
struct RecordingRenderer {
    text: String,
    info: Vec<String>,
    errors: Vec<String>,
}

impl Renderer for RecordingRenderer {
    fn print_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_info(&mut self, info: &str) {
        self.info.push(info.to_string());
    }

    fn print_saved(&mut self, what: &str, path: &Path) {
        self.info.push(format!("{what} saved to {}", path.display()));
    }

    fn finish_response(&mut self) {}
}

fn new_session(dir: &Path) -> ConversationSession {
    let config = SessionConfig::new().with_log_dir(dir.join("conv"));
    ConversationSession::new(&config, ModelRegistry::default()).expect("default model key")
}

#[test]
fn non_keyword_lines_pass_through_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = new_session(dir.path());
    let mut renderer = RecordingRenderer::default();
    let interpreter = CommandInterpreter::new();
    for line in [
        "What is the capital of France?",
        "  leading and trailing  ",
        "Import is capitalized here",
        "limit 10 is not lim",
    ] {
        assert_eq!(
            interpreter.interpret(&mut session, line, &mut renderer),
            Interpretation::Prompt(line.to_string())
        );
    }
    assert_eq!(session.message_count(), 0);
    assert!(renderer.errors.is_empty());
}

#[test]
fn import_text_and_image_in_one_message() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.png");
    fs::write(&a, "alpha beta").unwrap();
    fs::write(&b, [0x89, b'P', b'N', b'G', 0x0d, 0x0a]).unwrap();

    let mut session = new_session(dir.path());
    let mut renderer = RecordingRenderer::default();
    let line = format!("import {},{}", a.display(), b.display());
    let interpretation = CommandInterpreter::new().interpret(&mut session, &line, &mut renderer);
    assert_eq!(interpretation.prompt(), None);

    let messages = session.log().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    match &messages[0].content {
        MessageContent::Blocks(blocks) => {
            assert_eq!(blocks.len(), 2);
            assert!(
                matches!(&blocks[0], ContentBlock::Text { text, .. } if text == "alpha beta")
            );
            assert!(matches!(&blocks[1], ContentBlock::Image { .. }));
        }
        other => panic!("expected blocks, got {other:?}"),
    }
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[1].content.render().contains("b.png"));
}

#[test]
fn lim_abc_leaves_limit_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = new_session(dir.path());
    let mut renderer = RecordingRenderer::default();
    let before = session.response_limit();
    CommandInterpreter::new().interpret(&mut session, "lim abc", &mut renderer);
    assert_eq!(session.response_limit(), before);
    assert_eq!(renderer.errors.len(), 1);
    assert!(renderer.errors[0].starts_with("Invalid argument"));
}

#[test]
fn model_bogus_leaves_model_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = new_session(dir.path());
    let before = session.model_id().to_string();
    let err = session.set_model("bogus").unwrap_err();
    assert!(err.is_invalid_model_key());
    assert!(err.is_user_input());
    assert_eq!(session.model_id(), before);
}

#[tokio::test]
async fn streamed_fragments_commit_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = new_session(dir.path());
    let engine = ScriptedEngine::new(vec!["Hello", "World"]);
    let collector = StreamingResponseCollector::new(&engine);

    let mut stream = collector.stream(&mut session, "greet me");
    let mut fragments = Vec::new();
    while let Some(fragment) = stream.next().await {
        fragments.push(fragment.unwrap());
    }
    assert_eq!(fragments, vec!["Hello", "World"]);
    assert_eq!(stream.accumulated(), "HelloWorld");
    drop(stream);

    assert_eq!(
        session.log().messages(),
        &[Message::user("greet me"), Message::assistant("HelloWorld")]
    );
    assert_eq!(engine.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_stream_shows_fragments_but_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = new_session(dir.path());
    let engine = ScriptedEngine::new(vec!["Hello", "World"]).failing_after(1);
    let collector = StreamingResponseCollector::new(&engine);

    let items: Vec<Result<String>> = collector.stream(&mut session, "greet me").collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "Hello");
    assert!(items[1].as_ref().unwrap_err().is_completion_engine());

    assert_eq!(session.log().messages(), &[Message::user("greet me")]);
}

#[test]
fn artifact_extraction_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("code_artifacts");
    let response = "Here you go:\n```python\nprint('hi')\n```\nand\n```bash\necho hi\n```\n";
    let extractor = ArtifactExtractor::new();

    let first = extractor.extract(response, &out).unwrap();
    let py = fs::read_to_string(out.join("code_artifact_1.py")).unwrap();
    let sh = fs::read_to_string(out.join("code_artifact_1.sh")).unwrap();
    let second = extractor.extract(response, &out).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(py, "print('hi')");
    assert_eq!(sh, "echo hi");
    assert_eq!(fs::read_to_string(out.join("code_artifact_1.py")).unwrap(), py);
    assert_eq!(fs::read_to_string(out.join("code_artifact_1.sh")).unwrap(), sh);
    assert_eq!(fs::read_dir(&out).unwrap().count(), 2);
}

#[test]
fn oversized_import_is_rejected_before_preparation() {
    let dir = tempfile::tempdir().unwrap();
    let big = dir.path().join("huge.png");
    let file = fs::File::create(&big).unwrap();
    file.set_len(colloquy::MAX_ATTACHMENT_BYTES + 1).unwrap();
    drop(file);

    let mut session = new_session(dir.path());
    let mut renderer = RecordingRenderer::default();
    let line = format!("import {}", big.display());
    CommandInterpreter::new().interpret(&mut session, &line, &mut renderer);

    assert_eq!(session.message_count(), 0);
    assert_eq!(renderer.errors.len(), 1);
    assert!(renderer.errors[0].contains("exceeds"));
}

#[tokio::test]
async fn full_session_writes_log() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.md");
    fs::write(&notes, "# Notes\nremember the milk").unwrap();

    let mut session = new_session(dir.path());
    let mut renderer = RecordingRenderer::default();
    let engine = ScriptedEngine::new(vec!["Sure", ", milk."]);
    let collector = StreamingResponseCollector::new(&engine);
    let interpreter = CommandInterpreter::new();

    let line = format!("import {} lim 100 what should I remember?", notes.display());
    let prompt = match interpreter.interpret(&mut session, &line, &mut renderer) {
        Interpretation::Prompt(prompt) => prompt,
        Interpretation::Quit => panic!("unexpected quit"),
    };
    assert_eq!(prompt, "what should I remember?");
    assert_eq!(session.response_limit(), 100);

    let mut stream = collector.stream(&mut session, &prompt);
    while let Some(fragment) = stream.next().await {
        renderer.print_text(&fragment.unwrap());
    }
    drop(stream);
    assert_eq!(renderer.text, "Sure, milk.");

    assert!(matches!(parse_line("thank you"), colloquy::command::ParsedLine::Quit));
    let path = session.flush_log().unwrap();
    let contents = fs::read_to_string(path).unwrap();
    let records: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["role"], "user");
    assert!(
        records[0]["content"]
            .as_str()
            .unwrap()
            .starts_with("[file: notes.md]\n# Notes")
    );
    assert_eq!(records[1]["role"], "assistant");
    assert_eq!(records[2]["content"], "what should I remember?");
    assert_eq!(records[3]["content"], "Sure, milk.");
}
