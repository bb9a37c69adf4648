use biometrics::{Collector, Counter};

pub(crate) static ATTACHMENTS: Counter = Counter::new("colloquy.attachments.prepared");
pub(crate) static ATTACHMENT_ERRORS: Counter = Counter::new("colloquy.attachments.errors");
pub(crate) static ATTACHMENT_OVERSIZE: Counter = Counter::new("colloquy.attachments.oversize");

pub(crate) static COMMANDS: Counter = Counter::new("colloquy.commands.dispatched");
pub(crate) static COMMAND_ERRORS: Counter = Counter::new("colloquy.commands.errors");

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("colloquy.stream.requests");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("colloquy.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("colloquy.stream.errors");
pub(crate) static STREAM_COMMITS: Counter = Counter::new("colloquy.stream.commits");

pub(crate) static ARTIFACTS_SAVED: Counter = Counter::new("colloquy.artifacts.saved");

pub(crate) static LOG_RECORDS_WRITTEN: Counter = Counter::new("colloquy.log.records_written");
pub(crate) static LOG_RECORDS_SKIPPED: Counter = Counter::new("colloquy.log.records_skipped");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&ATTACHMENTS);
    collector.register_counter(&ATTACHMENT_ERRORS);
    collector.register_counter(&ATTACHMENT_OVERSIZE);

    collector.register_counter(&COMMANDS);
    collector.register_counter(&COMMAND_ERRORS);

    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_COMMITS);

    collector.register_counter(&ARTIFACTS_SAVED);

    collector.register_counter(&LOG_RECORDS_WRITTEN);
    collector.register_counter(&LOG_RECORDS_SKIPPED);
}
