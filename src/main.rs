//! Binary entrypoint for the chat log viewer server.

use std::process::ExitCode;

use chatlog_viewer::start_chatlog_viewer;

fn main() -> ExitCode {
    start_chatlog_viewer::run()
}
