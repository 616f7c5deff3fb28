// Copyright 2026 The asc-rs Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The diagnostic sink.
//!
//! Long running operations (waiting for a build, uploading an asset, resuming
//! a web session) report progress as single, human-readable lines. The client
//! never writes formatted output; these lines are the only text it produces.

use std::sync::{Arc, Mutex};

/// A write-only sink for one-line progress and warning messages.
pub trait Diagnostics: Send + Sync + std::fmt::Debug {
    /// Writes a single line. The message does not include a trailing newline.
    fn line(&self, message: &str);
}

/// Writes diagnostic lines to the standard error stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stderr;

impl Diagnostics for Stderr {
    fn line(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Discards all diagnostic lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl Diagnostics for Discard {
    fn line(&self, _message: &str) {}
}

/// Captures diagnostic lines in memory.
///
/// Clones share the same buffer, which makes it easy to hand one clone to a
/// client and inspect the other.
///
/// # Example
/// ```
/// # use asc_client::diagnostics::{Capture, Diagnostics};
/// let capture = Capture::new();
/// capture.line("hello");
/// assert_eq!(capture.lines(), vec!["hello".to_string()]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Capture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the lines captured so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("capture lock is never poisoned").clone()
    }
}

impl Diagnostics for Capture {
    fn line(&self, message: &str) {
        self.lines
            .lock()
            .expect("capture lock is never poisoned")
            .push(message.to_string());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    mockall::mock! {
        #[derive(Debug)]
        pub Diagnostics {}
        impl Diagnostics for Diagnostics {
            fn line(&self, message: &str);
        }
    }

    #[test]
    fn capture_shares_buffer() {
        let capture = Capture::new();
        let clone = capture.clone();
        clone.line("first");
        capture.line("second");
        assert_eq!(capture.lines(), vec!["first", "second"]);
    }

    #[test]
    fn mock_is_usable_as_sink() {
        let mut mock = MockDiagnostics::new();
        mock.expect_line()
            .withf(|m| m == "hello")
            .times(1)
            .return_const(());
        let sink: Arc<dyn Diagnostics> = Arc::new(mock);
        sink.line("hello");
    }
}
