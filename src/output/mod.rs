//! Output buffer system using shared mutex-protected queues
//!
//! This module provides a buffer system where each task has its own output buffer
//! accessed through task-local storage, allowing for clean API with no buffer passing.
//! Code running outside any buffer scope (library callers, unit tests) falls back
//! to writing straight to stdout/stderr.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task;

/// Types of output lines that can be stored in the buffer
#[derive(Debug, Clone, PartialEq)]
pub enum OutputType {
    /// Standard output (normal messages)
    Standard,
    /// Error messages
    Error,
    /// Messages tagged with the workflow step they belong to
    Step(u32),
    /// System messages (application status, etc.)
    System,
    /// Debug messages (only shown in verbose mode)
    Debug,
}

/// A single line of output with its type
#[derive(Debug, Clone)]
pub struct OutputLine {
    /// The type of output
    pub output_type: OutputType,
    /// The actual text content
    pub content: String,
    /// Timestamp when the line was added
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Shared buffer queue protected by a mutex
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    /// The mutex-protected queue of output lines
    queue: Arc<Mutex<VecDeque<OutputLine>>>,
}

impl SharedBuffer {
    /// Create a new shared buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn lines(&self) -> MutexGuard<'_, VecDeque<OutputLine>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a line to the buffer
    pub fn push(&self, line: OutputLine) {
        self.lines().push_back(line);
    }

    /// Pop a line from the buffer
    pub fn pop(&self) -> Option<OutputLine> {
        self.lines().pop_front()
    }

    /// Take every queued line at once
    pub fn drain(&self) -> Vec<OutputLine> {
        self.lines().drain(..).collect()
    }

    /// Add standard output line(s), splitting by newlines
    pub fn stdout(&self, content: impl Into<String>) {
        self.send_split_lines(OutputType::Standard, content.into())
    }

    /// Add error output line(s), splitting by newlines
    pub fn stderr(&self, content: impl Into<String>) {
        self.send_split_lines(OutputType::Error, content.into())
    }

    /// Add step-tagged output line(s), splitting by newlines
    pub fn step(&self, step_id: u32, content: impl Into<String>) {
        self.send_split_lines(OutputType::Step(step_id), content.into())
    }

    /// Add system (status) line(s), splitting by newlines
    pub fn system(&self, content: impl Into<String>) {
        self.send_split_lines(OutputType::System, content.into())
    }

    /// Add debug line(s), splitting by newlines
    pub fn debug(&self, content: impl Into<String>) {
        self.send_split_lines(OutputType::Debug, content.into())
    }

    /// Helper method to split content by newlines and add each line separately
    fn send_split_lines(&self, output_type: OutputType, content: String) {
        for line in content.split('\n') {
            // Skip empty lines if they're at the end
            if line.is_empty() {
                continue;
            }

            self.push(OutputLine {
                output_type: output_type.clone(),
                content: line.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

// Task-local storage for the current task's output buffer
tokio::task_local! {
    pub static CURRENT_BUFFER: SharedBuffer;
}

/// Write to the current buffer, or to stdout when no buffer is in scope
pub fn emit_stdout(message: String) {
    if CURRENT_BUFFER.try_with(|buffer| buffer.stdout(message.clone())).is_err() {
        print!("{message}");
    }
}

/// Write to the current buffer, or to stderr when no buffer is in scope
pub fn emit_stderr(message: String) {
    if CURRENT_BUFFER.try_with(|buffer| buffer.stderr(message.clone())).is_err() {
        eprint!("{message}");
    }
}

/// Write a status line to the current buffer, or to stderr
pub fn emit_system(message: String) {
    if CURRENT_BUFFER.try_with(|buffer| buffer.system(message.clone())).is_err() {
        eprint!("{message}");
    }
}

/// Write a debug line to the current buffer, or to stderr
pub fn emit_debug(message: String) {
    if CURRENT_BUFFER.try_with(|buffer| buffer.debug(message.clone())).is_err() {
        eprint!("{message}");
    }
}

/// Write a step-tagged line to the current buffer, or to stdout
pub fn emit_step(step_id: u32, message: String) {
    if CURRENT_BUFFER
        .try_with(|buffer| buffer.step(step_id, message.clone()))
        .is_err()
    {
        print!("[step {step_id}] {message}");
    }
}

/// Spawn a new tokio task with an output buffer in task-local storage
pub fn spawn_with_buffer<F, T>(buffer: SharedBuffer, future: F) -> task::JoinHandle<T>
where
    F: futures::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(CURRENT_BUFFER.scope(buffer, future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_skip_empty() {
        let buffer = SharedBuffer::new(8);
        buffer.stdout("first\n\nsecond\n");
        let lines = buffer.drain();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].content, "first");
        assert_eq!(lines[1].content, "second");
        assert!(buffer.pop().is_none());
    }

    #[tokio::test]
    async fn test_emit_goes_to_scoped_buffer() {
        let buffer = SharedBuffer::new(8);
        let handle = spawn_with_buffer(buffer.clone(), async {
            emit_stdout("hello\n".to_string());
            emit_step(3, "working\n".to_string());
            bprintln!(warn: "slow down");
        });
        handle.await.unwrap();

        let lines = buffer.drain();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].output_type, OutputType::Standard);
        assert_eq!(lines[1].output_type, OutputType::Step(3));
        assert_eq!(lines[2].output_type, OutputType::System);
        assert!(lines[2].content.ends_with("slow down"));
    }
}
