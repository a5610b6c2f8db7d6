//! Command channels feeding the debugger's blocking request/response loop.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Where a paused engine's command loop reads commands and writes responses.
pub trait CommandChannel: Send {
    /// Next command line. `Ok(None)` at end of input, which resumes execution.
    ///
    /// An [`io::ErrorKind::InvalidData`] error means one undecodable command was consumed;
    /// the loop reports it and keeps reading. Any other error closes the session.
    fn read_command(&mut self, prompt: &str) -> io::Result<Option<String>>;

    fn write_response(&mut self, text: &str) -> io::Result<()>;
}

/// Line-oriented channel over any reader and writer, e.g. stdin and stdout.
pub struct LineChannel<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl LineChannel<io::BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> CommandChannel for LineChannel<R, W> {
    fn read_command(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.writer.write_all(prompt.as_bytes())?;
        self.writer.flush()?;
        let mut bytes = Vec::new();
        if self.reader.read_until(b'\n', &mut bytes)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8(bytes).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("command is not valid UTF-8: {}", e.utf8_error()),
            )
        })?;
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    fn write_response(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        writeln!(self.writer, "{}", text)?;
        self.writer.flush()
    }
}

/// In-memory channel: commands are queued up front, responses are collected.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    commands: VecDeque<String>,
    responses: Vec<String>,
}

impl ScriptedChannel {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            responses: Vec::new(),
        }
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn remaining(&self) -> usize {
        self.commands.len()
    }
}

impl CommandChannel for ScriptedChannel {
    fn read_command(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.commands.pop_front())
    }

    fn write_response(&mut self, text: &str) -> io::Result<()> {
        self.responses.push(text.to_string());
        Ok(())
    }
}
