//! External command execution with a timeout
//!
//! Hardware is only reachable through the driver's command-line tools, so
//! every gateway call is a child process bounded by a deadline.

use crate::error::CommandError;

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs a program to completion or kills it at the deadline
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    /// Create a runner that gives each command `timeout` to finish
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `program` with `args` and return its stdout
    ///
    /// Both pipes are drained on reader threads while the child runs, so a
    /// chatty tool cannot stall on a full pipe.
    pub fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        log::debug!("Running cmd: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        // On early return the readers are left to finish once the pipes close
        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        reap(&mut child);
                        return Err(CommandError::Timeout {
                            program: program.to_string(),
                            timeout: self.timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(source) => {
                    reap(&mut child);
                    return Err(CommandError::Output {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        };

        let stdout = collect(stdout, program)?;
        let stderr = collect(stderr, program)?;

        if !status.success() {
            let status = status
                .code()
                .map(|code| format!("status {}", code))
                .unwrap_or_else(|| "a signal".to_string());
            return Err(CommandError::Status {
                program: program.to_string(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

type Reader = JoinHandle<io::Result<Vec<u8>>>;

fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill child {}: {}", child.id(), e);
    }
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Reader> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(reader: Option<Reader>, program: &str) -> Result<String, CommandError> {
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    let buf = reader
        .join()
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "reader thread panicked")))
        .map_err(|source| CommandError::Output {
            program: program.to_string(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
