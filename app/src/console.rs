//! Line-oriented console standing in for the candidate UI.
//!
//! Commands are read from stdin. Session operations run on their own
//! tasks so `cancel` is accepted while a step is still in flight; events
//! from the bus are printed as they arrive.

use preflight_core::{ReadinessCoordinator, ReadinessEvent, SessionSnapshot, SharedEventBus};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
commands:
  open <job_id>   open a readiness session for an assessment
  next            run the current step and advance
  back            return to the previous step
  commit          start the assessment attempt (from the final step)
  cancel          cancel the open session
  status          show the current session
  help            show this help
  quit            cancel any session and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Open(String),
    Next,
    Back,
    Commit,
    Cancel,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for `{}`", verb));
    }

    let verb = verb.to_ascii_lowercase();
    let command = match verb.as_str() {
        "open" => {
            return arg
                .map(|job_id| Some(ConsoleCommand::Open(job_id.to_string())))
                .ok_or_else(|| "usage: open <job_id>".to_string())
        }
        "next" | "n" => ConsoleCommand::Next,
        "back" | "b" => ConsoleCommand::Back,
        "commit" => ConsoleCommand::Commit,
        "cancel" => ConsoleCommand::Cancel,
        "status" | "s" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command `{}` (try `help`)", other)),
    };
    if arg.is_some() {
        return Err(format!("`{}` takes no arguments", verb));
    }
    Ok(Some(command))
}

fn flag(on: bool) -> &'static str {
    if on {
        "yes"
    } else {
        "no"
    }
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut out = format!(
        "{} ({}) session {}\nStep {}/8: {}{}",
        snapshot.assessment.title,
        snapshot.assessment.job_id,
        snapshot.session_id,
        snapshot.step_number,
        snapshot.step_title,
        if snapshot.in_progress { " [working]" } else { "" },
    );
    out.push_str(&format!(
        "\n  camera live: {}  object model: {}  gaze model: {}  camera verified: {}  face verified: {}",
        flag(snapshot.camera_live),
        flag(snapshot.object_model_loaded),
        flag(snapshot.gaze_model_loaded),
        flag(snapshot.camera_verified),
        flag(snapshot.face_verified),
    ));
    if let Some(report) = &snapshot.compatibility {
        let failing = report.failing();
        if failing.is_empty() {
            out.push_str("\n  compatibility: all checks passed");
        } else {
            out.push_str(&format!(
                "\n  compatibility: failing {}",
                preflight_core::describe_checks(&failing)
            ));
        }
    }
    if let Some(error) = &snapshot.error {
        out.push_str(&format!("\n  error: {}", error));
    }
    out
}

fn render_event(event: &ReadinessEvent) -> String {
    match event {
        ReadinessEvent::SessionOpened { job_id, title, .. } => {
            format!("opened readiness for {} ({})", title, job_id)
        }
        ReadinessEvent::StepChanged {
            old_step, new_step, ..
        } => format!("{} -> {}", old_step, new_step),
        ReadinessEvent::StepFailed { step, message, .. } => {
            format!("{} failed: {}", step, message)
        }
        ReadinessEvent::ResourceAcquired { resource, .. } => format!("acquired {}", resource),
        ReadinessEvent::ResourceReleased { resource, .. } => format!("released {}", resource),
        ReadinessEvent::CompatibilityReported { report, .. } => {
            if report.all_passed() {
                "compatibility: all checks passed".to_string()
            } else {
                format!(
                    "compatibility: failing {}",
                    preflight_core::describe_checks(&report.failing())
                )
            }
        }
        ReadinessEvent::ResourceWarning { failing, .. } => format!(
            "warning: this device may be too weak for the assessment ({})",
            preflight_core::describe_checks(failing)
        ),
        ReadinessEvent::AttemptStarted { attempt_id, .. } => {
            format!("assessment attempt {} started", attempt_id)
        }
        ReadinessEvent::SessionClosed { reason, .. } => format!("session closed ({:?})", reason),
    }
}

/// Print every bus event until the bus closes.
pub fn start_event_printer(event_bus: SharedEventBus) {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => println!("  · {}", render_event(&event)),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Event printer lagged by {} events", n);
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Event bus closed, stopping printer");
                    break;
                }
            }
        }
    });
}

pub struct Console {
    coordinator: Arc<ReadinessCoordinator>,
}

impl Console {
    pub fn new(coordinator: Arc<ReadinessCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Read and run commands until `quit` or end of input.
    pub async fn run(&self) -> anyhow::Result<()> {
        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await,
                Err(message) => println!("{}", message),
            }
        }
        self.coordinator.close().await;
        Ok(())
    }

    pub async fn execute(&self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Open(job_id) => match self.coordinator.open(&job_id).await {
                Ok(handle) => match handle.snapshot().await {
                    Ok(snapshot) => println!("{}", render_snapshot(&snapshot)),
                    Err(e) => println!("✗ {}", e),
                },
                Err(e) => println!("✗ cannot open {}: {}", job_id, e),
            },
            ConsoleCommand::Cancel => self.coordinator.close().await,
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
            ConsoleCommand::Next
            | ConsoleCommand::Back
            | ConsoleCommand::Commit
            | ConsoleCommand::Status => self.on_session(command).await,
        }
    }

    async fn on_session(&self, command: ConsoleCommand) {
        let Some(handle) = self.coordinator.current().await else {
            println!("no open session; use `open <job_id>`");
            return;
        };

        // Spawned so the console keeps reading while a step runs.
        tokio::spawn(async move {
            let result = match command {
                ConsoleCommand::Next => handle.advance().await.map(|s| render_snapshot(&s)),
                ConsoleCommand::Back => handle.retreat().await.map(|s| render_snapshot(&s)),
                ConsoleCommand::Status => handle.snapshot().await.map(|s| render_snapshot(&s)),
                ConsoleCommand::Commit => handle
                    .commit()
                    .await
                    .map(|attempt| format!("attempt {} is live; readiness is done", attempt)),
                _ => return,
            };
            match result {
                Ok(text) => println!("{}", text),
                Err(e) => println!("✗ {}", e),
            }
        });
    }
}
