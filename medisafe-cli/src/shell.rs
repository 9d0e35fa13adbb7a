//! Interactive dashboard loop.
//!
//! Commands:
//! - ask <question>
//! - view <query|result|history|compare|evaluation|architecture>
//! - compare [add [n] | rm <id>]
//! - export
//! - refresh
//! - help
//! - quit

use anyhow::{Result, anyhow, bail};
use medisafe_flow::{AnalysisResult, DirectorySink, InteractionWorkflow, Progress, View};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::render::{progress_bar, render};

const PROGRESS_POLL: Duration = Duration::from_millis(200);

const HELP: &str = "\
Commands:
  ask <question>          analyze a drug-interaction question
  view <name>             show a view: query, result, history, compare, evaluation, architecture
  compare                 show the comparison set
  compare add             add the current result to the comparison
  compare add <n>         add history entry n to the comparison
  compare rm <id>         remove a result from the comparison
  export                  save the current result as a text report
  refresh                 reload history and statistics
  help                    show this help
  quit                    leave the shell";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Ask(String),
    View(View),
    CompareAddCurrent,
    CompareAddHistory(usize),
    CompareRemove(String),
    Export,
    Refresh,
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match command.to_lowercase().as_str() {
            // An empty question is passed through so the workflow can reject it
            "ask" => Ok(ShellCommand::Ask(rest.to_string())),
            "view" => {
                let name = args
                    .first()
                    .ok_or_else(|| anyhow!("Missing argument: view <name>"))?;
                name.parse::<View>()
                    .map(ShellCommand::View)
                    .map_err(|e| anyhow!(e))
            }
            "compare" => match args.as_slice() {
                [] => Ok(ShellCommand::View(View::Compare)),
                ["add"] => Ok(ShellCommand::CompareAddCurrent),
                ["add", index] => {
                    let index: usize = index
                        .parse()
                        .map_err(|_| anyhow!("History index must be a number, got '{}'", index))?;
                    if index == 0 {
                        bail!("History entries are numbered from 1");
                    }
                    Ok(ShellCommand::CompareAddHistory(index))
                }
                ["rm" | "remove", id] => Ok(ShellCommand::CompareRemove(id.to_string())),
                _ => Err(anyhow!("Usage: compare [add [n] | rm <id>]")),
            },
            "export" | "save" => Ok(ShellCommand::Export),
            "refresh" => Ok(ShellCommand::Refresh),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
            "" => Err(anyhow!("Empty command")),
            other => Err(anyhow!("Unknown command '{}'. Type `help`.", other)),
        }
    }
}

pub struct Shell {
    workflow: InteractionWorkflow,
    sink: DirectorySink,
}

impl Shell {
    pub fn new(workflow: InteractionWorkflow, reports_dir: PathBuf) -> Self {
        Self {
            workflow,
            sink: DirectorySink::new(reports_dir),
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.workflow.refresh().await;
        self.show(View::Query);
        println!("Type `help` for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("medisafe> ");
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match ShellCommand::parse(&line) {
                Ok(ShellCommand::Quit) => break,
                Ok(command) => self.execute(command).await,
                Err(e) => eprintln!("{}", e),
            }
        }
        Ok(())
    }

    fn show(&self, view: View) {
        self.workflow.select_view(view);
        print!("{}", render(view, &self.workflow.snapshot()));
    }

    /// Errors are already surfaced as notifications by the workflow
    async fn execute(&self, command: ShellCommand) {
        debug!(?command, "Executing shell command");
        match command {
            ShellCommand::Ask(question) => self.ask(&question).await,
            ShellCommand::View(view) => self.show(view),
            ShellCommand::CompareAddCurrent => {
                if self.workflow.compare_current().is_ok() {
                    self.show(View::Compare);
                }
            }
            ShellCommand::CompareAddHistory(index) => {
                let entry = self.workflow.snapshot().history.get(index - 1).cloned();
                match entry {
                    Some(entry) => {
                        if self.workflow.add_to_comparison(AnalysisResult::from(entry)).is_ok() {
                            self.show(View::Compare);
                        }
                    }
                    None => eprintln!("No history entry {}", index),
                }
            }
            ShellCommand::CompareRemove(id) => {
                self.workflow.remove_from_comparison(&id);
                self.show(View::Compare);
            }
            ShellCommand::Export => {
                if let Ok(report) = self.workflow.export_current_result(&self.sink).await {
                    println!("Saved {}", self.sink.path_for(&report).display());
                }
            }
            ShellCommand::Refresh => {
                self.workflow.refresh().await;
                self.show(View::Query);
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => {}
        }
    }

    async fn ask(&self, question: &str) {
        if ask_with_progress(&self.workflow, question).await.is_ok() {
            self.show(View::Result);
        }
    }
}

/// Submit `question`, echoing each progress change to stderr while it runs.
pub async fn ask_with_progress(
    workflow: &InteractionWorkflow,
    question: &str,
) -> medisafe_flow::Result<AnalysisResult> {
    let watcher = {
        let workflow = workflow.clone();
        tokio::spawn(async move {
            let mut last: Option<Progress> = None;
            loop {
                let progress = workflow.progress();
                if last.as_ref() != Some(&progress) && !progress.is_idle() {
                    eprintln!("{}", progress_bar(&progress));
                    last = Some(progress);
                }
                tokio::time::sleep(PROGRESS_POLL).await;
            }
        })
    };

    let outcome = workflow.submit(question).await;
    watcher.abort();

    if outcome.is_ok() {
        eprintln!("{}", progress_bar(&workflow.progress()));
    }
    outcome
}
