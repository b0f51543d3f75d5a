//! Command-line interface for dockgroup
//!
//! Replays scripted window-group gestures against the engine, prints the
//! adjacency graph of a layout and manages the engine configuration file.

use crate::config::{EngineConfig, ScenarioValidator, ValidationSeverity};
use crate::geometry::AdjacencyGraph;
use crate::logging::{init_logging, LogConfig, LogLevel};
use crate::models::{
    BoundsEvent, EventSink, GroupId, JsonLinesEventSink, LoggingBoundsApplier, MoveOutcome,
    RecordingEventSink, Scenario, ScenarioMember, ScenarioStep,
};
use crate::services::{
    GroupRegistry, HostBindings, ManualTickScheduler, TickReceiver, TickScheduler,
    TokioTickScheduler,
};
use crate::{DockGroupError, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// dockgroup command-line interface
#[derive(Parser)]
#[command(name = "dockgroup")]
#[command(about = "Move engine for groups of docked windows")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct DockGroupCli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable JSON output for machine-readable results
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Replay a scenario file against the group engine
    Simulate(SimulateArgs),

    /// Check a scenario file without running it
    Check(ScenarioArgs),

    /// Print the adjacency graph of a scenario's initial layout
    Graph(ScenarioArgs),

    /// Configuration management commands
    Config(ConfigCommands),
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,

    /// Drive coalescing ticks from a real timer; `wait` steps sleep
    #[arg(long)]
    pub realtime: bool,
}

#[derive(Args)]
pub struct ScenarioArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,
}

/// Configuration management subcommands
#[derive(Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub action: ConfigActions,
}

#[derive(Subcommand)]
pub enum ConfigActions {
    /// Show the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path, defaults to the active one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// CLI command executor
pub struct DockGroupCliExecutor {
    config: EngineConfig,
    config_path: PathBuf,
    json_output: bool,
}

impl DockGroupCliExecutor {
    pub fn new(config: EngineConfig, config_path: PathBuf, json_output: bool) -> Self {
        Self {
            config,
            config_path,
            json_output,
        }
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Simulate(args) => self.execute_simulate(args).await,
            Commands::Check(args) => self.execute_check(args),
            Commands::Graph(args) => self.execute_graph(args),
            Commands::Config(config_cmd) => self.execute_config_command(config_cmd),
        }
    }

    async fn execute_simulate(&self, args: SimulateArgs) -> Result<()> {
        let scenario = Scenario::load(&args.scenario)?;
        self.report_findings(&scenario, false)?;
        info!(
            "Simulating {} ({} members, {} steps)",
            args.scenario.display(),
            scenario.members.len(),
            scenario.steps.len()
        );

        let recorder = Arc::new(RecordingEventSink::new());
        let events: Arc<dyn EventSink> = if self.json_output {
            Arc::new(JsonLinesEventSink)
        } else {
            recorder.clone()
        };

        let realtime: (Arc<dyn TickScheduler>, Option<TickReceiver>) = if args.realtime {
            let (scheduler, ticks) = TokioTickScheduler::from_current()?;
            let scheduler: Arc<dyn TickScheduler> = Arc::new(scheduler);
            (scheduler, Some(ticks))
        } else {
            let scheduler: Arc<dyn TickScheduler> = Arc::new(ManualTickScheduler::new());
            (scheduler, None)
        };
        let (scheduler, ticks) = realtime;

        let host = HostBindings::new(Arc::new(LoggingBoundsApplier), events, scheduler);
        let mut simulation = Simulation {
            registry: GroupRegistry::new(self.config.clone(), host),
            group_ids: HashMap::new(),
            ticks,
        };

        for member in &scenario.members {
            simulation.join(member)?;
        }

        for (index, step) in scenario.steps.iter().enumerate() {
            let outcomes = simulation.run_step(step).await?;
            for outcome in outcomes {
                self.print_outcome(index, step, &outcome);
            }
            for event in recorder.take() {
                self.print_event(&event);
            }
        }

        self.print_layout(&simulation.registry)
    }

    fn execute_check(&self, args: ScenarioArgs) -> Result<()> {
        let scenario = Scenario::load(&args.scenario)?;
        self.report_findings(&scenario, true)?;
        if !self.json_output {
            println!("{}: ok", args.scenario.display());
        }
        Ok(())
    }

    fn execute_graph(&self, args: ScenarioArgs) -> Result<()> {
        let scenario = Scenario::load(&args.scenario)?;
        let mut report = Vec::new();

        for group in scenario.group_names() {
            let members: Vec<&ScenarioMember> = scenario
                .members
                .iter()
                .filter(|member| member.group == group)
                .collect();
            let rects: Vec<_> = members
                .iter()
                .map(|member| member.to_group_member().rect)
                .collect();
            let graph = AdjacencyGraph::build(&rects, self.config.tolerance_px);

            for edge in graph.edges() {
                let first = &members[edge.a].window;
                let second = &members[edge.b].window;
                if self.json_output {
                    report.push(serde_json::json!({
                        "group": group,
                        "a": first,
                        "b": second,
                        "sides": edge.sides,
                        "distance": edge.distance,
                    }));
                } else {
                    let sides: Vec<String> = edge
                        .sides
                        .pairs()
                        .iter()
                        .map(|(mine, theirs)| format!("{}~{}", mine, theirs))
                        .collect();
                    println!(
                        "[{}] {} -- {} [{}] distance {}",
                        group,
                        first,
                        second,
                        sides.join(", "),
                        edge.distance
                    );
                }
            }
        }

        if self.json_output {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Ok(())
    }

    fn execute_config_command(&self, cmd: ConfigCommands) -> Result<()> {
        match cmd.action {
            ConfigActions::Show => {
                if self.json_output {
                    println!("{}", serde_json::to_string_pretty(&self.config)?);
                } else {
                    println!("# {}", self.config_path.display());
                    print!("{}", toml::to_string_pretty(&self.config)?);
                }
            }
            ConfigActions::Init { force } => {
                if self.config_path.exists() && !force {
                    return Err(DockGroupError::ConfigurationError(format!(
                        "{} already exists, use --force to overwrite",
                        self.config_path.display()
                    ))
                    .into());
                }
                EngineConfig::default().save(&self.config_path)?;
                info!("Wrote default configuration to {}", self.config_path.display());
                println!("{}", self.config_path.display());
            }
            ConfigActions::Validate { file } => {
                let path = file.unwrap_or_else(|| self.config_path.clone());
                EngineConfig::load(&path)?;
                if self.json_output {
                    println!("{}", serde_json::json!({ "file": path, "valid": true }));
                } else {
                    println!("{}: valid", path.display());
                }
            }
        }

        Ok(())
    }

    /// Print validator findings; errors abort, other findings only when `all`
    fn report_findings(&self, scenario: &Scenario, all: bool) -> Result<()> {
        let findings = ScenarioValidator::new(&self.config).validate(scenario);
        for finding in &findings {
            match finding.rule.severity {
                ValidationSeverity::Error => error!("{}: {}", finding.rule.name, finding.message),
                ValidationSeverity::Warning => warn!("{}: {}", finding.rule.name, finding.message),
                ValidationSeverity::Info => debug!("{}: {}", finding.rule.name, finding.message),
            }
            if all && !self.json_output {
                println!("{:?} {}: {}", finding.rule.severity, finding.rule.name, finding.message);
            }
        }

        if ScenarioValidator::has_errors(&findings) {
            return Err(DockGroupError::ValidationError(format!(
                "Scenario has {} error(s)",
                findings.iter().filter(|finding| finding.is_error()).count()
            ))
            .into());
        }
        Ok(())
    }

    fn print_outcome(&self, index: usize, step: &ScenarioStep, outcome: &MoveOutcome) {
        if self.json_output {
            let line = serde_json::json!({ "step": index, "outcome": outcome });
            println!("{}", line);
            return;
        }

        let target = step
            .window()
            .map(|window| window.to_string())
            .unwrap_or_else(|| "*".to_string());
        match outcome {
            MoveOutcome::Accepted(result) => println!(
                "step {:>3} {:<14} {:<16} accepted {:?}, {} move(s)",
                index,
                step_kind(step),
                target,
                result.change_type,
                result.moves.len()
            ),
            MoveOutcome::Rejected(reason) => println!(
                "step {:>3} {:<14} {:<16} rejected: {}",
                index,
                step_kind(step),
                target,
                reason
            ),
            MoveOutcome::Coalesced => {
                println!("step {:>3} {:<14} {:<16} coalesced", index, step_kind(step), target)
            }
            MoveOutcome::Unchanged => {
                println!("step {:>3} {:<14} {:<16} unchanged", index, step_kind(step), target)
            }
        }
    }

    fn print_event(&self, event: &BoundsEvent) {
        let payload = &event.payload;
        println!(
            "         {} {} ltrb=({}, {}, {}, {}) reason={:?} deferred={}",
            event.topic.as_str(),
            event.window,
            payload.left,
            payload.top,
            payload.right,
            payload.bottom,
            payload.reason,
            payload.deferred
        );
    }

    fn print_layout(&self, registry: &GroupRegistry) -> Result<()> {
        let mut layout = Vec::new();
        for id in registry.group_ids() {
            let Some(group) = registry.group(id) else {
                continue;
            };
            let members: Vec<_> = group
                .members()
                .iter()
                .map(|member| (member.window.clone(), member.external_bounds()))
                .collect();
            layout.push((id, members));
        }

        if self.json_output {
            let groups: Vec<_> = layout
                .iter()
                .map(|(id, members)| {
                    let members: Vec<_> = members
                        .iter()
                        .map(|(window, bounds)| {
                            serde_json::json!({ "window": window, "bounds": bounds })
                        })
                        .collect();
                    serde_json::json!({ "group": id, "members": members })
                })
                .collect();
            println!("{}", serde_json::json!({ "layout": groups }));
        } else {
            println!("Final layout:");
            for (id, members) in layout {
                println!("  group {}", id);
                for (window, bounds) in members {
                    println!("    {:<20} {}", window.to_string(), bounds);
                }
            }
        }
        Ok(())
    }
}

fn step_kind(step: &ScenarioStep) -> &'static str {
    match step {
        ScenarioStep::Changing { .. } => "changing",
        ScenarioStep::Tick => "tick",
        ScenarioStep::End { .. } => "end",
        ScenarioStep::SetBounds { .. } => "set_bounds",
        ScenarioStep::UpdateBounds { .. } => "update_bounds",
        ScenarioStep::Join(_) => "join",
        ScenarioStep::Leave { .. } => "leave",
        ScenarioStep::Wait { .. } => "wait",
    }
}

/// Registry plus the bookkeeping a scenario replay needs
struct Simulation {
    registry: GroupRegistry,
    group_ids: HashMap<String, GroupId>,
    ticks: Option<TickReceiver>,
}

impl Simulation {
    fn join(&mut self, member: &ScenarioMember) -> Result<GroupId> {
        let existing = self
            .group_ids
            .get(&member.group)
            .copied()
            .filter(|id| self.registry.group(*id).is_some());
        let id = self.registry.join(member.to_group_member(), existing)?;
        self.group_ids.insert(member.group.clone(), id);
        Ok(id)
    }

    async fn run_step(&mut self, step: &ScenarioStep) -> Result<Vec<MoveOutcome>> {
        let outcome = match step {
            ScenarioStep::Changing { window, .. } => {
                let current = self
                    .registry
                    .group_of(window)
                    .and_then(|id| self.registry.group(id))
                    .and_then(|group| group.member(window))
                    .map(|member| member.external_bounds())
                    .ok_or_else(|| DockGroupError::WindowNotFound(window.clone()))?;
                match step.changing_payload(&current) {
                    Some(payload) => self.registry.bounds_changing(window, payload)?,
                    None => MoveOutcome::Unchanged,
                }
            }
            ScenarioStep::Tick => {
                let mut outcomes = Vec::new();
                for (_, outcome) in self.registry.tick_all() {
                    outcomes.push(outcome?);
                }
                return Ok(outcomes);
            }
            ScenarioStep::End { window } => self.registry.end_interaction(window)?,
            ScenarioStep::SetBounds { window, bounds } => {
                self.registry.set_bounds(window, *bounds)?
            }
            ScenarioStep::UpdateBounds { window, delta } => {
                self.registry.update_bounds(window, *delta)?
            }
            ScenarioStep::Join(member) => {
                self.join(member)?;
                MoveOutcome::Unchanged
            }
            ScenarioStep::Leave { window } => {
                self.registry.leave(window)?;
                MoveOutcome::Unchanged
            }
            ScenarioStep::Wait { ms } => return self.wait(Duration::from_millis(*ms)).await,
        };
        Ok(vec![outcome])
    }

    /// Sleep for `duration`, serving timer ticks as they arrive
    async fn wait(&mut self, duration: Duration) -> Result<Vec<MoveOutcome>> {
        let Some(ticks) = self.ticks.as_mut() else {
            return Ok(Vec::new());
        };

        let mut outcomes = Vec::new();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                Some(group) = ticks.recv() => {
                    if self.registry.group(group).is_some() {
                        outcomes.push(self.registry.tick(group)?);
                    }
                }
            }
        }
        Ok(outcomes)
    }
}

/// Parse arguments, set up logging and run the requested command
pub async fn run_cli() -> Result<()> {
    let cli = DockGroupCli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let config_path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);
    let config = load_config(&config_path)?;
    debug!("Using engine configuration {:?}", config);

    let executor = DockGroupCliExecutor::new(config, config_path, cli.json);

    if let Err(e) = executor.execute(cli.command).await {
        if cli.json {
            let error_json = serde_json::json!({
                "error": true,
                "message": e.to_string()
            });
            println!("{}", serde_json::to_string_pretty(&error_json)?);
        } else {
            error!("Command failed: {}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    Ok(EngineConfig::load_or_default(path)?.with_env_overrides()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli =
            DockGroupCli::try_parse_from(["dockgroup", "simulate", "drag.toml", "--realtime"]);
        assert!(cli.is_ok());

        match cli.unwrap().command {
            Commands::Simulate(args) => {
                assert_eq!(args.scenario, PathBuf::from("drag.toml"));
                assert!(args.realtime);
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = DockGroupCli::try_parse_from([
            "dockgroup",
            "--verbose",
            "--json",
            "--config",
            "/tmp/engine.toml",
            "config",
            "show",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/engine.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommands {
                action: ConfigActions::Show
            })
        ));
    }

    #[test]
    fn test_config_init_force_flag() {
        let cli = DockGroupCli::try_parse_from(["dockgroup", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommands {
                action: ConfigActions::Init { force: true }
            })
        ));
    }

    #[tokio::test]
    async fn test_simulate_runs_scenario_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drag.toml");
        std::fs::write(
            &path,
            r#"
            [[member]]
            window = "app/a"
            bounds = { x = 0, y = 0, width = 100, height = 100 }
            [[member]]
            window = "app/b"
            bounds = { x = 100, y = 0, width = 100, height = 100 }
            [[step]]
            kind = "changing"
            window = "app/a"
            bounds = { x = 0, y = 0, width = 110, height = 100 }
            [[step]]
            kind = "tick"
            [[step]]
            kind = "end"
            window = "app/a"
            "#,
        )
        .unwrap();

        let executor = DockGroupCliExecutor::new(
            EngineConfig::default(),
            dir.path().join("engine.toml"),
            false,
        );
        let result = executor
            .execute(Commands::Simulate(SimulateArgs {
                scenario: path,
                realtime: false,
            }))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let executor = DockGroupCliExecutor::new(EngineConfig::default(), path.clone(), false);

        let init = || Commands::Config(ConfigCommands {
            action: ConfigActions::Init { force: false },
        });
        assert!(executor.execute(init()).await.is_ok());
        assert!(path.exists());
        assert!(executor.execute(init()).await.is_err());
    }
}
