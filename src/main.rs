use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use flagged_harness::{
    browser::BrowserOptions,
    report::writer::ReportWriter,
    runner::{RunnerOptions, run_scenario},
    scenario::{Scenario, builtin},
    target::Target,
    wait::Timeout,
};

#[derive(Parser)]
#[command(version, about)]
struct CLI {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Checks the header and initial message of a fresh load.
    Lobby {
        #[arg(default_value = "index.html")]
        target: Target,
        #[command(flatten)]
        options: Options,
    },
    /// Checks the minigame spinner and the loading overlay.
    Spinner {
        #[arg(default_value = "index.html")]
        target: Target,
        #[command(flatten)]
        options: Options,
    },
    /// Runs every built-in scenario, each in its own browser.
    All {
        #[arg(default_value = "index.html")]
        target: Target,
        #[command(flatten)]
        options: Options,
    },
    /// Runs a scenario described in a JSON file.
    Run {
        scenario: PathBuf,
        #[command(flatten)]
        options: Options,
    },
}

#[derive(clap::Args)]
struct Options {
    #[arg(long, default_value_t = false)]
    headful: bool,
    #[arg(long, default_value_t = false)]
    no_sandbox: bool,
    #[arg(long, default_value_t = 1280)]
    width: u16,
    #[arg(long, default_value_t = 720)]
    height: u16,
    /// Chrome or Chromium binary to launch.
    #[arg(long)]
    chrome: Option<PathBuf>,
    #[arg(long, default_value = "jules-scratch/verification")]
    output_dir: PathBuf,
    /// Timeout for wait steps that don't set their own.
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,
    #[arg(long, default_value_t = 30_000)]
    navigation_timeout_ms: u64,
    /// Append a JSON line per executed step to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Options {
    fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            headless: !self.headful,
            no_sandbox: self.no_sandbox,
            width: self.width,
            height: self.height,
            navigation_timeout: Timeout(self.navigation_timeout_ms),
            executable: self.chrome.clone(),
        }
    }

    fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            output_directory: self.output_dir.clone(),
            default_timeout: Timeout(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_target(true)
        .init();
    let cli = CLI::parse();
    let (options, runs) = match cli.command {
        Command::Lobby { target, options } => {
            let runs =
                vec![(builtin::lobby(&target.url), options.runner_options())];
            (options, runs)
        }
        Command::Spinner { target, options } => {
            let runs =
                vec![(builtin::spinner(&target.url), options.runner_options())];
            (options, runs)
        }
        Command::All { target, options } => {
            // Both scenarios write verification.png, so each gets its own
            // directory.
            let runs = [builtin::LOBBY, builtin::SPINNER]
                .into_iter()
                .filter_map(|name| builtin::by_name(name, &target.url))
                .map(|scenario| {
                    let mut runner_options = options.runner_options();
                    runner_options.output_directory =
                        runner_options.output_directory.join(&scenario.name);
                    (scenario, runner_options)
                })
                .collect();
            (options, runs)
        }
        Command::Run { scenario, options } => {
            let scenario = Scenario::from_path(&scenario).await?;
            let runs = vec![(scenario, options.runner_options())];
            (options, runs)
        }
    };

    let browser_options = options.browser_options();
    let mut report = match &options.report {
        Some(path) => Some(ReportWriter::initialize(path).await?),
        None => None,
    };

    let mut failed = 0;
    for (scenario, runner_options) in &runs {
        let result =
            run_scenario(scenario, runner_options, &browser_options).await?;
        if let Some(report) = report.as_mut() {
            report.write(&result).await?;
        }
        match &result.failure {
            None => println!("{}: passed", result.name),
            Some(failure) => {
                failed += 1;
                println!("{}: FAILED", result.name);
                eprintln!("{}: {}", result.name, failure);
            }
        }
    }

    if failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}
