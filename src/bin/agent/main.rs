use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use screen_pilot::artifacts::ScreenshotStore;
use screen_pilot::brain::ChatModel;
use screen_pilot::config::{Args, Backend, Config};
use screen_pilot::hands::SessionProvider;
use screen_pilot::hands::chrome::ChromeProvider;
use screen_pilot::hands::hosted::HostedProvider;
use screen_pilot::report::TaskReport;
use screen_pilot::workflow::KeywordWorkflow;
use screen_pilot::{Agent, AgentEvent, Termination};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_args(args)?;
    let json_output = config.json;

    let provider: Box<dyn SessionProvider> = match config.backend {
        Backend::Hosted => Box::new(HostedProvider::new(&config.api_base, &config.api_key)?),
        Backend::Chrome => Box::new(ChromeProvider::new(config.chrome.clone())),
    };
    let model = ChatModel::new(&config.model_base, &config.api_key, &config.model)?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let mut agent = Agent::new(provider, Box::new(model))
        .with_options(config.options.clone())
        .with_events(event_tx);
    if config.workflow {
        agent = agent.with_workflow(Box::new(KeywordWorkflow::default()));
    }
    if let Some(dir) = &config.screenshot_dir {
        agent = agent.with_screenshots(ScreenshotStore::new(dir));
    }

    let run = agent.run(&config.task).await;
    drop(agent);
    printer.await?;

    match &run.termination {
        Termination::Success { report, .. } => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                print_banner(report, run.steps);
            }
        }
        Termination::Exhausted => {
            println!("Stopped after {} steps without finishing.", run.steps);
        }
        Termination::Aborted(_) => {}
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Step { number, decision } => println!("Step {number}: {decision}"),
        AgentEvent::StepSkipped { number, message } => {
            println!("Step {number} skipped: {message}")
        }
        AgentEvent::TaskComplete { result } => println!("Task complete: {result}"),
        AgentEvent::TaskError { message } => println!("Task failed: {message}"),
        AgentEvent::StepLimit { max_steps } => {
            println!("Reached maximum step limit ({max_steps})")
        }
    }
}

fn print_banner(report: &TaskReport, steps: usize) {
    println!();
    println!("================ RESULT ================");
    println!("Status:   {:?}", report.status);
    if let Some(price) = report.price {
        println!("Price:    ${price:.2}");
    }
    if let Some(quantity) = report.quantity {
        println!("Quantity: {quantity}");
    }
    println!("Steps:    {steps}");
    println!("Message:  {}", report.message);
    println!("========================================");
}
