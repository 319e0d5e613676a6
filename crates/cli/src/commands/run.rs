//! `maestro run` — Route one request through the orchestrator.

use clap::Args;
use maestro_orchestrator::OrchestrationRequest;
use maestro_telemetry::ExportFormat;
use std::path::Path;

#[derive(Args)]
pub struct RunArgs {
    /// Request text
    #[arg(short, long)]
    message: String,

    /// Response strategy (quick_reply, deep_reason, defer, ignore)
    #[arg(short, long)]
    strategy: Option<String>,

    /// Operation tag, used when no strategy is given (e.g. think, recall)
    #[arg(short, long)]
    operation: Option<String>,

    /// Confidence in the strategy, 0.0 to 1.0
    #[arg(long)]
    confidence: Option<f64>,

    /// Workflow template to run (quick, complex, ...)
    #[arg(short, long)]
    workflow: Option<String>,

    /// Tool parameters as a JSON object
    #[arg(short, long)]
    params: Option<String>,

    /// User id recorded in the trace
    #[arg(long, default_value = "cli")]
    user: String,

    /// Also print this session's traces (json, jsonl, csv)
    #[arg(short, long)]
    export: Option<ExportFormat>,
}

pub async fn run(config: Option<&Path>, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = super::orchestrator(config)?;

    let mut request = OrchestrationRequest::new(args.user, args.message);
    request.strategy = args.strategy;
    request.operation = args.operation;
    request.confidence = args.confidence;
    request.workflow = args.workflow;
    if let Some(raw) = args.params {
        request.params =
            serde_json::from_str(&raw).map_err(|e| format!("Invalid --params JSON: {e}"))?;
    }

    let result = orchestrator.handle(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(format) = args.export {
        // The tracer holds only this run's session.
        println!();
        print!("{}", orchestrator.tracer().export_traces(format, 1)?);
    }

    orchestrator.shutdown();
    Ok(())
}
