//! ModelRoute CLI - Command line interface for the routing engine.

use std::collections::HashMap;

use clap::{Args, Parser, Subcommand};
use tonic::transport::Channel;

use modelroute_core::{
    BackendId, Context, Priority, SessionId, Task, TaskId, TaskStatus, TaskType,
};
use modelroute_proto::convert::backend_from_wire;
use modelroute_proto::pb;
use modelroute_proto::ModelRouterClient;

/// ModelRoute CLI - Task routing client
#[derive(Parser)]
#[command(name = "modelroute")]
#[command(about = "CLI for the ModelRoute routing engine", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "http://[::1]:50051")]
    addr: String,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task and wait for its result
    Process(TaskArgs),

    /// Submit a task and follow its progress
    Stream(TaskArgs),

    /// Show what a backend can do
    Capabilities {
        /// Backend name (friday, deepseek, huginn, mixtral, phi)
        model: BackendId,
    },

    /// Merge metadata into a session's running context
    #[command(name = "update-context")]
    UpdateContext {
        /// Session ID
        #[arg(short, long, default_value = SessionId::DEFAULT)]
        session: String,

        /// Metadata entry as key=value (repeatable)
        #[arg(short, long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Confidence trend to store; the session's running value is kept if unset
        #[arg(long)]
        confidence: Option<f64>,
    },
}

#[derive(Args)]
struct TaskArgs {
    /// Task type (explanation, generation, debugging, test-generation,
    /// documentation, general-conversation)
    #[arg(short = 't', long = "type")]
    task_type: TaskType,

    /// Task input
    #[arg(short, long)]
    input: String,

    /// Task ID; generated by the server if omitted
    #[arg(long)]
    id: Option<String>,

    /// Session ID
    #[arg(short, long, default_value = SessionId::DEFAULT)]
    session: String,

    /// Preferred backend
    #[arg(short, long)]
    model: Option<BackendId>,

    /// Minimum acceptable confidence
    #[arg(long, default_value_t = Task::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Priority (low, medium, high)
    #[arg(short, long, default_value = "medium")]
    priority: Priority,

    /// Task that must complete first (repeatable)
    #[arg(long = "depends-on")]
    dependencies: Vec<String>,
}

impl TaskArgs {
    fn into_wire(self) -> pb::Task {
        let mut task = Task::new(self.task_type, self.input)
            .with_priority(self.priority)
            .with_threshold(self.threshold)
            .with_context(Context::new(SessionId::new(self.session)));
        task.preferred_backend = self.model;
        task.dependencies = self.dependencies.into_iter().map(TaskId::new).collect();

        let mut wire = pb::Task::from(task);
        // Let the server generate the id unless one was given.
        wire.task_id = self.id.unwrap_or_default();
        wire
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let channel = Channel::from_shared(cli.addr)?.connect().await?;

    match cli.command {
        Commands::Process(args) => {
            process_task(channel, args, cli.json).await?;
        }
        Commands::Stream(args) => {
            stream_task(channel, args, cli.json).await?;
        }
        Commands::Capabilities { model } => {
            get_capabilities(channel, model, cli.json).await?;
        }
        Commands::UpdateContext {
            session,
            metadata,
            confidence,
        } => {
            update_context(channel, session, metadata, confidence, cli.json).await?;
        }
    }

    Ok(())
}

async fn process_task(
    channel: Channel,
    args: TaskArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ModelRouterClient::new(channel);

    let response = client.process_task(args.into_wire()).await?;
    let result = response.into_inner();

    if json {
        println!("{}", serde_json::to_string_pretty(&result_json(&result))?);
    } else {
        print_result(&result);
    }

    Ok(())
}

async fn stream_task(
    channel: Channel,
    args: TaskArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ModelRouterClient::new(channel);

    let response = client.stream_task_progress(args.into_wire()).await?;
    let mut stream = response.into_inner();

    while let Some(message) = stream.message().await? {
        if json {
            println!("{}", serde_json::to_string(&result_json(&message))?);
            continue;
        }

        let status = status_name(message.status);
        if is_terminal(message.status) {
            print_result(&message);
        } else {
            let backend = backend_name(message.executed_by);
            match &message.error_message {
                Some(reason) => {
                    println!("[{status}] attempt {} on {backend}: {reason}", message.attempt)
                }
                None => println!("[{status}] attempt {} on {backend}", message.attempt),
            }
        }
    }

    Ok(())
}

async fn get_capabilities(
    channel: Channel,
    model: BackendId,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ModelRouterClient::new(channel);

    let request = pb::GetModelCapabilitiesRequest {
        model_type: pb::ModelType::from(model) as i32,
    };

    let response = client.get_model_capabilities(request).await?;
    let caps = response.into_inner();

    let tasks: Vec<String> = caps
        .supported_tasks
        .iter()
        .map(|t| task_type_name(*t))
        .collect();

    if json {
        let value = serde_json::json!({
            "model": backend_name(caps.model_type),
            "supported_tasks": tasks,
            "min_confidence": caps.min_confidence,
            "max_confidence": caps.max_confidence,
            "max_tokens": caps.max_tokens,
            "average_latency_ms": caps.average_latency_ms,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("  Model:        {}", backend_name(caps.model_type));
    println!("  Tasks:        {}", tasks.join(", "));
    println!(
        "  Confidence:   {:.2} - {:.2}",
        caps.min_confidence, caps.max_confidence
    );
    println!("  Max tokens:   {}", caps.max_tokens);
    println!("  Avg latency:  {} ms", caps.average_latency_ms);

    Ok(())
}

async fn update_context(
    channel: Channel,
    session: String,
    metadata: Vec<(String, String)>,
    confidence: Option<f64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ModelRouterClient::new(channel);

    let request = pb::Context {
        session_id: session,
        previous_tasks: Vec::new(),
        metadata: metadata.into_iter().collect::<HashMap<_, _>>(),
        confidence_score: confidence,
        relevant_documents: Vec::new(),
    };

    let response = client.update_context(request).await?;
    let context = response.into_inner();

    if json {
        println!("{}", serde_json::to_string_pretty(&context_json(&context))?);
    } else {
        println!("Context updated:");
        print_context(&context);
    }

    Ok(())
}

fn print_result(result: &pb::TaskResult) {
    println!("  Task:        {}", result.task_id);
    println!("  Status:      {}", status_name(result.status));
    println!("  Backend:     {}", backend_name(result.executed_by));
    println!("  Confidence:  {:.2}", result.confidence_score);
    if let Some(error) = &result.error_message {
        println!("  Error:       {error}");
    }
    if !result.output.is_empty() {
        println!();
        println!("{}", result.output);
    }
}

fn print_context(context: &pb::Context) {
    println!("  Session:     {}", context.session_id);
    println!("  Confidence:  {:.2}", context.confidence_score.unwrap_or_default());
    println!("  Tasks:       {}", context.previous_tasks.len());

    let mut keys: Vec<&String> = context.metadata.keys().collect();
    keys.sort();
    if !keys.is_empty() {
        println!("  Metadata:");
        for key in keys {
            println!("    {key} = {}", context.metadata[key]);
        }
    }
}

fn result_json(result: &pb::TaskResult) -> serde_json::Value {
    serde_json::json!({
        "task_id": result.task_id,
        "status": status_name(result.status),
        "attempt": result.attempt,
        "success": result.success,
        "output": result.output,
        "confidence_score": result.confidence_score,
        "executed_by": backend_name(result.executed_by),
        "error_message": result.error_message,
        "updated_context": result.updated_context.as_ref().map(context_json),
    })
}

fn context_json(context: &pb::Context) -> serde_json::Value {
    serde_json::json!({
        "session_id": context.session_id,
        "previous_tasks": context.previous_tasks,
        "metadata": context.metadata,
        "confidence_score": context.confidence_score,
        "relevant_documents": context.relevant_documents,
    })
}

fn is_terminal(status: i32) -> bool {
    pb::TaskStatus::try_from(status)
        .map(|s| TaskStatus::from(s).is_terminal())
        .unwrap_or(false)
}

fn status_name(status: i32) -> &'static str {
    match pb::TaskStatus::try_from(status) {
        Ok(pb::TaskStatus::Unspecified) | Err(_) => "UNKNOWN",
        Ok(status) => TaskStatus::from(status).as_str(),
    }
}

fn backend_name(model: i32) -> &'static str {
    match backend_from_wire(model) {
        Ok(Some(backend)) => backend.as_str(),
        Ok(None) => "-",
        Err(_) => "unknown",
    }
}

fn task_type_name(task_type: i32) -> String {
    pb::TaskType::try_from(task_type)
        .ok()
        .and_then(|t| TaskType::try_from(t).ok())
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("lang=rust").unwrap(),
            ("lang".to_string(), "rust".to_string())
        );
        assert_eq!(
            parse_key_value("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_task_args_to_wire() {
        let cli = Cli::try_parse_from([
            "modelroute",
            "process",
            "--type",
            "test-generation",
            "--input",
            "cover the parser",
            "--model",
            "deepseek",
            "--depends-on",
            "t1",
        ])
        .unwrap();
        let Commands::Process(args) = cli.command else {
            panic!("expected process");
        };

        let wire = args.into_wire();
        assert!(wire.task_id.is_empty());
        assert_eq!(wire.task_type, pb::TaskType::TestGeneration as i32);
        assert_eq!(wire.preferred_model, Some(pb::ModelType::Deepseek as i32));
        assert_eq!(wire.dependencies, vec!["t1".to_string()]);
        assert_eq!(wire.context.unwrap().session_id, SessionId::DEFAULT);
    }

    #[test]
    fn test_update_context_confidence_is_optional() {
        let cli = Cli::try_parse_from(["modelroute", "update-context", "--meta", "lang=rust"]).unwrap();
        let Commands::UpdateContext { confidence, metadata, .. } = cli.command else {
            panic!("expected update-context");
        };
        assert_eq!(confidence, None);
        assert_eq!(metadata, vec![("lang".to_string(), "rust".to_string())]);

        let cli = Cli::try_parse_from(["modelroute", "update-context", "--confidence", "0.4"]).unwrap();
        let Commands::UpdateContext { confidence, .. } = cli.command else {
            panic!("expected update-context");
        };
        assert_eq!(confidence, Some(0.4));
    }
}
