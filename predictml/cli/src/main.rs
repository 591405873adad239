use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use predictml_features::{ModelFamily, PredictionInput};
use predictml_history::{
    HistoryStats, JsonlPredictionStore, ModelVersionRegistry, PredictionRecorder, PredictionStore,
};
use predictml_inference::{catalogue, ArtifactBundle, ErrorClass, PredictionPipeline};
use serde_json::{json, Value};
use shared_event_bus::FileEventPublisher;
use shared_telemetry::{LogLevel, Telemetry};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Runtime,
    task::{JoinError, JoinSet},
};
use uuid::Uuid;

/// Service configuration.
#[path = "../config.rs"]
mod config;

use config::ServiceConfig;

#[derive(Parser, Debug)]
#[command(
    name = "predictml",
    version,
    about = "House price, salary, crop yield, stock and weather predictions"
)]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "predictml.toml")]
    config: PathBuf,
    /// Overrides `artifact_dir`.
    #[arg(long, global = true)]
    artifact_dir: Option<PathBuf>,
    /// Overrides `history_dir`.
    #[arg(long, global = true)]
    history_dir: Option<PathBuf>,
    /// Overrides `log_level`.
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs one prediction and prints the result.
    Predict {
        /// house_price, salary, crop_yield, stock or weather.
        #[arg(long)]
        model: ModelFamily,
        /// Inline JSON payload.
        #[arg(long, conflicts_with = "file")]
        json: Option<String>,
        /// Payload file. Without `--json` or `--file` the payload is read from stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Reads JSON requests from stdin, one per line, and answers each on stdout.
    Stream {
        /// Requests in flight at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Lists the model catalogue with registered versions.
    Models,
    /// Prints feature importance for a model.
    Importance {
        /// Model name.
        model: String,
    },
    /// Prints recent predictions, newest first.
    History {
        /// Restricts output to one model.
        #[arg(long)]
        model: Option<ModelFamily>,
        /// Number of records.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Prints per-model prediction statistics.
    Stats,
    /// Reports loaded models and storage locations.
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ServiceConfig::load_or_default(&cli.config)?;
    if let Some(dir) = cli.artifact_dir {
        config.artifact_dir = dir;
    }
    if let Some(dir) = cli.history_dir {
        config.history_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    let runtime = Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(dispatch(cli.command, config))
}

async fn dispatch(command: Commands, config: ServiceConfig) -> Result<()> {
    match command {
        Commands::Predict { model, json, file } => {
            let payload = read_payload(json, file)?;
            let input = PredictionInput::from_value(model, payload)
                .with_context(|| format!("invalid {model} request"))?;
            let service = Service::start(&config)?;
            predict(service, &input, &mut io::stdout()).await
        }
        Commands::Stream { concurrency } => {
            let limit = concurrency.unwrap_or(config.stream_concurrency).max(1);
            let service = Service::start(&config)?;
            let streamed = stream(&service, limit).await;
            service.shutdown().await;
            streamed
        }
        Commands::Models => {
            let telemetry = build_telemetry(&config)?;
            let bundle = load_bundle(&config, &telemetry)?;
            let registry = open_registry(&config, &bundle, &telemetry)?;
            let models: Vec<Value> = catalogue::entries()
                .into_iter()
                .map(|entry| {
                    let descriptor = registry.get(entry.model.as_str());
                    json!({ "catalogue": entry, "version": descriptor })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&models)?);
            Ok(())
        }
        Commands::Importance { model } => {
            let family: ModelFamily = model
                .parse()
                .with_context(|| format!("model '{model}' not found"))?;
            let Some(importance) = catalogue::feature_importance(family) else {
                bail!("feature importance is not available for {family}");
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "model": family,
                    "feature_importance": importance,
                }))?
            );
            Ok(())
        }
        Commands::History { model, limit } => {
            let store = JsonlPredictionStore::open(config.history_file())?
                .with_telemetry(build_telemetry(&config)?.child("history"));
            let records = store.recent(model.map(ModelFamily::as_str), limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Commands::Stats => {
            let store = JsonlPredictionStore::open(config.history_file())?
                .with_telemetry(build_telemetry(&config)?.child("history"));
            let stats = HistoryStats::from_records(&store.load_all()?);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Health => {
            let telemetry = build_telemetry(&config)?;
            let bundle = load_bundle(&config, &telemetry)?;
            let registry = open_registry(&config, &bundle, &telemetry)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "status": "healthy",
                    "models": bundle.health(),
                    "registered_versions": registry.list().len(),
                    "history": config.history_file(),
                }))?
            );
            Ok(())
        }
    }
}

/// Everything a prediction command needs, wired once at startup.
struct Service {
    telemetry: Telemetry,
    pipeline: Arc<PredictionPipeline>,
    recorder: PredictionRecorder,
}

impl Service {
    fn start(config: &ServiceConfig) -> Result<Self> {
        let telemetry = build_telemetry(config)?;
        let bundle = Arc::new(load_bundle(config, &telemetry)?);
        open_registry(config, &bundle, &telemetry)?;
        let store = Arc::new(
            JsonlPredictionStore::open(config.history_file()).with_context(|| {
                format!("opening prediction log {}", config.history_file().display())
            })?
            .with_telemetry(telemetry.child("history")),
        );
        Ok(Self::assemble(telemetry, bundle, store))
    }

    fn assemble(
        telemetry: Telemetry,
        bundle: Arc<ArtifactBundle>,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        let recorder = PredictionRecorder::spawn(store, telemetry.child("recorder"));
        let pipeline = Arc::new(PredictionPipeline::new(
            bundle,
            Some(Arc::new(recorder.handle())),
            telemetry.child("pipeline"),
        ));
        Self {
            telemetry,
            pipeline,
            recorder,
        }
    }

    /// Stops the recorder. Failures are logged; answers already produced stand.
    async fn shutdown(self) {
        let Self {
            telemetry,
            pipeline,
            recorder,
        } = self;
        drop(pipeline);
        let (level, message, metadata) = match recorder.close().await {
            Ok(summary) => (
                LogLevel::Info,
                "recorder.closed",
                json!({ "recorded": summary.recorded, "failed": summary.failed }),
            ),
            Err(err) => (
                LogLevel::Error,
                "recorder.close_failed",
                json!({ "error": err.to_string() }),
            ),
        };
        if let Err(err) = telemetry.log(level, message, metadata) {
            eprintln!("{message}: telemetry unavailable: {err:#}");
        }
    }
}

/// Runs one request, writes the result, then shuts the service down.
async fn predict(service: Service, input: &PredictionInput, out: &mut impl Write) -> Result<()> {
    let answered = match service.pipeline.run(input) {
        Ok(result) => serde_json::to_string_pretty(&result)
            .map_err(anyhow::Error::from)
            .and_then(|body| writeln!(out, "{body}").map_err(anyhow::Error::from)),
        Err(err) => Err(anyhow!("{} error: {err}", class_name(err.class()))),
    };
    service.shutdown().await;
    answered
}

fn build_telemetry(config: &ServiceConfig) -> Result<Telemetry> {
    let mut builder = Telemetry::builder("predictml").min_level(config.log_level);
    if let Some(path) = &config.log_path {
        builder = builder.log_path(path);
    }
    if let Some(path) = &config.event_log {
        builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
    }
    builder.build()
}

fn load_bundle(config: &ServiceConfig, telemetry: &Telemetry) -> Result<ArtifactBundle> {
    let bundle = ArtifactBundle::load_dir(&config.artifact_dir).with_context(|| {
        format!(
            "loading model artifacts from {}",
            config.artifact_dir.display()
        )
    })?;
    telemetry.log(
        LogLevel::Info,
        "artifacts.loaded",
        json!({ "dir": config.artifact_dir, "models": bundle.health() }),
    )?;
    Ok(bundle)
}

fn open_registry(
    config: &ServiceConfig,
    bundle: &ArtifactBundle,
    telemetry: &Telemetry,
) -> Result<ModelVersionRegistry> {
    let path = config.registry_file();
    let registry = ModelVersionRegistry::open(&path)
        .with_context(|| format!("opening version registry {}", path.display()))?;
    let created = registry.ensure(bundle.version_seeds())?;
    if created > 0 {
        telemetry.log(
            LogLevel::Info,
            "registry.seeded",
            json!({ "created": created }),
        )?;
    }
    Ok(registry)
}

fn read_payload(inline: Option<String>, file: Option<PathBuf>) -> Result<Value> {
    let raw = match (inline, file) {
        (Some(raw), _) => raw,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("reading payload {}", path.display()))?,
        (None, None) => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("reading payload from stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("payload is not valid JSON")
}

async fn stream(service: &Service, limit: usize) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if in_flight.len() >= limit {
            if let Some(response) = in_flight.join_next().await {
                println!("{}", settle(response, &service.telemetry));
            }
        }
        let pipeline = Arc::clone(&service.pipeline);
        in_flight.spawn(async move { respond(&pipeline, &line) });
    }
    while let Some(response) = in_flight.join_next().await {
        println!("{}", settle(response, &service.telemetry));
    }
    Ok(())
}

/// Answers one stream line. The response always carries the request id; a missing id is
/// replaced by a generated one.
fn respond(pipeline: &PredictionPipeline, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return failure(
                Value::String(new_request_id()),
                ErrorClass::Client,
                &format!("request is not valid JSON: {err}"),
            )
        }
    };
    let id = request
        .get("id")
        .cloned()
        .unwrap_or_else(|| Value::String(new_request_id()));
    let input: PredictionInput = match serde_json::from_value(request) {
        Ok(input) => input,
        Err(err) => return failure(id, ErrorClass::Client, &format!("invalid request: {err}")),
    };
    match pipeline.run(&input) {
        Ok(result) => json!({ "id": id, "ok": true, "result": result }),
        Err(err) => failure(id, err.class(), &err.to_string()),
    }
}

/// A request task that died becomes an internal failure line; the stream keeps going.
fn settle(response: Result<Value, JoinError>, telemetry: &Telemetry) -> Value {
    response.unwrap_or_else(|err| {
        let reason = format!("request handler failed: {err}");
        let _ = telemetry.log(
            LogLevel::Error,
            "prediction.failed",
            json!({ "class": ErrorClass::Internal, "error": reason }),
        );
        failure(Value::String(new_request_id()), ErrorClass::Internal, &reason)
    })
}

fn failure(id: Value, class: ErrorClass, reason: &str) -> Value {
    json!({ "id": id, "ok": false, "error": { "class": class, "reason": reason } })
}

fn new_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

const fn class_name(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::Client => "client",
        ErrorClass::Internal => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predictml_history::{HistoryError, PredictionRecord};
    use std::path::Path;
    use tempfile::tempdir;

    fn bundle() -> Arc<ArtifactBundle> {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../inference/artifacts");
        Arc::new(ArtifactBundle::load_dir(dir).unwrap())
    }

    fn pipeline() -> PredictionPipeline {
        PredictionPipeline::new(bundle(), None, Telemetry::disabled("cli"))
    }

    /// Store whose writes bring the recorder worker down.
    struct PanickingStore;

    impl PredictionStore for PanickingStore {
        fn append(&self, _record: &PredictionRecord) -> Result<(), HistoryError> {
            panic!("store backend vanished");
        }

        fn load_all(&self) -> Result<Vec<PredictionRecord>, HistoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prediction_is_printed_when_recorder_dies() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("predictml.log");
        let telemetry = Telemetry::builder("predictml")
            .log_path(&log_path)
            .build()
            .unwrap();
        let service = Service::assemble(telemetry, bundle(), Arc::new(PanickingStore));
        let input = PredictionInput::from_value(
            ModelFamily::Salary,
            json!({
                "experience_years": 4,
                "education_level": "bachelor",
                "job_type": "it",
                "city_tier": 1,
                "skills": ["rust", "sql"]
            }),
        )
        .unwrap();
        let mut out = Vec::new();
        predict(service, &input, &mut out).await.unwrap();
        let printed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["model"], "salary");
        assert_eq!(printed["details"]["skill_bonus"], 10000.0);
        let log = fs::read_to_string(log_path).unwrap();
        assert!(log.contains("recorder.close_failed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dead_request_task_becomes_internal_failure() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { panic!("handler blew up") });
        let joined = tasks.join_next().await.unwrap();
        let line = settle(joined, &Telemetry::disabled("cli"));
        assert_eq!(line["ok"], false);
        assert_eq!(line["error"]["class"], "internal");
        assert!(line["id"].as_str().unwrap().starts_with("req-"));

        let mut tasks = JoinSet::new();
        tasks.spawn(async { json!({ "id": 1, "ok": true }) });
        let joined = tasks.join_next().await.unwrap();
        assert_eq!(settle(joined, &Telemetry::disabled("cli"))["ok"], true);
    }

    #[test]
    fn stream_response_echoes_id() {
        let pipeline = pipeline();
        let response = respond(
            &pipeline,
            r#"{"id": 7, "model": "salary", "experience_years": 5, "education_level": "master", "job_type": "finance", "city_tier": 1, "skills": ["sql"]}"#,
        );
        assert_eq!(response["id"], 7);
        assert_eq!(response["ok"], true);
        assert_eq!(response["result"]["model"], "salary");
        assert_eq!(response["result"]["details"]["skill_bonus"], 5000.0);
    }

    #[test]
    fn stream_errors_are_classified() {
        let pipeline = pipeline();
        let invalid_location = respond(
            &pipeline,
            r#"{"id": "a", "model": "house_price", "city": "Pune", "area_sqft": 900, "bedrooms": 2, "bathrooms": 1, "age": 3, "location_rating": 3.5, "location": "orbit"}"#,
        );
        assert_eq!(invalid_location["ok"], false);
        assert_eq!(invalid_location["error"]["class"], "client");
        let unknown_model = respond(&pipeline, r#"{"id": "b", "model": "lottery"}"#);
        assert_eq!(unknown_model["id"], "b");
        assert_eq!(unknown_model["error"]["class"], "client");
        let garbage = respond(&pipeline, "not json");
        assert!(garbage["id"].as_str().unwrap().starts_with("req-"));
    }

    #[test]
    fn cli_parses_predict_arguments() {
        let cli = Cli::try_parse_from([
            "predictml",
            "predict",
            "--model",
            "crop",
            "--json",
            "{}",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        match cli.command {
            Commands::Predict { model, json, file } => {
                assert_eq!(model, ModelFamily::CropYield);
                assert_eq!(json.as_deref(), Some("{}"));
                assert!(file.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["predictml", "predict", "--model", "lottery"]).is_err());
    }
}
