use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use corpus::{CourseStore, InteractionLog, Level};
use recommenders::CancelFlag;
use server::{
    EngineConfig, Recommendation, RecommendationEngine, RecommendationRequest, Refinement,
    Strategy,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// course-recs - Course Recommendation Engine
#[derive(Parser)]
#[command(name = "course-recs")]
#[command(about = "Course recommendations from topic similarity and learner preference", long_about = None)]
struct Cli {
    /// Course catalogue (JSON array or JSON Lines)
    #[arg(short, long, default_value = "data/demo/courses.json")]
    courses: PathBuf,

    /// Learner interactions (JSON array or JSON Lines)
    #[arg(short, long, default_value = "data/demo/interactions.json")]
    interactions: PathBuf,

    /// Engine configuration file (JSON); defaults apply to missing keys
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Topic,
    Preference,
    Hybrid,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Topic => Strategy::Topic,
            StrategyArg::Preference => Strategy::Preference,
            StrategyArg::Hybrid => Strategy::Hybrid,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Get course recommendations
    Recommend {
        /// Learner to recommend for
        #[arg(long)]
        learner_id: Option<String>,

        /// Free-text topic query
        #[arg(long)]
        query: Option<String>,

        /// Weighted interest, e.g. --interest IT=0.7 (repeatable)
        #[arg(long = "interest", value_parser = parse_interest)]
        interests: Vec<(String, f64)>,

        #[arg(long, value_enum, default_value = "hybrid")]
        strategy: StrategyArg,

        /// Number of recommendations (config default when absent)
        #[arg(long)]
        top_k: Option<usize>,

        /// Topic share of the hybrid blend; preference gets the rest
        #[arg(long)]
        topic_weight: Option<f64>,

        /// Highest course level to include
        #[arg(long)]
        max_level: Option<Level>,

        #[arg(long)]
        domain: Option<String>,

        /// Attribute pin, e.g. --filter duration=short (repeatable)
        #[arg(long = "filter", value_parser = parse_pin)]
        filters: Vec<(String, String)>,

        /// Drop courses the learner already took
        #[arg(long)]
        exclude_taken: bool,

        /// Also suggest which attribute to narrow by next
        #[arg(long)]
        refine: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find courses similar to a course
    Similar {
        #[arg(long)]
        course_id: String,

        #[arg(long, default_value = "10")]
        top_k: usize,
    },

    /// Show the top words of every fitted topic
    Topics {
        #[arg(long, default_value = "8")]
        words: usize,
    },

    /// Show a learner's history and strongest preferences
    Learner {
        #[arg(long)]
        learner_id: String,
    },

    /// Fit both models and write them to a JSON file
    Export {
        #[arg(long, default_value = "models.json")]
        output: PathBuf,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let engine = Arc::new(build_engine(&cli).await?);

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            learner_id,
            query,
            interests,
            strategy,
            top_k,
            topic_weight,
            max_level,
            domain,
            filters,
            exclude_taken,
            refine,
            json,
        } => {
            let mut request = RecommendationRequest {
                strategy: strategy.into(),
                top_k,
                ..RecommendationRequest::default()
            };
            request.learner_id = learner_id;
            request.query_text = query;
            if !interests.is_empty() {
                request.interests = Some(interests.into_iter().collect());
            }
            if let Some(weight) = topic_weight {
                request = request.with_weights(weight, 1.0 - weight);
            }
            request.filters.max_level = max_level;
            request.filters.domain = domain;
            request.filters.attributes = filters.into_iter().collect::<BTreeMap<_, _>>();
            if exclude_taken {
                request = request.with_exclude_interacted(true);
            }
            handle_recommend(&engine, request, refine, json)?
        }
        Commands::Similar { course_id, top_k } => handle_similar(&engine, course_id, top_k)?,
        Commands::Topics { words } => handle_topics(&engine, words)?,
        Commands::Learner { learner_id } => handle_learner(&engine, &learner_id)?,
        Commands::Export { output } => handle_export(&engine, &output)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(engine, requests, concurrent).await?,
    }

    Ok(())
}

/// Load data and config, then fit every recommender
async fn build_engine(cli: &Cli) -> Result<RecommendationEngine> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    println!("Loading courses from {}...", cli.courses.display());
    let start = Instant::now();
    let store = CourseStore::load_from_file(&cli.courses).context("Failed to load courses")?;
    let log = InteractionLog::load_from_file(&cli.interactions)
        .context("Failed to load interactions")?;
    println!(
        "{} Loaded {} courses and {} interactions in {:?}",
        "✓".green(),
        store.len(),
        log.len(),
        start.elapsed()
    );

    let engine = RecommendationEngine::with_data(config, store, log)?;
    let report = engine.fit(CancelFlag::new()).await.context("Failed to fit models")?;
    for model in &report.fitted {
        println!(
            "{} Fitted {} in {}ms (model v{})",
            "✓".green(),
            model.name,
            model.elapsed_ms,
            model.stamp.model_version
        );
    }
    for (name, reason) in &report.failed {
        println!("{} {} unavailable: {}", "!".yellow(), name, reason);
    }
    Ok(engine)
}

/// Handle the 'recommend' command
fn handle_recommend(
    engine: &RecommendationEngine,
    request: RecommendationRequest,
    refine: bool,
    json: bool,
) -> Result<()> {
    let orchestrator = engine.orchestrator();

    if refine {
        let refinement = orchestrator.refine(&request)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&refinement)?);
        } else {
            print_recommendations(&refinement.recommendations);
            print_refinement(&refinement);
        }
        return Ok(());
    }

    let recommendations = orchestrator.recommend(&request)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations);
    }
    Ok(())
}

/// Handle the 'similar' command
fn handle_similar(engine: &RecommendationEngine, course_id: String, top_k: usize) -> Result<()> {
    let corpus = engine.corpus();
    let course = corpus
        .get(&course_id)
        .map_err(|_| anyhow!("Course {} not found", course_id))?;
    println!("{}", format!("Courses similar to '{}':", course.title).bold().blue());

    let request = RecommendationRequest::similar_to(course_id, top_k);
    let recommendations = engine.orchestrator().recommend(&request)?;
    print_recommendations(&recommendations);
    Ok(())
}

/// Handle the 'topics' command
fn handle_topics(engine: &RecommendationEngine, words: usize) -> Result<()> {
    let topics = engine.topic().top_words(words)?;
    println!("{}", format!("{} topics:", topics.len()).bold().blue());
    for (i, topic) in topics.iter().enumerate() {
        let line = topic
            .iter()
            .map(|(word, weight)| format!("{word} ({weight:.3})"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{} {}", format!("#{i}").green(), line);
    }
    Ok(())
}

/// Handle the 'learner' command
fn handle_learner(engine: &RecommendationEngine, learner_id: &str) -> Result<()> {
    let profile = engine
        .learner_profile(learner_id)
        .ok_or_else(|| anyhow!("Learner {} not found", learner_id))?;
    let corpus = engine.corpus();

    println!("{}", format!("Learner ID: {}", learner_id).bold().blue());
    println!("{}Interactions: {}", "• ".green(), profile.interactions().len());
    for interaction in profile.interactions() {
        let title = corpus
            .get(&interaction.course_id)
            .map(|course| course.title.as_str())
            .unwrap_or("(not in catalogue)");
        let strength = interaction
            .strength
            .map(|s| format!(" {s:.1}"))
            .unwrap_or_default();
        println!(
            "  - [{}] {} ({}{})",
            interaction.course_id,
            title,
            interaction.signal.as_str(),
            strength
        );
    }

    let Some(model) = engine.preference().model() else {
        println!("{}Preference model not fitted", "• ".cyan());
        return Ok(());
    };
    if model.is_cold(learner_id) {
        println!("{}No usable history yet (cold start)", "• ".cyan());
        return Ok(());
    }
    if let Some(facets) = model.top_facets(learner_id, 5) {
        println!("Strongest preferences:");
        for (facet, weight) in facets {
            println!("  - {facet}: {weight:.3}");
        }
    }
    Ok(())
}

/// Handle the 'export' command
fn handle_export(engine: &RecommendationEngine, output: &Path) -> Result<()> {
    let written = engine
        .export_models(output)
        .with_context(|| format!("Failed to export models to {}", output.display()))?;
    println!("{} Wrote {} models to {}", "✓".green(), written, output.display());
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    engine: Arc<RecommendationEngine>,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        bail!("requests and concurrent must be positive");
    }
    let orchestrator = engine.orchestrator();

    let learners = engine.learner_ids();
    if learners.is_empty() || engine.corpus().is_empty() {
        bail!("benchmark needs at least one learner and one course");
    }

    const QUERIES: &[&str] = &["python programming", "cooking", "data analysis", "management"];

    let total_start = Instant::now();
    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    let mut failures = 0usize;

    // Fire requests in waves of `concurrent`
    let mut remaining = requests;
    while remaining > 0 {
        let wave = remaining.min(concurrent);
        let mut handles = Vec::with_capacity(wave);
        for _ in 0..wave {
            let learner = learners[rand::random::<u32>() as usize % learners.len()].clone();
            let query = QUERIES[rand::random::<u32>() as usize % QUERIES.len()];
            let request = RecommendationRequest::hybrid(learner, query, 10);
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                let start = Instant::now();
                let result = orchestrator.recommend_async(request).await;
                (start.elapsed(), result.is_ok())
            }));
        }
        for handle in handles {
            let (elapsed, ok) = handle.await?;
            timings.push(elapsed);
            if !ok {
                failures += 1;
            }
        }
        remaining -= wave;
    }
    let wall_time = total_start.elapsed();

    let total_time: Duration = timings.iter().sum();
    let avg_latency = total_time / (timings.len() as u32);
    timings.sort();
    let percentile = |p: f32| timings[((timings.len() as f32 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f32 / wall_time.as_secs_f32();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);
    if failures > 0 {
        println!("{} {} requests failed", "!".yellow(), failures);
    }

    Ok(())
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[Recommendation]) {
    print!("{}", "Course Recommendations:\n".bold().blue());
    if recommendations.is_empty() {
        println!("  (no courses left after filtering)");
    }
    for (i, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. [{}] {} - Score: {:.3} ({})",
            (i + 1).to_string().green(),
            rec.course_id,
            rec.title,
            rec.score,
            rec.source
        );
    }
}

fn print_refinement(refinement: &Refinement) {
    if !refinement.applied_filters.is_empty() {
        let pins = refinement
            .applied_filters
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}Applied: {}", "• ".cyan(), pins);
    }
    if !refinement.remaining_facets.is_empty() {
        println!(
            "{}Open attributes: {}",
            "• ".cyan(),
            refinement.remaining_facets.join(", ")
        );
    }
    match &refinement.suggested_split {
        Some(facet) => println!("{}Narrow by '{}' next", "• ".cyan(), facet),
        None => println!("{}Nothing left to narrow by", "• ".cyan()),
    }
}

/// Parse `name=value`
fn parse_pin(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Parse `label=weight`
fn parse_interest(raw: &str) -> Result<(String, f64), String> {
    let (label, weight) = parse_pin(raw)?;
    let weight = weight
        .parse::<f64>()
        .map_err(|e| format!("bad weight in '{raw}': {e}"))?;
    Ok((label, weight))
}
