use corpus::{CourseId, CourseStore, InteractionLog};
use recommenders::{
    CancelFlag, FitInput, PreferenceRecommender, Recommender, ScoreQuery, TopicRecommender,
};
use std::path::Path;
use std::time::Instant;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("info,recommenders=debug")
        .init();

    let store = CourseStore::load_from_file(Path::new("data/demo/courses.json"))
        .expect("Failed to load courses");
    let log = InteractionLog::load_from_file(Path::new("data/demo/interactions.json"))
        .expect("Failed to load interactions");
    let input = FitInput {
        corpus: &store,
        interactions: &log,
    };

    let topic = TopicRecommender::new().with_n_topics(4);
    let preference = PreferenceRecommender::new();

    let start = Instant::now();
    topic.fit(&input, &CancelFlag::new()).expect("topic fit failed");
    preference
        .fit(&input, &CancelFlag::new())
        .expect("preference fit failed");
    println!("Fitted both models in {:?}", start.elapsed());

    let candidates: Vec<CourseId> = store.ids().cloned().collect();

    let outcome = topic
        .score(&ScoreQuery::text("python data analysis"), &candidates)
        .expect("topic scoring failed");
    print_scores("Topic: \"python data analysis\"", &store, outcome.scores());

    let outcome = preference
        .score(&ScoreQuery::learner("1"), &candidates)
        .expect("preference scoring failed");
    print_scores("Preference: learner 1", &store, outcome.scores());
}

fn print_scores(
    header: &str,
    store: &CourseStore,
    scores: Option<&std::collections::HashMap<CourseId, f64>>,
) {
    println!("\n{header}");
    let Some(scores) = scores else {
        println!("  (unavailable)");
        return;
    };
    let mut ranked: Vec<(&CourseId, &f64)> = scores.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (id, score) in ranked {
        let title = store.get(id).map(|c| c.title.as_str()).unwrap_or("?");
        println!("  {score:.3}  [{id}] {title}");
    }
}
