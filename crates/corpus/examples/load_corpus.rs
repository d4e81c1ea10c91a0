use corpus::{CourseStore, InteractionLog};
use std::path::Path;
use std::time::Instant;

fn main() {
    let courses_path = Path::new("data/demo/courses.json");
    let interactions_path = Path::new("data/demo/interactions.json");

    println!("Loading demo corpus...\n");

    let start = Instant::now();
    let store = CourseStore::load_from_file(courses_path).expect("Failed to load courses");
    let log =
        InteractionLog::load_from_file(interactions_path).expect("Failed to load interactions");
    let elapsed = start.elapsed();

    println!("=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Courses: {} (corpus version {})", store.len(), store.version());
    println!("Learners: {}", log.learner_count());
    println!("Interactions: {}", log.len());

    for course in store.all() {
        println!("  [{}] {} {:?}", course.id, course.title, course.categories);
    }
}
