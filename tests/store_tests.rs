// tests/store_tests.rs
//
// Run against a disposable Postgres:
//   DATABASE_URL=postgres://... cargo test --test store_tests -- --ignored

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tutor::{
    models::learning_log::{LearningLog, NewLearningLog, QuizSubmission},
    store::{PgQuizStore, QuizStore, SubmitOutcome},
};

async fn connect() -> PgQuizStore {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    PgQuizStore::new(pool)
}

/// Student ids unlikely to collide between runs.
fn fresh_student_id() -> i64 {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    1_000_000 + nanos.rem_euclid(1_000_000_000)
}

fn new_log(student_id: i64) -> NewLearningLog {
    NewLearningLog {
        student_id,
        topic: "Photosynthesis".to_string(),
        level: "beginner".to_string(),
        explanation: "Plants turn light into sugar.".to_string(),
        quiz: r#"[{"question":"Q1","options":["A. x","B. y"],"answer":"B"}]"#.to_string(),
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
async fn insert_and_find_owned() {
    let store = connect().await;
    let student = fresh_student_id();

    let log = store.insert(new_log(student)).await.unwrap();
    assert_eq!(log.quiz_score, 0);
    assert!(log.submitted_at.is_none());

    let again = store.find_owned(log.id, student).await.unwrap().unwrap();
    assert_eq!(again.quiz, log.quiz);
    assert!(store.find_owned(log.id, student + 1).await.unwrap().is_none());

    let recent = store.list_recent(student, 20).await.unwrap();
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
async fn concurrent_submissions_grade_once() {
    let store = Arc::new(connect().await);
    let student = fresh_student_id();
    let log_id = store.insert(new_log(student)).await.unwrap().id;

    let mut handles = Vec::new();
    for score in 1..=4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let grade = move |_: &LearningLog| QuizSubmission {
                user_answers: format!(r#"{{"1":"{}"}}"#, score),
                score,
            };
            store.submit(log_id, student, &grade).await.unwrap()
        }));
    }

    let mut graded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            SubmitOutcome::Graded(_) => graded += 1,
            SubmitOutcome::AlreadySubmitted => rejected += 1,
            SubmitOutcome::NotFound => panic!("log should exist"),
        }
    }

    assert_eq!(graded, 1);
    assert_eq!(rejected, 3);

    let stored = store.find_owned(log_id, student).await.unwrap().unwrap();
    assert!(stored.graded_score().is_some());
}
