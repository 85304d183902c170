#![allow(dead_code)]

use coursesync_store::{ContentStore, NewContent};
use coursesync_types::{
    ContentKind, CourseStructure, LifecycleState, LocalId, Metadata, StepEntry, StepKey,
};
use serde_json::json;
use std::sync::Arc;

pub fn store() -> Arc<ContentStore> {
    Arc::new(ContentStore::open_in_memory().unwrap())
}

pub fn published(kind: ContentKind, slug: &str) -> NewContent {
    NewContent::new(kind, slug.replace('-', " "), slug).status(LifecycleState::Published)
}

pub fn insert(store: &ContentStore, new: NewContent) -> LocalId {
    store.insert(&new).unwrap().local_id
}

/// A course with one lesson (two topics, one quiz with three questions) and
/// one course-level quiz with two questions: eleven records in total.
pub struct CourseFixture {
    pub course: LocalId,
    pub lesson: LocalId,
    pub topics: Vec<LocalId>,
    pub lesson_quiz: LocalId,
    pub course_quiz: LocalId,
    pub questions: Vec<LocalId>,
}

impl CourseFixture {
    pub fn all(&self) -> Vec<LocalId> {
        let mut ids = vec![self.course, self.lesson];
        ids.extend(&self.topics);
        ids.push(self.lesson_quiz);
        ids.push(self.course_quiz);
        ids.extend(&self.questions);
        ids
    }
}

pub fn structure_for(f: &CourseFixture) -> CourseStructure {
    let mut lesson = StepEntry {
        key: StepKey::prefixed(ContentKind::Lesson, f.lesson),
        children: Default::default(),
    };
    for topic in &f.topics {
        lesson = lesson.with_child(ContentKind::Topic, StepEntry::leaf(topic.to_string()));
    }
    lesson = lesson.with_child(ContentKind::Quiz, StepEntry::leaf(f.lesson_quiz.to_string()));

    let mut structure = CourseStructure::new();
    structure.push(ContentKind::Lesson, lesson);
    structure.push(ContentKind::Quiz, StepEntry::leaf(f.course_quiz.to_string()));
    structure
}

pub fn build_course(store: &ContentStore, prefix: &str) -> CourseFixture {
    let course = insert(
        store,
        published(ContentKind::Course, &format!("{prefix}-course"))
            .meta("_sfwd-courses", json!({"course_price_type": "open"}))
            .meta("course_price", json!("0"))
            .meta("_progress_42", json!({"completed": 3}))
            .meta("course_42_access_from", json!(1700000000))
            .terms("ld_course_category", vec!["grammar".into()]),
    );
    let lesson = insert(
        store,
        published(ContentKind::Lesson, &format!("{prefix}-lesson")).parent(course),
    );
    let topics = (1..=2)
        .map(|n| {
            insert(
                store,
                published(ContentKind::Topic, &format!("{prefix}-topic-{n}"))
                    .parent(lesson)
                    .ordering(n),
            )
        })
        .collect();
    let lesson_quiz = insert(
        store,
        published(ContentKind::Quiz, &format!("{prefix}-lesson-quiz")).parent(lesson),
    );
    let course_quiz = insert(
        store,
        published(ContentKind::Quiz, &format!("{prefix}-final-quiz")).parent(course),
    );
    let mut questions = Vec::new();
    for n in 1..=3 {
        questions.push(insert(
            store,
            published(ContentKind::Question, &format!("{prefix}-lq-{n}"))
                .parent(lesson_quiz)
                .ordering(n),
        ));
    }
    for n in 1..=2 {
        questions.push(insert(
            store,
            published(ContentKind::Question, &format!("{prefix}-fq-{n}"))
                .parent(course_quiz)
                .ordering(n),
        ));
    }

    let fixture = CourseFixture {
        course,
        lesson,
        topics,
        lesson_quiz,
        course_quiz,
        questions,
    };
    let mut meta = Metadata::new();
    meta.insert(CourseStructure::META_KEY.into(), structure_for(&fixture).to_value());
    store.set_metadata(course, &meta).unwrap();
    fixture
}
