use crate::domain::quiz::{PublicQuizTest, QuizTest, TestId};

/// Canonical test definitions, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
    tests: Vec<QuizTest>,
}

impl TestCatalog {
    pub fn new(tests: Vec<QuizTest>) -> Self {
        Self { tests }
    }

    pub fn find(&self, test_id: TestId) -> Option<&QuizTest> {
        self.tests.iter().find(|test| test.id == test_id)
    }

    pub fn public_tests(&self) -> Vec<PublicQuizTest> {
        self.tests.iter().map(QuizTest::to_public).collect()
    }

    pub fn public_test(&self, test_id: TestId) -> Option<PublicQuizTest> {
        self.find(test_id).map(QuizTest::to_public)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
