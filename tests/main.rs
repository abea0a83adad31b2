/*!
 * Main test entry point for the doctrans test suite
 */

// Import common test utilities
pub mod common;

// Import integration tests
mod integration {
    // End-to-end pipeline tests
    pub mod pipeline_tests;

    // Checkpoint resume tests
    pub mod resume_tests;
}
