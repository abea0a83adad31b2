/*!
 * Job orchestration.
 *
 * A job tracks one document through the pipeline:
 * pending -> extracting -> classifying -> translating -> completed | failed.
 * The manager owns the state machine; the driver and checkpoint store do
 * the per-block work underneath it.
 */

pub mod manager;
pub mod models;

pub use manager::JobManager;
pub use models::JobSnapshot;
