pub mod anchor_scheduler;
pub mod anchor_smoother;
pub mod bounded_history;
pub mod candidate_selector;
pub mod consistency_buffer;
pub mod consistency_vote;
pub mod eye_consistency_tracker;
pub mod heatmap_accumulator;
pub mod position_integrator;
pub mod tracking_config;
