pub mod frame_clock;
pub mod frame_report;
pub mod pipeline_logger;
pub mod track_faces_use_case;
pub mod tracking_context;
