pub mod data_service;
pub mod indicators;
pub mod levels;
pub mod mtf_signal_engine;
pub mod patterns;
pub mod position_sizing;
pub mod scoring;
pub mod structure;
