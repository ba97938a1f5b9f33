pub mod race_detection;
