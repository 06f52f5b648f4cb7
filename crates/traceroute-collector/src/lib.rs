pub mod aggregator;
pub mod error;
pub mod exporter;
pub mod geo;
pub mod ingestor;
pub mod orchestrator;
pub mod processor;
pub mod serializer;
pub mod settings;
