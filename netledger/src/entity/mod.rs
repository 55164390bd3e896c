pub mod data_usage;
