pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod rpc;
pub mod sampler;
pub mod soundness;
pub mod util;
