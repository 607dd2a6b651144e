pub mod chain;
pub mod config;
pub mod data;
pub mod estimate;
pub mod explore;
pub mod metric;
pub mod pipeline;
pub mod predict;
pub mod prepare;
pub mod report;
pub mod search;
pub mod split;

#[cfg(test)]
mod test_fixtures;
