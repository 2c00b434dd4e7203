pub mod fulfillment;
pub mod scoring;
