pub mod alignment;
pub mod cigar;
pub mod deamination;
pub mod filters;
pub mod likelihood;
pub mod md;
pub mod model;
pub mod quality;
pub mod record;
pub mod stream;
pub mod workflow;
