pub mod labels;
pub mod mutation;
pub mod scale_out;
