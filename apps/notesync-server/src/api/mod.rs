pub mod meta;
pub mod notes;
