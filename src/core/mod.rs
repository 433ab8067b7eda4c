pub mod backend;
pub mod criteria;
pub mod format;
pub mod observation;
