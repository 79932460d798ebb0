pub mod assignment;
pub mod directory;
pub mod selection;
pub mod stats;
