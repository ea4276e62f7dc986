pub mod extract;
pub mod inventory;
pub mod lines;
pub mod status;
