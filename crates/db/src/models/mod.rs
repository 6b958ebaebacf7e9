pub mod process;
pub mod process_group;
