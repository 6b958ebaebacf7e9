pub mod group_repo;
pub mod process_repo;

pub use group_repo::GroupRepo;
pub use process_repo::ProcessRepo;
