pub mod deps;
pub mod explore;
pub mod install;
pub mod repos;
pub mod search;
pub mod versions;
