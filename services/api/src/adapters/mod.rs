pub mod atcoder_problems;
pub mod db;

pub use atcoder_problems::AtCoderProblemsAdapter;
pub use db::DbAdapter;
