pub mod kakao;
pub mod paper;
pub mod topic;
pub mod user;
