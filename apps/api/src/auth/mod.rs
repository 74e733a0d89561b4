pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod validation;
