pub mod admin;
pub mod auth;
pub mod session;
pub mod swagger_main;
pub mod todo;
pub mod user;

#[cfg(test)]
mod test_util;
