#![forbid(unsafe_code)]

pub mod flatfile;
pub mod repository;
pub mod sqlite;
