pub mod application;
pub mod cluster;
pub mod encryptor;
pub mod node;
pub mod repository;
