pub mod encrypted_file_store;
pub mod memory_store;
pub mod remote_store;
