pub mod crm;
pub mod files;
pub mod summary;
pub mod webhook;
