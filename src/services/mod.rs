pub mod clock;
pub mod code_generator;
pub mod health_service;
pub mod share_service;
pub mod upload_service;
