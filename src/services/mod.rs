pub mod ai_gateway;
pub mod prompts;
pub mod schema_validator;

pub use ai_gateway::{AiGateway, ChatContext};
