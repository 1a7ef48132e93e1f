pub mod llm_backend;
pub mod openai_backend;
pub mod session_storage;

pub use llm_backend::{LlmBackend, LlmMessage, LlmRequest, LlmRole, OutputFormat};
pub use openai_backend::OpenAiBackend;
pub use session_storage::{
    FileSessionStorage, MemorySessionStorage, SessionStorage, ANSWERS_STORAGE_KEY,
    QUESTIONS_STORAGE_KEY,
};
