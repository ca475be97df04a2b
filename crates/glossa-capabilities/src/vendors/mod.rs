/// OpenAI-compatible chat completions backend.
pub mod cloud;
