pub mod tokenizer;

// Re-export commonly used types
pub use tokenizer::{
    CommandParseError, contains_pipe, find_shell_operator, first_word, join_tokens,
    split_pipeline, tokenize,
};
