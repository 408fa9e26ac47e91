pub mod anthropic;
pub mod file_source;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use file_source::JsonFileSource;
pub use traits::{ArticleSource, ClientError, GenerationParams, Summarizer, TextGenerator};
