pub mod db;
pub mod llm;
pub mod memory;
pub mod sst;

pub use db::DbAdapter;
pub use llm::OpenAiGenerativeAdapter;
pub use memory::InMemoryDb;
pub use sst::OpenAiSstAdapter;
