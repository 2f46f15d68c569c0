pub mod common_io;
pub mod parquet;
pub mod table_io;
pub mod tensor_io;
pub mod traits;
