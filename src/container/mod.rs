mod format;
mod parser;
mod writer;

pub use format::{
    decode_name, encode_name, node_stride, CompressionMethod, ContainerHeader, NodeBody,
    NodeRecord, CURRENT_FORMAT_VERSION, FLAG_DIRECTORY, FLAG_LOCALIZED, FORMAT_VERSION_1,
    FORMAT_VERSION_2, HEADER_SIZE, MAGIC_NUMBER, MAX_NAME_LENGTH, NODE_STRIDE_V1, NODE_STRIDE_V2,
    NO_LOCALE,
};
pub use parser::RawContainer;
pub use writer::{ContainerWriter, WriterOptions};
