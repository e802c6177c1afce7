//! Small helpers shared by the client.

pub mod tool_call_assembler;

pub use tool_call_assembler::ToolCallAssembler;
