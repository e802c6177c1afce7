use crate::types::events::ToolCallFragment;
use crate::types::tool::ToolCall;

#[derive(Debug)]
struct PartialCall {
    index: u32,
    id: String,
    name: String,
    arguments: String,
}

/// Collects streamed tool-call fragments into final [`ToolCall`] objects.
///
/// A fragment carrying an `id` opens a new call at its index. Fragments without
/// an id append their arguments to the most recent call at the same index, so
/// vendors that reuse index 0 for every call still assemble correctly.
/// Arguments are kept as the raw concatenated string; nothing is parsed here.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: Vec<PartialCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &ToolCallFragment) {
        if let Some(id) = fragment.id.as_deref() {
            self.calls.push(PartialCall {
                index: fragment.index,
                id: id.to_string(),
                name: fragment.name.clone().unwrap_or_default(),
                arguments: fragment.arguments_chunk.clone().unwrap_or_default(),
            });
            return;
        }

        match self.calls.iter_mut().rev().find(|c| c.index == fragment.index) {
            Some(call) => {
                if let Some(name) = fragment.name.as_deref() {
                    if call.name.is_empty() {
                        call.name = name.to_string();
                    }
                }
                if let Some(chunk) = fragment.arguments_chunk.as_deref() {
                    call.arguments.push_str(chunk);
                }
            }
            None => {
                tracing::debug!(index = fragment.index, "tool-call fragment before any opening fragment");
                self.calls.push(PartialCall {
                    index: fragment.index,
                    id: String::new(),
                    name: fragment.name.clone().unwrap_or_default(),
                    arguments: fragment.arguments_chunk.clone().unwrap_or_default(),
                });
            }
        }
    }

    pub fn extend<'a>(&mut self, fragments: impl IntoIterator<Item = &'a ToolCallFragment>) {
        for f in fragments {
            self.push(f);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Calls in opening order.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|c| ToolCall::new(c.id, c.name, c.arguments))
            .collect()
    }
}
