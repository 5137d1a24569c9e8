//! Nesting context stack shared by the reader and the writer.

use std::fmt;

use crate::error::FormatError;

/// Kind of structure a context frame tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextType {
    TopLevel,
    Document,
    Array,
    JavaScriptWithScope,
    ScopeDocument,
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContextType::TopLevel => "TopLevel",
            ContextType::Document => "Document",
            ContextType::Array => "Array",
            ContextType::JavaScriptWithScope => "JavaScriptWithScope",
            ContextType::ScopeDocument => "ScopeDocument",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub context_type: ContextType,
    /// Offset of the frame's 4-byte length field.
    pub start_position: usize,
    /// Declared size on read; unused on write until the frame closes.
    pub size: usize,
    /// Next array index to write.
    pub index: usize,
    /// Offset of the type byte of the element being read in this frame.
    pub element_start: Option<usize>,
}

impl Frame {
    const TOP_LEVEL: Frame = Frame {
        context_type: ContextType::TopLevel,
        start_position: 0,
        size: 0,
        index: 0,
        element_start: None,
    };
}

/// Stack of value-type frames with a permanent top-level frame at the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContextStack {
    frames: Vec<Frame>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::TOP_LEVEL],
        }
    }

    pub fn current(&self) -> &Frame {
        self.frames.last().unwrap_or(&Frame::TOP_LEVEL)
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn context_type(&self) -> ContextType {
        self.current().context_type
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames above the top level.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn push(&mut self, context_type: ContextType, start_position: usize, size: usize) {
        self.frames.push(Frame {
            context_type,
            start_position,
            size,
            index: 0,
            element_start: None,
        });
    }

    /// Pops the current frame. The top-level frame is never removed.
    pub fn pop(&mut self) -> Frame {
        if self.frames.len() > 1 {
            if let Some(frame) = self.frames.pop() {
                return frame;
            }
        }
        Frame::TOP_LEVEL
    }

    /// Pops the current frame after checking that exactly its declared size
    /// has been consumed. On mismatch the frame stays on the stack.
    pub fn pop_checked(&mut self, position: usize) -> Result<Frame, FormatError> {
        let frame = self.current();
        let actual = position.saturating_sub(frame.start_position);
        if actual != frame.size {
            return Err(FormatError::SizeMismatch {
                expected: frame.size,
                actual,
            });
        }
        Ok(self.pop())
    }
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}
