//! Call-stack bookkeeping: one frame per user function/method/lambda call,
//! with self-tail-call collapsing and folded trace rendering.

use std::fmt::Write as _;
use std::sync::Arc;

/// Maximum number of frames rendered in a trace before folding.
pub const FRAME_RENDER_LIMIT: usize = 16;

/// Tail-call hits on a single frame beyond which the trace reports the
/// collapsed recursion explicitly.
pub const TAIL_REPORT_THRESHOLD: u32 = 10;

/// One activation record.
///
/// Self-tail-calls never push a new frame; they rebind the existing frame and
/// bump `tail_hits`, preserving the outermost call's source line.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function_name: String,
    pub source_file: Arc<str>,
    pub line: u32,
    pub column: u32,
    /// Short rendering of the arguments the frame was entered with.
    pub param_summary: String,
    /// Number of self-tail-calls folded into this frame.
    pub tail_hits: u32,
}

impl CallFrame {
    #[must_use]
    pub fn new(function_name: impl Into<String>, source_file: Arc<str>, line: u32, column: u32) -> Self {
        Self {
            function_name: function_name.into(),
            source_file,
            line,
            column,
            param_summary: String::new(),
            tail_hits: 0,
        }
    }
}

/// Snapshot of a frame captured into an error at raise time.
pub type FrameSnapshot = CallFrame;

/// The per-interpreter call stack.
///
/// Push/pop are paired around every user function, method, and lambda call.
/// Child interpreters own independent stacks (recursion depth is counted
/// per-interpreter).
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    #[must_use]
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn peek_mut(&mut self) -> Option<&mut CallFrame> {
        self.frames.last_mut()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Clones the live frames, most recent first, for attachment to an error.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FrameSnapshot> {
        self.frames.iter().rev().cloned().collect()
    }
}

/// Renders frames (most recent first) with depth folding.
///
/// When more than [`FRAME_RENDER_LIMIT`] frames are present, the newest half
/// and oldest half of the limit are kept and the middle is elided with an
/// explicit `N frames omitted` marker. Frames that absorbed enough
/// self-tail-calls also report their folded recursion count.
#[must_use]
pub fn render_frames(frames: &[FrameSnapshot]) -> String {
    let mut out = String::new();
    if frames.len() <= FRAME_RENDER_LIMIT {
        for frame in frames {
            render_one(&mut out, frame);
        }
        return out;
    }

    let head = FRAME_RENDER_LIMIT / 2;
    let tail = FRAME_RENDER_LIMIT / 2;
    let omitted = frames.len() - head - tail;
    for frame in &frames[..head] {
        render_one(&mut out, frame);
    }
    let _ = writeln!(out, "  ... {omitted} frames omitted (tail-call collapsed or depth-folded)");
    for frame in &frames[frames.len() - tail..] {
        render_one(&mut out, frame);
    }
    out
}

fn render_one(out: &mut String, frame: &FrameSnapshot) {
    let _ = write!(
        out,
        "  at {}({}:{})",
        frame.function_name, frame.source_file, frame.line
    );
    if frame.param_summary.is_empty() {
        out.push('\n');
    } else {
        let _ = writeln!(out, " [params: {}]", frame.param_summary);
    }
    if frame.tail_hits >= TAIL_REPORT_THRESHOLD {
        let _ = writeln!(out, "  ... {} tail-call frames omitted", frame.tail_hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, line: u32) -> CallFrame {
        CallFrame::new(name, Arc::from("test.nova"), line, 1)
    }

    #[test]
    fn push_pop_pairing() {
        let mut stack = CallStack::new();
        assert!(stack.is_empty());
        stack.push(frame("f", 1));
        stack.push(frame("g", 2));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek().unwrap().function_name, "g");
        stack.pop();
        assert_eq!(stack.peek().unwrap().function_name, "f");
    }

    #[test]
    fn short_traces_render_every_frame() {
        let frames: Vec<_> = (0..4).map(|i| frame("f", i)).collect();
        let rendered = render_frames(&frames);
        assert_eq!(rendered.lines().count(), 4);
        assert!(!rendered.contains("omitted"));
    }

    #[test]
    fn deep_traces_fold_the_middle() {
        let frames: Vec<_> = (0..40).map(|i| frame("f", i)).collect();
        let rendered = render_frames(&frames);
        assert!(rendered.contains("24 frames omitted (tail-call collapsed or depth-folded)"));
        // 8 newest + marker + 8 oldest
        assert_eq!(rendered.lines().count(), 17);
    }

    #[test]
    fn tail_hits_are_reported_past_threshold() {
        let mut f = frame("loop", 3);
        f.tail_hits = 99_999;
        let rendered = render_frames(&[f]);
        assert!(rendered.contains("99999 tail-call frames omitted"));
    }
}
