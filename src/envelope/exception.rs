//! Exception details for `ExceptionData`

use lazy_regex::regex;
use std::error::Error;

use super::data::{ExceptionDetails, StackFrame};
use crate::format::truncate_text;

/// An exception raised in the host, with its inner exceptions
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    /// Stack trace text, `at <method> in <file>:line <n>` per line
    pub stack_trace: Option<String>,
    pub inner: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            inner: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn with_inner(mut self, inner: ExceptionInfo) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Build from an error and its `source()` chain
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut chain: Vec<&(dyn Error + 'static)> = Vec::new();
        let mut current = Some(error);
        while let Some(e) = current {
            chain.push(e);
            current = e.source();
        }

        let mut info: Option<ExceptionInfo> = None;
        for e in chain.into_iter().rev() {
            let mut outer = ExceptionInfo::new("Error", e.to_string());
            outer.inner = info.map(Box::new);
            info = Some(outer);
        }
        info.unwrap_or_else(|| ExceptionInfo::new("Error", error.to_string()))
    }

    /// This exception followed by its inner exceptions
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionInfo> {
        std::iter::successors(Some(self), |e| e.inner.as_deref())
    }

    /// Innermost frame of every exception in the chain
    ///
    /// `None` when the outermost exception carries no stack trace.
    pub fn parsed_stack(&self) -> Option<Vec<StackFrame>> {
        let has_stack = self.stack_trace.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has_stack {
            return None;
        }

        let frames = self
            .chain()
            .filter_map(|e| e.stack_trace.as_deref().and_then(first_frame))
            .enumerate()
            .map(|(level, mut frame)| {
                frame.level = level as u32;
                frame
            })
            .collect();
        Some(frames)
    }

    pub fn to_details(&self) -> ExceptionDetails {
        ExceptionDetails {
            type_name: self.type_name.clone(),
            message: truncate_text(self.message.clone()),
            has_full_stack: false,
            parsed_stack: self.parsed_stack(),
        }
    }
}

/// First `at ...` line of a stack trace
fn first_frame(stack_trace: &str) -> Option<StackFrame> {
    let re = regex!(r"^\s*at\s+(?P<method>[^\s(]+)(?:\([^)]*\))?(?:\s+in\s+(?P<file>.+?):line\s+(?P<line>\d+))?\s*$");
    stack_trace.lines().find_map(|line| {
        let caps = re.captures(line)?;
        let qualified = caps.name("method")?.as_str();
        let method = qualified.rsplit('.').next().unwrap_or(qualified).to_string();
        Some(StackFrame {
            level: 0,
            method,
            file_name: caps.name("file").map(|m| m.as_str().to_string()),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "save failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl Error for Inner {}

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_from_error_chain() {
        let info = ExceptionInfo::from_error(&Outer(Inner));
        let messages: Vec<&str> = info.chain().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["save failed", "connection reset"]);
        assert!(info.parsed_stack().is_none());
    }

    #[test]
    fn test_parsed_stack_takes_innermost_frame_per_exception() {
        let inner = ExceptionInfo::new("System.TimeoutException", "timed out")
            .with_stack_trace("   at Contoso.Http.Client.Send(Request r) in C:\\src\\Client.cs:line 88");
        let info = ExceptionInfo::new("System.InvalidOperationException", "boom")
            .with_stack_trace(
                "   at Contoso.Plugins.AccountPlugin.Execute(IServiceProvider sp) in C:\\src\\AccountPlugin.cs:line 42\n   at Contoso.Plugins.PluginBase.Run()",
            )
            .with_inner(inner);

        let stack = info.parsed_stack().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].method, "Execute");
        assert_eq!(stack[0].file_name.as_deref(), Some("C:\\src\\AccountPlugin.cs"));
        assert_eq!(stack[0].line, 42);
        assert_eq!(stack[1].level, 1);
        assert_eq!(stack[1].method, "Send");
        assert_eq!(stack[1].line, 88);
    }

    #[test]
    fn test_frame_without_file() {
        let info = ExceptionInfo::new("E", "m").with_stack_trace("at Contoso.Worker.Run()");
        let stack = info.parsed_stack().unwrap();
        assert_eq!(stack[0].method, "Run");
        assert!(stack[0].file_name.is_none());
        assert_eq!(stack[0].line, 0);
    }

    #[test]
    fn test_details() {
        let details = ExceptionInfo::new("E", "x".repeat(9000)).to_details();
        assert_eq!(details.message.chars().count(), 8191);
        assert!(!details.has_full_stack);
        assert!(details.parsed_stack.is_none());
    }
}
